//! Ports - 抽象化レイヤー
//!
//! 外部の仕組み（抽出エンジン、配送先、時刻、ID）への
//! インターフェースを trait として定義します。
//!
//! # 設計原則
//! - コアは scratch ディレクトリ以外の共有状態を持たない
//! - 重い処理（ネットワーク・トランスコード）はすべて port の向こう側

pub mod clock;
pub mod extractor;
pub mod id_generator;
pub mod sink;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::extractor::{ExtractorError, MediaExtractor};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::sink::{ArtifactSink, DeliveryError};
