//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **RelayBuilder**: アプリケーションの構築とワイヤリング
//! - **JobRunner**: probe → 長さチェック → fetch → 出力ファイルの特定
//! - **StorageReclaimer**: scratch ディレクトリの sweep と削除予約
//! - **Relay**: 変換・配送・削除予約の 1 リクエスト分の流れ
//! - **Dispatcher**: リクエストごとのタスク起動と同時実行数の制限

pub mod builder;
pub mod dispatcher;
pub mod reclaimer;
pub mod relay;
pub mod runner;
pub mod scratch;

// 主要な型を再エクスポート
pub use self::builder::{App, BuildError, RelayBuilder};
pub use self::dispatcher::{DispatchError, Dispatcher};
pub use self::reclaimer::{delete_file, ReclaimError, StorageReclaimer, SweepHandle, SweepReport};
pub use self::relay::Relay;
pub use self::runner::JobRunner;
pub use self::scratch::ScratchDir;
