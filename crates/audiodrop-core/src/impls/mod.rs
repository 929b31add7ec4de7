//! Impls - port の実装
//!
//! - **YtDlpExtractor**: yt-dlp + ffmpeg による本番用の抽出エンジン
//! - **ScriptedExtractor**: 結果を台本どおりに返すテスト・ドライラン用

pub mod scripted;
pub mod ytdlp;

pub use self::scripted::{FetchScript, ScriptedExtractor};
pub use self::ytdlp::YtDlpExtractor;
