//! Errors - 変換ジョブのエラー分類
//!
//! どのエラーもそのリクエストにとって終端です。コアはリトライしません。
//! 再送するかどうかは依頼者（チャット側）が決めます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// ErrorKind はメッセージ選択用の分類
///
/// チャット側は文字列マッチではなくこれを見て文言を選びます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DurationExceeded,
    Unavailable,
    UnsupportedSource,
    ArtifactMissing,
    TimedOut,
    Unknown,
}

/// Which step of a conversion was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Probe => f.write_str("probe"),
            Stage::Fetch => f.write_str("fetch"),
        }
    }
}

/// ConversionError は `JobRunner::convert` の失敗
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("media is too long ({duration_secs}s, max {limit_secs}s)")]
    DurationExceeded { duration_secs: u64, limit_secs: u64 },

    #[error("media not available: {0}")]
    Unavailable(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("downloaded file not found for prefix {prefix}")]
    ArtifactMissing { prefix: String },

    #[error("{stage} timed out after {}s", .limit.as_secs())]
    TimedOut { stage: Stage, limit: Duration },

    /// Underlying failure message, kept verbatim for diagnostics.
    #[error("{0}")]
    Unknown(String),
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::DurationExceeded { .. } => ErrorKind::DurationExceeded,
            ConversionError::Unavailable(_) => ErrorKind::Unavailable,
            ConversionError::UnsupportedSource(_) => ErrorKind::UnsupportedSource,
            ConversionError::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            ConversionError::TimedOut { .. } => ErrorKind::TimedOut,
            ConversionError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keeps_message_verbatim() {
        let err = ConversionError::Unknown("HTTP Error 429: Too Many Requests".to_string());
        assert_eq!(err.to_string(), "HTTP Error 429: Too Many Requests");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn duration_message_names_both_values() {
        let err = ConversionError::DurationExceeded {
            duration_secs: 2000,
            limit_secs: 1800,
        };
        let msg = err.to_string();
        assert!(msg.contains("2000"));
        assert!(msg.contains("1800"));
    }

    #[test]
    fn timed_out_mentions_stage() {
        let err = ConversionError::TimedOut {
            stage: Stage::Fetch,
            limit: Duration::from_secs(900),
        };
        assert_eq!(err.to_string(), "fetch timed out after 900s");
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let s = serde_json::to_string(&ErrorKind::UnsupportedSource).unwrap();
        assert_eq!(s, "\"unsupported_source\"");
    }
}
