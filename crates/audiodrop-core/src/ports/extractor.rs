//! MediaExtractor port - メディア抽出・変換エンジン
//!
//! 「URL を渡すと、指定プレフィックスに音声ファイルを書く（か、失敗する）」
//! 以上のことは仮定しません。本番実装は `impls::ytdlp`、
//! テスト用は `impls::scripted` です。

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::config::AudioConfig;
use crate::domain::{ConversionError, MediaInfo};

/// ExtractorError は抽出エンジンからの失敗
#[derive(Debug, Clone, Error)]
pub enum ExtractorError {
    /// The source says the media is private, removed or region locked.
    #[error("{0}")]
    Unavailable(String),

    /// Host or format is not recognized by the engine.
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

impl ExtractorError {
    /// Classify a raw engine message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("not available")
            || lower.contains("unavailable")
            || lower.contains("private")
            || lower.contains("removed")
        {
            ExtractorError::Unavailable(message)
        } else if lower.contains("unsupported") {
            ExtractorError::Unsupported(message)
        } else {
            ExtractorError::Failed(message)
        }
    }
}

impl From<ExtractorError> for ConversionError {
    fn from(err: ExtractorError) -> Self {
        match err {
            ExtractorError::Unavailable(m) => ConversionError::Unavailable(m),
            ExtractorError::Unsupported(m) => ConversionError::UnsupportedSource(m),
            ExtractorError::Failed(m) => ConversionError::Unknown(m),
        }
    }
}

/// MediaExtractor はメディアの解決と取得を担当
///
/// # 契約
/// - `probe` はダウンロードしない
/// - `fetch` は `<output_prefix>.<ext>` に 1 ファイル書く。`ext` はエンジン次第
/// - 途中で失敗した部分ファイルは残ってもよい（sweep が回収する）
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError>;

    async fn fetch(
        &self,
        url: &str,
        output_prefix: &Path,
        audio: &AudioConfig,
    ) -> Result<(), ExtractorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case::not_available("ERROR: [youtube] abc: Video not available", ErrorKind::Unavailable)]
    #[case::private("ERROR: Private video. Sign in if you've been granted access", ErrorKind::Unavailable)]
    #[case::removed("This video has been removed by the uploader", ErrorKind::Unavailable)]
    #[case::is_private("ERROR: [youtube] abc: This video is private", ErrorKind::Unavailable)]
    #[case::was_removed("ERROR: [vimeo] 123: This video was removed", ErrorKind::Unavailable)]
    #[case::unsupported("ERROR: Unsupported URL: https://example.com/", ErrorKind::UnsupportedSource)]
    #[case::other("ERROR: unable to download webpage: HTTP Error 503", ErrorKind::Unknown)]
    fn engine_messages_are_classified(#[case] message: &str, #[case] expected: ErrorKind) {
        let err: ConversionError = ExtractorError::from_message(message).into();
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn failed_message_reaches_conversion_error_verbatim() {
        let err: ConversionError = ExtractorError::from_message("ffmpeg exited with code 1").into();
        assert_eq!(err.to_string(), "ffmpeg exited with code 1");
    }
}
