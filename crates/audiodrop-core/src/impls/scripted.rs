//! ScriptedExtractor - 外部ツールなしで動く MediaExtractor
//!
//! テストと CLI のドライランで使います。probe と fetch の結果を
//! あらかじめ決めておき、呼び出し回数を数えます。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::app::scratch::with_extension;
use crate::config::AudioConfig;
use crate::domain::MediaInfo;
use crate::ports::{ExtractorError, MediaExtractor};

/// What `fetch` does when called.
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Write `bytes` to `<prefix>.<extension>`.
    Write { extension: String, bytes: Vec<u8> },
    /// Leave a `<prefix>.<extension>.part` remnant, then fail.
    Partial { extension: String, error: ExtractorError },
    /// Report success without writing anything.
    WriteNothing,
    Fail(ExtractorError),
}

pub struct ScriptedExtractor {
    probe: Result<MediaInfo, ExtractorError>,
    fetch: FetchScript,
    fetch_delay: Option<Duration>,
    probe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    prefixes: Mutex<Vec<PathBuf>>,
}

impl ScriptedExtractor {
    /// Probe returns `info`; fetch writes a small `.mp3`.
    pub fn new(info: MediaInfo) -> Self {
        Self {
            probe: Ok(info),
            fetch: FetchScript::Write {
                extension: "mp3".to_string(),
                bytes: b"ID3\x04scripted".to_vec(),
            },
            fetch_delay: None,
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            prefixes: Mutex::new(Vec::new()),
        }
    }

    pub fn probe_fails(mut self, error: ExtractorError) -> Self {
        self.probe = Err(error);
        self
    }

    pub fn with_fetch(mut self, fetch: FetchScript) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn writes(self, extension: &str, bytes: &[u8]) -> Self {
        self.with_fetch(FetchScript::Write {
            extension: extension.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Output prefixes passed to `fetch`, in call order.
    pub fn prefixes(&self) -> Vec<PathBuf> {
        self.prefixes
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    async fn probe(&self, _url: &str) -> Result<MediaInfo, ExtractorError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.clone()
    }

    async fn fetch(
        &self,
        _url: &str,
        output_prefix: &Path,
        _audio: &AudioConfig,
    ) -> Result<(), ExtractorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prefixes) = self.prefixes.lock() {
            prefixes.push(output_prefix.to_path_buf());
        }
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.fetch {
            FetchScript::Write { extension, bytes } => {
                tokio::fs::write(with_extension(output_prefix, extension), bytes)
                    .await
                    .map_err(|e| ExtractorError::Failed(e.to_string()))
            }
            FetchScript::Partial { extension, error } => {
                let part = with_extension(output_prefix, &format!("{extension}.part"));
                tokio::fs::write(part, b"partial")
                    .await
                    .map_err(|e| ExtractorError::Failed(e.to_string()))?;
                Err(error.clone())
            }
            FetchScript::WriteNothing => Ok(()),
            FetchScript::Fail(error) => Err(error.clone()),
        }
    }
}
