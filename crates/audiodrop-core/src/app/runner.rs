//! JobRunner - 1 件の URL を音声ファイルにする
//!
//! # フロー
//! 1. probe: メタデータだけ取得し、長さの上限をチェック
//! 2. fetch: `<scratch>/audio_<token>` に取得・変換
//! 3. locate: 期待する拡張子 → 代替の拡張子の順に出力を探す
//!
//! リトライはしません。失敗は分類してすぐ返します。
//! fetch が途中で残した部分ファイルは消さずに sweep に任せます。

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::scratch::{output_prefix, with_extension};
use crate::config::{AudioConfig, LimitsConfig};
use crate::domain::{Artifact, ConversionError, JobId, MediaInfo, Stage};
use crate::ports::{IdGenerator, MediaExtractor};

pub struct JobRunner {
    extractor: Arc<dyn MediaExtractor>,
    ids: Arc<dyn IdGenerator>,
    scratch_dir: PathBuf,
    audio: AudioConfig,
    max_duration_secs: u64,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl JobRunner {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        ids: Arc<dyn IdGenerator>,
        scratch_dir: PathBuf,
        limits: &LimitsConfig,
        audio: AudioConfig,
    ) -> Self {
        Self {
            extractor,
            ids,
            scratch_dir,
            audio,
            max_duration_secs: limits.max_duration_secs,
            probe_timeout: limits.probe_timeout(),
            fetch_timeout: limits.fetch_timeout(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Convert `url` under a freshly generated job id.
    ///
    /// The caller has already checked that `url` is http(s).
    pub async fn convert(&self, url: &str) -> Result<Artifact, ConversionError> {
        let job_id = self.ids.generate_job_id();
        self.convert_job(job_id, url).await
    }

    /// Convert `url`, naming the output after `job_id`.
    pub async fn convert_job(&self, job_id: JobId, url: &str) -> Result<Artifact, ConversionError> {
        let info = self.probe(url).await?;
        self.check_duration(&info)?;

        let prefix = output_prefix(&self.scratch_dir, job_id);
        info!(%job_id, url, title = %info.title, duration_secs = ?info.duration_secs, "fetching audio");

        tokio::time::timeout(
            self.fetch_timeout,
            self.extractor.fetch(url, &prefix, &self.audio),
        )
        .await
        .map_err(|_| ConversionError::TimedOut {
            stage: Stage::Fetch,
            limit: self.fetch_timeout,
        })??;

        let (path, size_bytes) = self.locate(&prefix).await?;
        info!(%job_id, path = %path.display(), size_bytes, "artifact ready");

        Ok(Artifact {
            path,
            title: info.title,
            duration_secs: info.duration_secs,
            size_bytes,
            created_at: Utc::now(),
        })
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, ConversionError> {
        let info = tokio::time::timeout(self.probe_timeout, self.extractor.probe(url))
            .await
            .map_err(|_| ConversionError::TimedOut {
                stage: Stage::Probe,
                limit: self.probe_timeout,
            })??;
        debug!(url, title = %info.title, "probed");
        Ok(info)
    }

    fn check_duration(&self, info: &MediaInfo) -> Result<(), ConversionError> {
        match info.duration_secs {
            Some(duration_secs) if duration_secs > self.max_duration_secs => {
                warn!(
                    title = %info.title,
                    duration_secs,
                    limit_secs = self.max_duration_secs,
                    "refusing long media"
                );
                Err(ConversionError::DurationExceeded {
                    duration_secs,
                    limit_secs: self.max_duration_secs,
                })
            }
            _ => Ok(()),
        }
    }

    /// First non-empty `<prefix>.<ext>` in candidate order.
    async fn locate(&self, prefix: &Path) -> Result<(PathBuf, u64), ConversionError> {
        for ext in self.audio.candidate_extensions() {
            let candidate = with_extension(prefix, ext);
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {
                    return Ok((candidate, meta.len()));
                }
                Ok(_) => debug!(path = %candidate.display(), "ignoring empty output"),
                Err(_) => {}
            }
        }
        Err(ConversionError::ArtifactMissing {
            prefix: prefix.display().to_string(),
        })
    }
}
