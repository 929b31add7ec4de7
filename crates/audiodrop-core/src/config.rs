//! Config - 実行時設定
//!
//! すべてのフィールドにデフォルトがあるので、TOML ファイルは
//! 変えたい項目だけ書けば足ります。
//!
//! ```toml
//! [limits]
//! max_duration_secs = 1800
//!
//! [reclaim]
//! max_age_secs = 600
//! sweep_interval_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// ConfigError は設定の読み込み・検証エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Parent directory for the per-process scratch directory.
    /// `None` means the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,
    pub limits: LimitsConfig,
    pub audio: AudioConfig,
    pub reclaim: ReclaimConfig,
    pub delivery: DeliveryConfig,
    pub extractor: ExtractorConfig,
    pub logging: LoggingConfig,
}

impl RelayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Fail-fast checks run by `RelayBuilder::build`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero_checks = [
            ("limits.max_duration_secs", self.limits.max_duration_secs),
            ("limits.probe_timeout_secs", self.limits.probe_timeout_secs),
            ("limits.fetch_timeout_secs", self.limits.fetch_timeout_secs),
            ("reclaim.max_age_secs", self.reclaim.max_age_secs),
            ("reclaim.sweep_interval_secs", self.reclaim.sweep_interval_secs),
        ];
        for (name, value) in zero_checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.limits.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }
        if self.audio.bitrate_kbps == 0 {
            return Err(ConfigError::Invalid(
                "audio.bitrate_kbps must be greater than zero".to_string(),
            ));
        }
        if let Some(bad) = self
            .audio
            .fallback_extensions
            .iter()
            .find(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::Invalid(format!(
                "audio.fallback_extensions contains an invalid extension: {bad:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Media longer than this is refused before download.
    pub max_duration_secs: u64,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_concurrent_jobs: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 30 * 60,
            probe_timeout_secs: 120,
            fetch_timeout_secs: 15 * 60,
            max_concurrent_jobs: 4,
        }
    }
}

impl LimitsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Target codec for the transcode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    Aac,
    Opus,
    Vorbis,
}

impl AudioCodec {
    /// Name understood by the extractor's `--audio-format`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "aac",
            AudioCodec::Opus => "opus",
            AudioCodec::Vorbis => "vorbis",
        }
    }

    /// Extension the transcoder writes for this codec.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "m4a",
            AudioCodec::Opus => "opus",
            AudioCodec::Vorbis => "ogg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub codec: AudioCodec,
    pub bitrate_kbps: u32,
    /// Probed in order when the preferred extension is not on disk.
    pub fallback_extensions: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Mp3,
            bitrate_kbps: 192,
            fallback_extensions: ["mp3", "m4a", "webm", "ogg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AudioConfig {
    /// Preferred extension first, then the fallbacks, without duplicates.
    pub fn candidate_extensions(&self) -> Vec<&str> {
        let mut out = vec![self.codec.extension()];
        for ext in &self.fallback_extensions {
            if !out.contains(&ext.as_str()) {
                out.push(ext.as_str());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    /// Files older than this are removed by the sweep.
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 10 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl ReclaimConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Platform upload ceiling.
    pub max_upload_bytes: u64,
    pub delete_after_success_secs: u64,
    pub delete_after_rejection_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            delete_after_success_secs: 60,
            delete_after_rejection_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub program: PathBuf,
    /// Passed before the generated arguments (cookies, proxy, ...).
    pub extra_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            extra_args: Vec::new(),
            ffmpeg_location: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
