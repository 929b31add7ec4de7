//! Artifact model: one produced audio file plus what we know about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata resolved by a probe, before anything is downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,

    /// Seconds. Some sources (live streams, some hosts) do not report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

impl MediaInfo {
    pub fn new(title: impl Into<String>, duration_secs: Option<u64>) -> Self {
        Self {
            title: title.into(),
            duration_secs,
        }
    }
}

/// A completed transcoded audio file.
///
/// Owned by the runner until it is handed to the delivery side; after that
/// the only thing left to do with it is delete it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,

    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File extension the transcoder ended up using.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}
