//! Outcome model: what happened to one request, end to end.
//!
//! The runner only knows "artifact or error". The relay adds the delivery
//! step on top, and this is the shape it reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::{ConversionError, ErrorKind};
use super::ids::JobId;
use super::request::RequesterId;

/// Final classification of a request.
///
/// Serialized with an `outcome` tag, e.g. `{"outcome":"too_large",...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The artifact reached the requester.
    Delivered {
        title: String,
        path: PathBuf,
        size_bytes: u64,
    },

    /// Conversion worked but the file is over the platform upload ceiling.
    TooLarge {
        title: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    /// Conversion worked but the sink refused or failed the transfer.
    DeliveryFailed { title: String, reason: String },

    /// Conversion itself failed.
    Failed { kind: ErrorKind, reason: String },
}

impl JobOutcome {
    pub fn failed(err: &ConversionError) -> Self {
        JobOutcome::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, JobOutcome::Delivered { .. })
    }
}

/// JobReport は 1 リクエストの最終結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub url: String,
    pub requester: RequesterId,
    #[serde(flatten)]
    pub outcome: JobOutcome,

    /// Delay after which the artifact is deleted, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_after_secs: Option<u64>,

    pub finished_at: DateTime<Utc>,
}
