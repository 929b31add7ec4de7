//! JobRequest - 1 件の変換依頼
//!
//! チャット側（外部コラボレータ）が URL の構文チェックと権限チェックを
//! 済ませたあとに作られます。コアはどちらのチェックも再実行しません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::ids::JobId;

/// Who asked for the conversion (chat user id, CLI user, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(String);

impl RequesterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    /// One-to-one conversation with the requester.
    Private,
    /// Group or channel shared by several people.
    Shared,
}

/// JobRequest は不変の依頼値
///
/// ジョブが解決したら捨てられます。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: JobId,
    pub url: String,
    pub requester: RequesterId,
    pub scope: ChatScope,
    pub submitted_at: DateTime<Utc>,
}

impl JobRequest {
    pub fn new(
        job_id: JobId,
        url: impl Into<String>,
        requester: RequesterId,
        scope: ChatScope,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            url: url.into(),
            requester,
            scope,
            submitted_at,
        }
    }
}

/// Syntactic pre-check the collaborator runs before building a request.
///
/// Text that fails it is ignored, not reported as an error.
pub fn is_http_url(text: &str) -> bool {
    match Url::parse(text.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
