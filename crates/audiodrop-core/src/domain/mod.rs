//! Domain model (ids, requests, artifacts, errors, outcomes).
//!
//! I/O を持たない値だけを置きます。プロセス起動や削除などの副作用は
//! `app` と `impls` 側の責務です。

pub mod artifact;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod request;

pub use artifact::{Artifact, MediaInfo};
pub use errors::{ConversionError, ErrorKind, Stage};
pub use ids::{JobId, Id, IdMarker};
pub use outcome::{JobOutcome, JobReport};
pub use request::{is_http_url, ChatScope, JobRequest, RequesterId};
