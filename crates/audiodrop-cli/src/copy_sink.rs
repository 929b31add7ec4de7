//! CopySink - artifact をローカルの出力ディレクトリへコピーする ArtifactSink
//!
//! チャットへのアップロードの代わりです。scratch 側のファイルは
//! reclaimer が消すので、ここではコピーだけを行います。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use audiodrop_core::domain::{Artifact, JobRequest};
use audiodrop_core::ports::{ArtifactSink, DeliveryError};

const MAX_STEM_CHARS: usize = 80;

pub struct CopySink {
    out_dir: PathBuf,
}

impl CopySink {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    /// `<title>-<job token>.<ext>` inside the output directory.
    pub fn destination(&self, request: &JobRequest, artifact: &Artifact) -> PathBuf {
        let stem = file_stem(&artifact.title);
        let name = match artifact.extension() {
            Some(ext) => format!("{stem}-{}.{ext}", request.job_id.token()),
            None => format!("{stem}-{}", request.job_id.token()),
        };
        self.out_dir.join(name)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

/// Title reduced to something safe as a file name.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if stem.is_empty() {
        "audio".to_string()
    } else {
        stem.to_string()
    }
}

#[async_trait]
impl ArtifactSink for CopySink {
    async fn deliver(&self, request: &JobRequest, artifact: &Artifact) -> Result<(), DeliveryError> {
        let dest = self.destination(request, artifact);
        let copied = tokio::fs::copy(&artifact.path, &dest).await?;
        info!(
            job_id = %request.job_id,
            requester = %request.requester,
            path = %dest.display(),
            bytes = copied,
            "artifact copied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiodrop_core::domain::{ChatScope, RequesterId};
    use audiodrop_core::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
    use tempfile::TempDir;

    fn request() -> JobRequest {
        JobRequest::new(
            UlidGenerator::new(SystemClock).generate_job_id(),
            "https://example.com/watch?v=1",
            RequesterId::new("cli"),
            ChatScope::Private,
            SystemClock.now(),
        )
    }

    fn artifact(path: PathBuf, title: &str) -> Artifact {
        Artifact {
            path,
            title: title.to_string(),
            duration_secs: Some(10),
            size_bytes: 5,
            created_at: SystemClock.now(),
        }
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("AC/DC: Live"), "AC_DC_ Live");
        assert_eq!(file_stem("  ...  "), "audio");
        assert_eq!(file_stem(&"x".repeat(200)).len(), MAX_STEM_CHARS);
    }

    #[tokio::test]
    async fn deliver_copies_and_keeps_source() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source = scratch.path().join("audio_x.mp3");
        std::fs::write(&source, b"hello").unwrap();

        let sink = CopySink::new(out.path().to_path_buf());
        let request = request();
        let artifact = artifact(source.clone(), "Song");

        sink.deliver(&request, &artifact).await.unwrap();

        let dest = sink.destination(&request, &artifact);
        assert_eq!(dest.parent(), Some(out.path()));
        assert_eq!(dest.extension().and_then(|e| e.to_str()), Some("mp3"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn deliver_reports_missing_source() {
        let out = TempDir::new().unwrap();
        let sink = CopySink::new(out.path().to_path_buf());
        let artifact = artifact(out.path().join("gone.mp3"), "Gone");

        let result = sink.deliver(&request(), &artifact).await;
        assert!(matches!(result, Err(DeliveryError::Io(_))));
    }
}
