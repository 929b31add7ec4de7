//! Relay - 変換から配送・削除予約までの 1 リクエスト分の流れ
//!
//! # フロー
//! 1. JobRunner::convert_job で artifact を作る
//! 2. サイズ上限を超えていれば配送せずに短い遅延で削除予約
//! 3. ArtifactSink::deliver で届ける
//! 4. 成功なら長め、失敗なら短めの遅延で削除予約
//!
//! 配送と削除予約の間でプロセスが落ちた場合は sweep が回収します。

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::reclaimer::StorageReclaimer;
use super::runner::JobRunner;
use crate::config::DeliveryConfig;
use crate::domain::{JobOutcome, JobReport, JobRequest};
use crate::ports::ArtifactSink;

pub struct Relay {
    runner: JobRunner,
    reclaimer: Arc<StorageReclaimer>,
    sink: Arc<dyn ArtifactSink>,
    delivery: DeliveryConfig,
}

impl Relay {
    pub fn new(
        runner: JobRunner,
        reclaimer: Arc<StorageReclaimer>,
        sink: Arc<dyn ArtifactSink>,
        delivery: DeliveryConfig,
    ) -> Self {
        Self {
            runner,
            reclaimer,
            sink,
            delivery,
        }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn reclaimer(&self) -> &Arc<StorageReclaimer> {
        &self.reclaimer
    }

    /// Run one request to completion. Every failure ends up in the report.
    pub async fn handle(&self, request: &JobRequest) -> JobReport {
        let job_id = request.job_id;
        info!(%job_id, url = %request.url, requester = %request.requester, scope = ?request.scope, "job accepted");

        let artifact = match self.runner.convert_job(job_id, &request.url).await {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(%job_id, kind = ?err.kind(), error = %err, "conversion failed");
                return self.report(request, JobOutcome::failed(&err), None);
            }
        };

        if artifact.size_bytes > self.delivery.max_upload_bytes {
            warn!(
                %job_id,
                size_bytes = artifact.size_bytes,
                limit_bytes = self.delivery.max_upload_bytes,
                "artifact too large to deliver"
            );
            let delay = self.schedule(artifact.path.clone(), self.delivery.delete_after_rejection_secs);
            let outcome = JobOutcome::TooLarge {
                title: artifact.title,
                size_bytes: artifact.size_bytes,
                limit_bytes: self.delivery.max_upload_bytes,
            };
            return self.report(request, outcome, delay);
        }

        match self.sink.deliver(request, &artifact).await {
            Ok(()) => {
                info!(%job_id, title = %artifact.title, requester = %request.requester, "delivered");
                let delay = self.schedule(artifact.path.clone(), self.delivery.delete_after_success_secs);
                let outcome = JobOutcome::Delivered {
                    title: artifact.title,
                    path: artifact.path,
                    size_bytes: artifact.size_bytes,
                };
                self.report(request, outcome, delay)
            }
            Err(err) => {
                warn!(%job_id, error = %err, "delivery failed");
                let delay = self.schedule(artifact.path.clone(), self.delivery.delete_after_rejection_secs);
                let outcome = JobOutcome::DeliveryFailed {
                    title: artifact.title,
                    reason: err.to_string(),
                };
                self.report(request, outcome, delay)
            }
        }
    }

    /// Returns the delay actually scheduled, if any.
    fn schedule(&self, path: PathBuf, delay_secs: u64) -> Option<u64> {
        match self
            .reclaimer
            .schedule_delete(path, Duration::from_secs(delay_secs))
        {
            Ok(_) => Some(delay_secs),
            Err(err) => {
                warn!(error = %err, "could not schedule deletion, leaving it to the sweep");
                None
            }
        }
    }

    fn report(&self, request: &JobRequest, outcome: JobOutcome, delete_after_secs: Option<u64>) -> JobReport {
        JobReport {
            job_id: request.job_id,
            url: request.url.clone(),
            requester: request.requester.clone(),
            outcome,
            delete_after_secs,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, LimitsConfig, ReclaimConfig};
    use crate::domain::{Artifact, ChatScope, ErrorKind, MediaInfo, RequesterId};
    use crate::impls::ScriptedExtractor;
    use crate::ports::{DeliveryError, IdGenerator, SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, PathBuf)>>,
        reject: bool,
    }

    #[async_trait]
    impl ArtifactSink for RecordingSink {
        async fn deliver(&self, request: &JobRequest, artifact: &Artifact) -> Result<(), DeliveryError> {
            if self.reject {
                return Err(DeliveryError::Rejected("chat not found".to_string()));
            }
            assert!(artifact.path.exists());
            self.delivered
                .lock()
                .unwrap()
                .push((request.requester.to_string(), artifact.path.clone()));
            Ok(())
        }
    }

    fn relay(dir: &TempDir, extractor: ScriptedExtractor, sink: Arc<RecordingSink>, delivery: DeliveryConfig) -> Relay {
        let ids = Arc::new(UlidGenerator::new(SystemClock));
        let runner = JobRunner::new(
            Arc::new(extractor),
            ids,
            dir.path().to_path_buf(),
            &LimitsConfig::default(),
            AudioConfig::default(),
        );
        let reclaimer = Arc::new(StorageReclaimer::new(
            dir.path().to_path_buf(),
            &ReclaimConfig::default(),
            Arc::new(SystemClock),
        ));
        Relay::new(runner, reclaimer, sink, delivery)
    }

    fn request(url: &str) -> JobRequest {
        let ids = UlidGenerator::new(SystemClock);
        JobRequest::new(
            ids.generate_job_id(),
            url,
            RequesterId::new("user-7"),
            ChatScope::Private,
            Utc::now(),
        )
    }

    fn fast_delivery() -> DeliveryConfig {
        DeliveryConfig {
            delete_after_success_secs: 0,
            delete_after_rejection_secs: 0,
            ..DeliveryConfig::default()
        }
    }

    #[tokio::test]
    async fn delivered_artifact_is_deleted_afterwards() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(
            &dir,
            ScriptedExtractor::new(MediaInfo::new("Song", Some(100))),
            sink.clone(),
            fast_delivery(),
        );

        let report = relay.handle(&request("https://example.com/a")).await;

        let JobOutcome::Delivered { title, path, .. } = &report.outcome else {
            panic!("unexpected outcome: {:?}", report.outcome);
        };
        assert_eq!(title, "Song");
        assert_eq!(report.delete_after_secs, Some(0));
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
        assert_eq!(sink.delivered.lock().unwrap()[0].0, "user-7");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn oversized_artifact_is_not_delivered() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let relay = relay(
            &dir,
            ScriptedExtractor::new(MediaInfo::new("Big", Some(100))).writes("mp3", &[0u8; 64]),
            sink.clone(),
            DeliveryConfig {
                max_upload_bytes: 32,
                ..fast_delivery()
            },
        );

        let report = relay.handle(&request("https://example.com/big")).await;

        assert_eq!(
            report.outcome,
            JobOutcome::TooLarge {
                title: "Big".to_string(),
                size_bytes: 64,
                limit_bytes: 32,
            }
        );
        assert!(sink.delivered.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejected_delivery_still_schedules_deletion() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink {
            reject: true,
            ..RecordingSink::default()
        });
        let relay = relay(
            &dir,
            ScriptedExtractor::new(MediaInfo::new("Song", Some(100))),
            sink,
            DeliveryConfig {
                delete_after_rejection_secs: 0,
                ..DeliveryConfig::default()
            },
        );

        let report = relay.handle(&request("https://example.com/a")).await;

        assert!(matches!(report.outcome, JobOutcome::DeliveryFailed { .. }));
        assert_eq!(report.delete_after_secs, Some(0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn conversion_failure_is_reported_with_kind() {
        let dir = TempDir::new().unwrap();
        let relay = relay(
            &dir,
            ScriptedExtractor::new(MediaInfo::new("Marathon", Some(5000))),
            Arc::new(RecordingSink::default()),
            DeliveryConfig::default(),
        );

        let report = relay.handle(&request("https://example.com/long")).await;

        assert!(matches!(
            report.outcome,
            JobOutcome::Failed {
                kind: ErrorKind::DurationExceeded,
                ..
            }
        ));
        assert_eq!(report.delete_after_secs, None);
    }
}
