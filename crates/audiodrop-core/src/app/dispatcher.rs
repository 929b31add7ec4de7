//! Dispatcher - リクエストの受付と並行実行
//!
//! 変換はネットワークとトランスコードを待つ長い処理なので、
//! 受付側では待たずにリクエストごとに tokio タスクを起こします。
//! 同時に走る数は Semaphore で抑えますが、受付（submit）自体は
//! 空きを待たずに即座に返ります。

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::relay::Relay;
use crate::domain::{JobOutcome, JobReport, JobRequest};
use crate::observability::{JobCounters, JobCounts};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is closed; no new jobs are accepted")]
    Closed,
}

pub struct Dispatcher {
    relay: Arc<Relay>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    counters: Arc<JobCounters>,
}

/// Marks the job abandoned if its task unwinds before reporting.
struct InFlight {
    counters: Arc<JobCounters>,
    done: bool,
}

impl InFlight {
    fn finish(mut self, outcome: &JobOutcome) {
        self.done = true;
        self.counters.finished(outcome);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.counters.abandoned();
        }
    }
}

impl Dispatcher {
    pub fn new(relay: Arc<Relay>, max_jobs: usize) -> Self {
        Self {
            relay,
            slots: Arc::new(Semaphore::new(max_jobs.max(1))),
            tracker: TaskTracker::new(),
            counters: Arc::new(JobCounters::default()),
        }
    }

    /// Queue `request` and return immediately.
    pub fn submit(&self, request: JobRequest) -> Result<JoinHandle<JobReport>, DispatchError> {
        if self.tracker.is_closed() {
            return Err(DispatchError::Closed);
        }

        self.counters.started();
        let guard = InFlight {
            counters: Arc::clone(&self.counters),
            done: false,
        };
        let relay = Arc::clone(&self.relay);
        let slots = Arc::clone(&self.slots);

        Ok(self.tracker.spawn(async move {
            // slots is never closed, so this only waits for a free slot
            let _permit = slots.acquire_owned().await;
            debug!(job_id = %request.job_id, "job started");

            let report = relay.handle(&request).await;
            guard.finish(&report.outcome);
            report
        }))
    }

    pub fn counts(&self) -> JobCounts {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait for every submitted one to finish,
    /// including those still waiting for a slot.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
