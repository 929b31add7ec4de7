//! Observability - ログ初期化とジョブ件数

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::domain::JobOutcome;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("tracing init failed: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when it is set. Logs go to stderr;
/// stdout is left for reports.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| TracingError::Init(e.to_string()))
}

/// Snapshot of what the dispatcher has seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub in_flight: usize,
    pub delivered: usize,
    pub too_large: usize,
    pub delivery_failed: usize,
    pub failed: usize,
}

/// Lock-free counters behind `JobCounts`.
#[derive(Debug, Default)]
pub struct JobCounters {
    in_flight: AtomicUsize,
    delivered: AtomicUsize,
    too_large: AtomicUsize,
    delivery_failed: AtomicUsize,
    failed: AtomicUsize,
}

impl JobCounters {
    pub fn started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finished(&self, outcome: &JobOutcome) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        let counter = match outcome {
            JobOutcome::Delivered { .. } => &self.delivered,
            JobOutcome::TooLarge { .. } => &self.too_large,
            JobOutcome::DeliveryFailed { .. } => &self.delivery_failed,
            JobOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Job task ended without producing an outcome (panic or abort).
    pub fn abandoned(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JobCounts {
        JobCounts {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            too_large: self.too_large.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
