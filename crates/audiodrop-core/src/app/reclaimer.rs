//! StorageReclaimer - scratch ディレクトリの掃除
//!
//! 削除の経路は 2 つあります。
//! - **sweep**: 一定間隔で全ファイルを見て、古いものを消す常駐ループ
//! - **scheduled delete**: 配送後に 1 ファイルだけ遅延して消す単発タスク
//!
//! どちらもロックは取りません。書き込みはジョブごとに一意なパス、
//! 削除は冪等（"not found" は成功扱い）なので、競合しても壊れません。
//! 異常終了で scheduled delete が出なかったファイルも、
//! 最悪 `max_age + sweep_interval` で消えます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ReclaimConfig;
use crate::ports::Clock;

#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("sweep loop is already running for {0}")]
    SweepAlreadyStarted(PathBuf),

    #[error("refusing to delete {0}: not inside the scratch directory")]
    OutsideScratch(PathBuf),

    #[error("sweep task ended abnormally: {0}")]
    SweepTask(String),
}

/// Idempotent delete: a missing file is `Ok(false)`, not an error.
pub async fn delete_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    /// Entries that could not be inspected or deleted.
    pub failed: usize,
    /// Subdirectories and other non-files.
    pub skipped: usize,
}

pub struct StorageReclaimer {
    dir: PathBuf,
    max_age: Duration,
    interval: Duration,
    clock: Arc<dyn Clock>,
    sweep_started: AtomicBool,
}

impl StorageReclaimer {
    pub fn new(dir: PathBuf, config: &ReclaimConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir,
            max_age: config.max_age(),
            interval: config.sweep_interval(),
            clock,
            sweep_started: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start the background sweep. Only one loop may exist per reclaimer.
    ///
    /// The guard is per reclaimer, not per process: `RelayBuilder` builds
    /// exactly one reclaimer per `App`, which gives one loop per process.
    ///
    /// The first pass runs immediately. Dropping the returned handle leaves
    /// the loop running for the rest of the process.
    pub fn start_sweep(self: &Arc<Self>) -> Result<SweepHandle, ReclaimError> {
        if self.sweep_started.swap(true, Ordering::SeqCst) {
            return Err(ReclaimError::SweepAlreadyStarted(self.dir.clone()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reclaimer = Arc::clone(self);
        let join = tokio::spawn(async move {
            reclaimer.sweep_loop(shutdown_rx).await;
        });

        info!(
            dir = %self.dir.display(),
            max_age_secs = self.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "sweep started"
        );
        Ok(SweepHandle { shutdown_tx, join })
    }

    async fn sweep_loop(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Goes false once every handle is dropped; the loop then runs unowned.
        let mut shutdown_open = true;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = tick.tick() => {}
                changed = shutdown_rx.changed(), if shutdown_open => {
                    if changed.is_err() {
                        shutdown_open = false;
                    }
                    continue;
                }
            }

            let report = self.sweep_once().await;
            if report.removed > 0 || report.failed > 0 {
                info!(
                    scanned = report.scanned,
                    removed = report.removed,
                    failed = report.failed,
                    "sweep pass finished"
                );
            } else {
                debug!(scanned = report.scanned, "sweep pass finished");
            }
        }
        info!(dir = %self.dir.display(), "sweep stopped");
    }

    /// One pass over the directory. Never fails as a whole: per-entry
    /// problems are logged and counted.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.now();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.dir.display(), error = %e, "cannot read scratch directory");
                report.failed += 1;
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(dir = %self.dir.display(), error = %e, "directory listing failed");
                    report.failed += 1;
                    break;
                }
            };
            report.scanned += 1;
            let path = entry.path();

            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Deleted by a scheduled delete between listing and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat entry");
                    report.failed += 1;
                    continue;
                }
            };
            if !meta.is_file() {
                debug!(path = %path.display(), "skipping non-file entry");
                report.skipped += 1;
                continue;
            }

            let modified = match meta.modified() {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "no modification time");
                    report.failed += 1;
                    continue;
                }
            };
            if !self.is_expired(now, modified) {
                continue;
            }

            match delete_file(&path).await {
                Ok(true) => {
                    info!(path = %path.display(), "cleaned up old file");
                    report.removed += 1;
                }
                Ok(false) => debug!(path = %path.display(), "already gone"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete old file");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn is_expired(&self, now: DateTime<Utc>, modified: DateTime<Utc>) -> bool {
        // Negative ages (mtime in the future) never expire.
        match (now - modified).to_std() {
            Ok(age) => age > self.max_age,
            Err(_) => false,
        }
    }

    /// A direct child of the scratch directory. `..` and nested paths are
    /// rejected without touching the filesystem.
    fn is_scratch_entry(&self, path: &Path) -> bool {
        let Ok(rest) = path.strip_prefix(&self.dir) else {
            return false;
        };
        let mut components = rest.components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }

    /// Delete `path` after `delay`, in the background.
    ///
    /// Does not wait. Only files directly inside the scratch directory are
    /// accepted.
    pub fn schedule_delete(
        &self,
        path: PathBuf,
        delay: Duration,
    ) -> Result<JoinHandle<()>, ReclaimError> {
        if !self.is_scratch_entry(&path) {
            return Err(ReclaimError::OutsideScratch(path));
        }

        debug!(path = %path.display(), delay_secs = delay.as_secs(), "deletion scheduled");
        Ok(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match delete_file(&path).await {
                Ok(true) => info!(path = %path.display(), "removed temporary file"),
                Ok(false) => debug!(path = %path.display(), "temporary file already gone"),
                Err(e) => error!(path = %path.display(), error = %e, "error removing file"),
            }
        }))
    }
}

/// Owner-side view of the sweep loop.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Ask the loop to stop after the pass in progress.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Resolves only if the loop ends. While serving, that is a fatal
    /// condition for the host.
    pub async fn stopped(&mut self) -> Result<(), ReclaimError> {
        (&mut self.join)
            .await
            .map_err(|e| ReclaimError::SweepTask(e.to_string()))
    }

    pub async fn shutdown_and_join(self) -> Result<(), ReclaimError> {
        self.request_shutdown();
        self.join
            .await
            .map_err(|e| ReclaimError::SweepTask(e.to_string()))
    }
}
