//! RelayBuilder - アプリケーションの構築とワイヤリング
//!
//! 設定の検証、scratch ディレクトリの作成、各コンポーネントの組み立てを
//! `build()` でまとめて行います。足りないものがあれば起動時に失敗させます。

use std::io;
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::reclaimer::{ReclaimError, StorageReclaimer, SweepHandle};
use super::relay::Relay;
use super::runner::JobRunner;
use super::scratch::ScratchDir;
use crate::config::{ConfigError, RelayConfig};
use crate::impls::YtDlpExtractor;
use crate::ports::{ArtifactSink, Clock, IdGenerator, MediaExtractor, SystemClock, UlidGenerator};

/// RelayBuilder は App を構築
///
/// # 使用例
/// ```ignore
/// let app = RelayBuilder::new(config)
///     .sink(Arc::new(MySink))
///     .build()?;
/// let sweep = app.start_sweep()?;
/// ```
///
/// extractor を指定しなければ設定どおりの YtDlpExtractor を使います。
/// sink だけは必須です。
pub struct RelayBuilder {
    config: RelayConfig,
    extractor: Option<Arc<dyn MediaExtractor>>,
    sink: Option<Arc<dyn ArtifactSink>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no artifact sink was configured")]
    MissingSink,

    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] io::Error),
}

impl RelayBuilder {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            extractor: None,
            sink: None,
            clock: None,
            ids: None,
        }
    }

    pub fn extractor(mut self, extractor: Arc<dyn MediaExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - RelayConfig::validate が通ること
    /// - sink が設定されていること
    /// - scratch ディレクトリが作れること
    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;
        let sink = self.sink.ok_or(BuildError::MissingSink)?;

        let scratch =
            ScratchDir::create(self.config.scratch_root.as_deref()).map_err(BuildError::Scratch)?;
        let dir = scratch.path().to_path_buf();

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(YtDlpExtractor::new(&self.config.extractor)));

        let runner = JobRunner::new(
            extractor,
            ids,
            dir.clone(),
            &self.config.limits,
            self.config.audio.clone(),
        );
        let reclaimer = Arc::new(StorageReclaimer::new(dir, &self.config.reclaim, clock));
        let relay = Arc::new(Relay::new(
            runner,
            Arc::clone(&reclaimer),
            sink,
            self.config.delivery.clone(),
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&relay), self.config.limits.max_concurrent_jobs);

        Ok(App {
            scratch,
            reclaimer,
            relay,
            dispatcher,
        })
    }
}

/// App は組み立て済みのリレー
///
/// scratch ディレクトリは App が drop されると中身ごと消えます。
pub struct App {
    scratch: ScratchDir,
    pub reclaimer: Arc<StorageReclaimer>,
    pub relay: Arc<Relay>,
    pub dispatcher: Dispatcher,
}

impl App {
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Must be called from inside a tokio runtime.
    pub fn start_sweep(&self) -> Result<SweepHandle, ReclaimError> {
        self.reclaimer.start_sweep()
    }
}
