//! ArtifactSink port - 完成した artifact の配送先
//!
//! チャットへのアップロード、ローカルへのコピーなど。
//! 配送が終わったファイルの削除は sink ではなく reclaimer の仕事です。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Artifact, JobRequest};

/// DeliveryError は配送の失敗
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("delivery I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// ArtifactSink は artifact を依頼者に届ける
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn deliver(&self, request: &JobRequest, artifact: &Artifact) -> Result<(), DeliveryError>;
}
