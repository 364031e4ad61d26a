//! Block source trait
//!
//! A block source feeds blocks to the pipeline. The pipeline does not care
//! how blocks are obtained: see [`crate::poller::PollingSource`] for an
//! interval-driven source and [`crate::subscription::SubscriptionSource`]
//! for a push-driven one.

use crate::error::PipelineError;
use crate::types::Block;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Callback a source invokes once per new block, or with an error when
/// fetching failed. The returned future completes once the block has been
/// fully handled.
pub type BlockCallback =
    Arc<dyn Fn(Result<Block, PipelineError>) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Start emitting blocks to `callback`.
    ///
    /// Returns once the source is running; blocks arrive asynchronously after.
    async fn start(&self, callback: BlockCallback) -> Result<(), PipelineError>;

    /// Stop emitting blocks. Safe to call when not running.
    async fn stop(&self) -> Result<(), PipelineError>;
}
