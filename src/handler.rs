//! Handler trait and context for pipeline stages
//!
//! A pipeline is an ordered chain of handlers. Each handler sees every
//! ingested block in registration order and decides whether the block moves
//! on to the next handler.

use crate::rpc::ChainRpc;
use crate::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared context handed to every handler during one chain traversal.
///
/// A fresh context is built for each init pass, each new block and each
/// purge, and dropped once the traversal completes.
#[derive(Clone)]
pub struct PipelineContext {
    /// RPC client for fetching transactions, receipts, etc.
    pub rpc: Arc<dyn ChainRpc>,
    /// When the traversal started
    pub started: Instant,
}

impl PipelineContext {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            rpc,
            started: Instant::now(),
        }
    }

    /// Time spent in this traversal so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// What a handler wants to happen to the block after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand the block to the next handler.
    Proceed,
    /// Stop here; later handlers never see this block in this traversal.
    Reject,
}

/// Block-processing stage.
///
/// Handlers are called in sequence by the pipeline, never concurrently with
/// each other. The block is only borrowed for the duration of a call; a
/// handler must not keep references to it.
///
/// Returning `Err` from `new_block` or `purge_block` halts the chain at that
/// handler exactly like [`Flow::Reject`], except the error is logged.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Called once before the pipeline starts ingesting blocks.
    async fn init(&mut self, _ctx: &PipelineContext) -> Result<()> {
        Ok(())
    }

    /// Process a newly ingested block.
    async fn new_block(&mut self, _ctx: &PipelineContext, _block: &mut Block) -> Result<Flow> {
        Ok(Flow::Proceed)
    }

    /// Release any state kept for a block that left the history window.
    async fn purge_block(&mut self, _ctx: &PipelineContext, _block: &mut Block) -> Result<Flow> {
        Ok(Flow::Proceed)
    }
}
