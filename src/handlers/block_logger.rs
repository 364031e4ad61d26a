//! Logs every block that makes it to the end of the chain.

use crate::handler::{Flow, Handler, PipelineContext};
use crate::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Terminal handler reporting what the chain produced.
#[derive(Default)]
pub struct BlockLogger {
    processed: u64,
    purged: u64,
}

impl BlockLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn purged(&self) -> u64 {
        self.purged
    }
}

#[async_trait]
impl Handler for BlockLogger {
    fn name(&self) -> &str {
        "BlockLogger"
    }

    async fn new_block(&mut self, ctx: &PipelineContext, block: &mut Block) -> Result<Flow> {
        self.processed += 1;
        info!(
            block = block.number,
            transactions = block.transactions.len(),
            receipts = block.receipt_count(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Completed block"
        );
        Ok(Flow::Proceed)
    }

    async fn purge_block(&mut self, _ctx: &PipelineContext, block: &mut Block) -> Result<Flow> {
        self.purged += 1;
        debug!(block = block.number, "Block left history window");
        Ok(Flow::Proceed)
    }
}
