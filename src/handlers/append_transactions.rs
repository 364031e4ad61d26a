//! Replaces bare transaction hashes with full transaction objects.

use super::FETCH_RETRIES;
use crate::handler::{Flow, Handler, PipelineContext};
use crate::retry::RetryContext;
use crate::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error};

/// Makes sure every block carries full transactions, fetching the block
/// again when it only has hashes (or nothing), and stamps each transaction
/// with the block timestamp.
pub struct AppendTransactions {
    retry: RetryContext,
}

impl AppendTransactions {
    pub fn new() -> Self {
        Self {
            retry: RetryContext::new("getTransactions")
                .max_retries(FETCH_RETRIES)
                .retry_empty(true),
        }
    }
}

impl Default for AppendTransactions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for AppendTransactions {
    fn name(&self) -> &str {
        "AppendTransactions"
    }

    async fn new_block(&mut self, ctx: &PipelineContext, block: &mut Block) -> Result<Flow> {
        if block.transactions.is_empty() || block.has_bare_hashes() {
            debug!("Requesting transactions for block {}", block.number);
            let rpc = &ctx.rpc;
            let number = block.number;
            match self
                .retry
                .invoke(move || rpc.get_block(number, true))
                .await
            {
                Ok(Some(full)) => {
                    block.transactions = full.transactions;
                    debug!(
                        "Retrieved {} txns in {}ms",
                        block.transactions.len(),
                        ctx.elapsed().as_millis()
                    );
                }
                Ok(None) => {}
                Err(e) => error!("Problem getting block {} with transactions: {}", number, e),
            }
        } else {
            debug!("Block {} already has transactions", block.number);
        }

        let timestamp = block.timestamp;
        for tx in block
            .transactions
            .iter_mut()
            .filter_map(|t| t.as_full_mut())
        {
            tx.timestamp = Some(timestamp);
        }

        Ok(Flow::Proceed)
    }
}
