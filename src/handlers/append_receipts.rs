//! Attaches receipts to every transaction of a block.

use super::FETCH_RETRIES;
use crate::handler::{Flow, Handler, PipelineContext};
use crate::retry::RetryContext;
use crate::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error};

/// Fetches the receipt of each full transaction that does not have one yet.
/// Receipts are requested concurrently; a receipt that cannot be fetched is
/// logged and the transaction is left without one.
pub struct AppendReceipts {
    retry: RetryContext,
}

impl AppendReceipts {
    pub fn new() -> Self {
        Self {
            retry: RetryContext::new("getTransactionReceipt")
                .max_retries(FETCH_RETRIES)
                .retry_empty(true),
        }
    }
}

impl Default for AppendReceipts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for AppendReceipts {
    fn name(&self) -> &str {
        "AppendReceipts"
    }

    async fn new_block(&mut self, ctx: &PipelineContext, block: &mut Block) -> Result<Flow> {
        let pending: Vec<_> = block
            .transactions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_full().map(|tx| (i, tx)))
            .filter(|(_, tx)| tx.receipt.is_none())
            .map(|(i, tx)| (i, tx.hash))
            .collect();

        if pending.is_empty() {
            return Ok(Flow::Proceed);
        }

        debug!("Appending receipts to {} transactions", pending.len());
        let rpc = &ctx.rpc;
        let retry = &self.retry;
        let results = join_all(pending.iter().map(|&(_, hash)| {
            retry.invoke(move || rpc.get_transaction_receipt(hash))
        }))
        .await;

        let mut attached = 0;
        for ((index, hash), result) in pending.into_iter().zip(results) {
            match result {
                Ok(Some(receipt)) => {
                    if let Some(tx) = block.transactions[index].as_full_mut() {
                        tx.receipt = Some(receipt);
                        attached += 1;
                    }
                }
                Ok(None) => error!("Did not get receipt for {:?}", hash),
                Err(e) => error!("Problem retrieving receipt for {:?}: {}", hash, e),
            }
        }

        debug!(
            "Retrieved {} receipts in {}ms",
            attached,
            ctx.elapsed().as_millis()
        );
        Ok(Flow::Proceed)
    }
}
