//! Address filter
//!
//! Narrows a block down to the transactions sent from or to a set of
//! watched addresses, and rejects blocks where none match.

use crate::error::PipelineError;
use crate::handler::{Flow, Handler, PipelineContext};
use crate::types::{Block, BlockTransaction};
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

/// Keeps only transactions touching a watched address.
///
/// Bare transaction hashes cannot be matched and are dropped, so place this
/// after [`super::AppendTransactions`].
pub struct FilterAddress {
    targets: HashSet<Address>,
}

impl FilterAddress {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Result<Self, PipelineError> {
        let targets: HashSet<Address> = addresses.into_iter().collect();
        if targets.is_empty() {
            return Err(PipelineError::InvalidHandler(
                "FilterAddress needs at least one target address".into(),
            ));
        }
        Ok(Self { targets })
    }

    fn matches(&self, tx: &BlockTransaction) -> bool {
        tx.as_full()
            .is_some_and(|tx| self.targets.iter().any(|addr| tx.touches(addr)))
    }
}

#[async_trait]
impl Handler for FilterAddress {
    fn name(&self) -> &str {
        "FilterAddress"
    }

    async fn new_block(&mut self, _ctx: &PipelineContext, block: &mut Block) -> Result<Flow> {
        let before = block.transactions.len();
        let matching: Vec<BlockTransaction> = block
            .transactions
            .iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect();

        if matching.is_empty() {
            debug!(block = block.number, "Rejecting block since no matching txns found");
            return Ok(Flow::Reject);
        }

        debug!(
            block = block.number,
            "Replacing block transactions with new set. Was {}, will now be {}",
            before,
            matching.len()
        );
        block.transactions = matching;
        Ok(Flow::Proceed)
    }
}
