//! blockpipe - Ethereum block processing pipeline
//!
//! Feeds blocks from a pluggable source (polling or subscription) through an
//! ordered chain of handlers that may enrich, filter or reject each block,
//! while keeping a bounded window of recent blocks and telling handlers when
//! a block leaves it.

pub mod config;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod retry;

// Block sources
pub mod poller;
pub mod source;
pub mod subscription;

// Chain access
pub mod rpc;
pub mod types;

pub mod handlers;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the main types for convenience
pub use config::{PipelineConfig, PollingConfig};
pub use error::PipelineError;
pub use handler::{Flow, Handler, PipelineContext};
pub use pipeline::{Outcome, Pipeline};
pub use poller::PollingSource;
pub use retry::RetryContext;
pub use rpc::{ChainRpc, RpcClient};
pub use source::{BlockCallback, BlockSource};
pub use subscription::{HeadSubscriber, SubscriptionSource};
pub use types::{Block, BlockTransaction, Receipt, Transaction};
