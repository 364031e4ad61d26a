//! Block pipeline
//!
//! Receives blocks from a [`BlockSource`] (or from [`Pipeline::push`]) and
//! runs each one through an ordered chain of handlers. The most recent blocks
//! are kept in a bounded history window; when a new block would overflow the
//! window, the oldest block is evicted and run through the chain again with
//! purge semantics so handlers can drop state kept for it.
//!
//! Handlers and window live behind a single async mutex held for a whole
//! ingest (purge + process), so at most one traversal is in flight and blocks
//! reach handlers strictly in arrival order.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::handler::{Flow, Handler, PipelineContext};
use crate::rpc::ChainRpc;
use crate::source::{BlockCallback, BlockSource};
use crate::types::Block;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// How a single chain traversal ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every handler proceeded.
    Completed,
    /// A handler rejected the block; later handlers were skipped.
    Rejected { handler: String },
    /// A handler returned an error; later handlers were skipped.
    Failed { handler: String },
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Process,
    Purge,
}

struct Chain {
    handlers: Vec<Box<dyn Handler>>,
    window: VecDeque<Block>,
    window_size: usize,
    rpc: Arc<dyn ChainRpc>,
}

impl Chain {
    /// Initialize every handler in order. A failing handler is logged and
    /// skipped; the rest still get initialized.
    async fn init_handlers(&mut self) {
        let ctx = PipelineContext::new(Arc::clone(&self.rpc));
        for handler in self.handlers.iter_mut() {
            debug!("Initializing handler {}", handler.name());
            if let Err(e) = handler.init(&ctx).await {
                let failure = PipelineError::HandlerFailure {
                    handler: handler.name().to_string(),
                    reason: format!("{:#}", e),
                };
                error!("Problem initializing handler: {}", failure);
            }
        }
        debug!(
            "Initialized {} handlers in {}ms",
            self.handlers.len(),
            ctx.elapsed().as_millis()
        );
    }

    async fn ingest(&mut self, block: Block) -> Outcome {
        debug!("Current block history size {}", self.window.len());
        while self.window.len() >= self.window_size {
            let Some(mut oldest) = self.window.pop_front() else {
                break;
            };
            debug!(
                block = oldest.number,
                "Purging block to maintain block history window"
            );
            traverse(&mut self.handlers, &self.rpc, Stage::Purge, &mut oldest).await;
        }

        self.window.push_back(block);
        match self.window.back_mut() {
            Some(block) => traverse(&mut self.handlers, &self.rpc, Stage::Process, block).await,
            None => Outcome::Completed,
        }
    }
}

/// Run `block` through the handlers in order until one rejects or fails.
///
/// Never fails itself: handler errors are logged and end the traversal.
async fn traverse(
    handlers: &mut [Box<dyn Handler>],
    rpc: &Arc<dyn ChainRpc>,
    stage: Stage,
    block: &mut Block,
) -> Outcome {
    let ctx = PipelineContext::new(Arc::clone(rpc));
    debug!(block = block.number, ?stage, "Starting chain traversal");

    for handler in handlers.iter_mut() {
        debug!("Calling handler {}", handler.name());
        let result = match stage {
            Stage::Process => handler.new_block(&ctx, block).await,
            Stage::Purge => handler.purge_block(&ctx, block).await,
        };

        match result {
            Ok(Flow::Proceed) => {}
            Ok(Flow::Reject) => {
                debug!(
                    block = block.number,
                    "Handler {} rejected block. Short-circuiting pipeline",
                    handler.name()
                );
                return Outcome::Rejected {
                    handler: handler.name().to_string(),
                };
            }
            Err(e) => {
                let failure = PipelineError::HandlerFailure {
                    handler: handler.name().to_string(),
                    reason: format!("{:#}", e),
                };
                error!(block = block.number, ?stage, "Problem with block handler: {}", failure);
                return Outcome::Failed {
                    handler: handler.name().to_string(),
                };
            }
        }
    }

    debug!(
        block = block.number,
        ?stage,
        "Completed {} handlers in {}ms",
        handlers.len(),
        ctx.elapsed().as_millis()
    );
    Outcome::Completed
}

/// Ordered handler chain fed by a block source.
pub struct Pipeline {
    source: Arc<dyn BlockSource>,
    chain: Arc<Mutex<Chain>>,
    started: AtomicBool,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn BlockSource>,
        rpc: Arc<dyn ChainRpc>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            source,
            chain: Arc::new(Mutex::new(Chain {
                handlers: Vec::new(),
                window: VecDeque::with_capacity(config.history_window_size),
                window_size: config.history_window_size,
                rpc,
            })),
            started: AtomicBool::new(false),
        })
    }

    /// Append a handler to the chain.
    ///
    /// Chain order is fixed once the pipeline has been started.
    pub fn use_handler<H>(&mut self, handler: H) -> Result<&mut Self, PipelineError>
    where
        H: Handler + 'static,
    {
        if handler.name().trim().is_empty() {
            return Err(PipelineError::InvalidHandler(
                "handler name must not be empty".into(),
            ));
        }
        let chain = self.chain_before_start(handler.name())?;
        chain.handlers.push(Box::new(handler));
        Ok(self)
    }

    /// Pre-populate the history window with blocks already processed in an
    /// earlier run, oldest first. They will be purged as new blocks arrive.
    pub fn seed_history(&mut self, blocks: Vec<Block>) -> Result<&mut Self, PipelineError> {
        let chain = self.chain_before_start("history")?;
        if chain.window.len() + blocks.len() > chain.window_size {
            return Err(PipelineError::Validation(format!(
                "history of {} blocks exceeds window size {}",
                chain.window.len() + blocks.len(),
                chain.window_size
            )));
        }
        chain.window.extend(blocks);
        Ok(self)
    }

    fn chain_before_start(&mut self, what: &str) -> Result<&mut Chain, PipelineError> {
        let locked = || {
            PipelineError::InvalidHandler(format!(
                "cannot add {} after the pipeline has started",
                what
            ))
        };
        if *self.started.get_mut() {
            return Err(locked());
        }
        // Nothing else holds the chain before start.
        Arc::get_mut(&mut self.chain)
            .map(Mutex::get_mut)
            .ok_or_else(locked)
    }

    /// Initialize the handlers and start the block source.
    ///
    /// Returns once the source is running; it does not wait for blocks.
    /// Handlers are only initialized on the first successful start: if the
    /// source fails to start, the pipeline is left unstarted and the next
    /// start initializes them again.
    pub async fn start(&self) -> Result<(), PipelineError> {
        {
            let mut chain = self.chain.lock().await;
            if chain.handlers.is_empty() {
                return Err(PipelineError::NoHandlers);
            }
            if !self.started.swap(true, Ordering::SeqCst) {
                chain.init_handlers().await;
            }
        }

        let chain = Arc::clone(&self.chain);
        let callback: BlockCallback = Arc::new(move |result| {
            let chain = Arc::clone(&chain);
            async move {
                match result {
                    Ok(block) => {
                        debug!(block = block.number, "Getting block");
                        chain.lock().await.ingest(block).await;
                    }
                    Err(e) => error!("Problem getting block in source: {}", e),
                }
            }
            .boxed()
        });

        info!("Starting block source");
        if let Err(e) = self.source.start(callback).await {
            error!("Block source failed to start: {}", e);
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// Stop the block source. Blocks in the history window are kept.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        info!("Stopping block source");
        self.source.stop().await
    }

    /// Send a block through the handlers directly, e.g. to replay history.
    ///
    /// Resolves after the block (and any purge it triggers) has been fully
    /// handled. Blocks pushed here and blocks from the source share one path.
    pub async fn push(&self, block: Block) -> Result<Outcome, PipelineError> {
        let mut chain = self.chain.lock().await;
        if chain.handlers.is_empty() {
            return Err(PipelineError::NoHandlers);
        }
        Ok(chain.ingest(block).await)
    }

    /// Numbers of the blocks in the history window, oldest first.
    pub async fn history(&self) -> Vec<u64> {
        let chain = self.chain.lock().await;
        chain.window.iter().map(|b| b.number).collect()
    }

    pub async fn handler_count(&self) -> usize {
        self.chain.lock().await.handlers.len()
    }
}
