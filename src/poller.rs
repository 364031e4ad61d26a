//! Polling block source
//!
//! Periodically asks the node for its head block and fetches, one at a time,
//! every block between the last delivered block and the confirmed head.
//!
//! State lives behind a per-source mutex: the running flag, a run epoch, the
//! last processed block number and the wake-up handle of the sleeping poll
//! loop. Each `start` bumps the epoch, so a loop left over from an earlier
//! run can never keep polling after a quick stop/start.

use crate::config::PollingConfig;
use crate::error::PipelineError;
use crate::retry::RetryContext;
use crate::rpc::ChainRpc;
use crate::source::{BlockCallback, BlockSource};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Retries for every RPC call made by a poll cycle.
pub const POLL_RETRIES: u32 = 10;

struct PollState {
    polling: bool,
    epoch: u64,
    last_block: Option<u64>,
    wake: Option<Arc<Notify>>,
}

struct Shared {
    rpc: Arc<dyn ChainRpc>,
    config: PollingConfig,
    state: Mutex<PollState>,
}

/// Block source that polls the chain head on a fixed interval.
pub struct PollingSource {
    shared: Arc<Shared>,
}

impl PollingSource {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: PollingConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let state = PollState {
            polling: false,
            epoch: 0,
            last_block: config.last_known_block,
            wake: None,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                rpc,
                config,
                state: Mutex::new(state),
            }),
        })
    }

    pub async fn is_polling(&self) -> bool {
        self.shared.state.lock().await.polling
    }

    /// Number of the last block handed to the callback.
    pub async fn last_block(&self) -> Option<u64> {
        self.shared.state.lock().await.last_block
    }
}

#[async_trait]
impl BlockSource for PollingSource {
    async fn start(&self, callback: BlockCallback) -> Result<(), PipelineError> {
        let setup = Instant::now();
        let (epoch, wake) = {
            let mut state = self.shared.state.lock().await;
            if state.polling {
                debug!("Poller already running, ignoring start");
                return Ok(());
            }
            state.polling = true;
            state.epoch += 1;
            let wake = Arc::new(Notify::new());
            state.wake = Some(Arc::clone(&wake));
            (state.epoch, wake)
        };

        let delay = next_delay(self.shared.config.interval, setup.elapsed());
        info!("Scheduling poll after {:?}", delay);
        tokio::spawn(Arc::clone(&self.shared).run(epoch, wake, callback, delay));
        Ok(())
    }

    async fn stop(&self) -> Result<(), PipelineError> {
        let wake = {
            let mut state = self.shared.state.lock().await;
            state.polling = false;
            state.wake.take()
        };
        if let Some(wake) = wake {
            debug!("Clearing scheduled poll");
            wake.notify_one();
        }
        Ok(())
    }
}

impl Shared {
    async fn is_active(&self, epoch: u64) -> bool {
        let state = self.state.lock().await;
        state.polling && state.epoch == epoch
    }

    async fn run(
        self: Arc<Self>,
        epoch: u64,
        wake: Arc<Notify>,
        callback: BlockCallback,
        mut delay: Duration,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wake.notified() => {
                    debug!("Poll loop cancelled while waiting");
                    return;
                }
            }

            let started = Instant::now();
            if !self.is_active(epoch).await {
                info!("Polling stopped");
                return;
            }

            self.poll_cycle(epoch, &callback).await;

            if !self.is_active(epoch).await {
                debug!("No longer polling, not scheduling next poll cycle");
                return;
            }
            delay = next_delay(self.config.interval, started.elapsed());
            debug!("Next poll in {:?}", delay);
        }
    }

    fn retry_context(self: &Arc<Self>, name: &str, epoch: u64) -> RetryContext {
        let shared = Arc::clone(self);
        RetryContext::new(name)
            .max_retries(POLL_RETRIES)
            .continue_while(move || {
                let shared = Arc::clone(&shared);
                async move { shared.is_active(epoch).await }
            })
    }

    async fn poll_cycle(self: &Arc<Self>, epoch: u64, callback: &BlockCallback) {
        let rpc = &self.rpc;

        let head = match self
            .retry_context("getBlockNumber", epoch)
            .invoke(move || async move { rpc.block_number().await.map(Some) })
            .await
        {
            Ok(head) => head.unwrap_or_default(),
            Err(PipelineError::RetryAborted { .. }) => return,
            Err(e) => {
                error!("Could not determine current block, waiting for next run: {}", e);
                callback(Err(e)).await;
                return;
            }
        };

        // Stay one block behind the tip, plus any configured lag.
        let target = head.saturating_sub(1).saturating_sub(self.config.lag_blocks);

        let mut last = {
            let mut state = self.state.lock().await;
            *state.last_block.get_or_insert(target.saturating_sub(1))
        };

        if target <= last {
            debug!(last, target, "No new blocks to retrieve, waiting for next poll cycle");
            return;
        }

        let retry = self.retry_context("getBlock", epoch).retry_empty(true);
        while last < target {
            if !self.is_active(epoch).await {
                info!("Polling stopped");
                break;
            }

            let next = last + 1;
            let block = match retry.invoke(move || rpc.get_block(next, true)).await {
                Ok(Some(block)) => block,
                Ok(None) | Err(PipelineError::RetryAborted { .. }) => break,
                Err(e) => {
                    error!(block = next, "Problem fetching block: {}", e);
                    callback(Err(e)).await;
                    break;
                }
            };

            let number = block.number;
            if number <= last {
                warn!(
                    requested = next,
                    received = number,
                    "Node returned an already processed block, ending cycle"
                );
                break;
            }

            debug!(block = number, "Sending block to callback");
            callback(Ok(block)).await;
            last = number;
            self.state.lock().await.last_block = Some(number);
        }
    }
}

/// Delay until the next cycle: the interval minus time already spent,
/// or a full interval if the cycle overran.
fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.checked_sub(elapsed).unwrap_or(interval)
}
