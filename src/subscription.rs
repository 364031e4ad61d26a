//! Subscription block source
//!
//! Push-style alternative to polling: subscribes to a stream of new blocks
//! and forwards each item to the pipeline callback. Stopping drops the
//! stream, which releases the subscription.

use crate::error::PipelineError;
use crate::source::{BlockCallback, BlockSource};
use crate::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Something that can open a new-block subscription, e.g. a websocket
/// `newHeads` subscription.
#[async_trait]
pub trait HeadSubscriber: Send + Sync {
    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Block>>>;
}

struct Subscription {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Block source fed by a [`HeadSubscriber`].
///
/// `stop` only prevents further deliveries: a block already handed to the
/// callback is always handled to completion.
pub struct SubscriptionSource {
    subscriber: Arc<dyn HeadSubscriber>,
    active: Mutex<Option<Subscription>>,
}

impl SubscriptionSource {
    pub fn new(subscriber: Arc<dyn HeadSubscriber>) -> Self {
        Self {
            subscriber,
            active: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|sub| !sub.task.is_finished())
    }
}

#[async_trait]
impl BlockSource for SubscriptionSource {
    async fn start(&self, callback: BlockCallback) -> Result<(), PipelineError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|sub| !sub.task.is_finished()) {
            debug!("Subscription already active, ignoring start");
            return Ok(());
        }

        info!("Starting subscription for new blocks");
        let stream = self
            .subscriber
            .subscribe()
            .await
            .map_err(|e| PipelineError::SourceFailure(format!("{:#}", e)))?;

        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(forward(stream, Arc::clone(&stop), callback));
        *active = Some(Subscription { stop, task });
        Ok(())
    }

    async fn stop(&self) -> Result<(), PipelineError> {
        if let Some(sub) = self.active.lock().await.take() {
            info!("Stopping subscription data source");
            // Stored as a permit if the task is busy in the callback.
            sub.stop.notify_one();
        }
        Ok(())
    }
}

/// Hand every stream item to the callback until the stream ends or a stop
/// is signalled. The stream is dropped on return, which unsubscribes.
async fn forward(
    mut stream: BoxStream<'static, Result<Block>>,
    stop: Arc<Notify>,
    callback: BlockCallback,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = stop.notified() => {
                debug!("Subscription cancelled");
                return;
            }
            item = stream.next() => item,
        };

        match item {
            Some(Ok(block)) => {
                debug!(block = block.number, "Incoming block");
                callback(Ok(block)).await;
            }
            Some(Err(e)) => {
                callback(Err(PipelineError::SourceFailure(format!("{:#}", e)))).await;
            }
            None => {
                info!("Block subscription ended");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{channel_callback, StaticSubscriber};
    use std::time::Duration;

    struct RefusingSubscriber;

    #[async_trait]
    impl HeadSubscriber for RefusingSubscriber {
        async fn subscribe(&self) -> Result<BoxStream<'static, Result<Block>>> {
            anyhow::bail!("websocket closed")
        }
    }

    #[tokio::test]
    async fn test_forwards_blocks_and_errors() {
        let subscriber = Arc::new(StaticSubscriber::new(vec![
            Ok(Block::new(1)),
            Err(anyhow::anyhow!("bad frame")),
            Ok(Block::new(2)),
        ]));
        let source = SubscriptionSource::new(subscriber.clone());
        let (callback, mut rx) = channel_callback();

        source.start(callback.clone()).await.unwrap();
        source.start(callback).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap().number, 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            Err(PipelineError::SourceFailure(_))
        ));
        assert_eq!(rx.recv().await.unwrap().unwrap().number, 2);
        assert!(source.is_running().await);
        assert_eq!(subscriber.subscriptions(), 1);

        source.stop().await.unwrap();
        assert!(!source.is_running().await);
        source.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_subscription() {
        let subscriber = Arc::new(StaticSubscriber::new(vec![Ok(Block::new(1))]));
        let source = SubscriptionSource::new(subscriber.clone());
        let (callback, mut rx) = channel_callback();

        source.start(callback).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().number, 1);
        assert_eq!(subscriber.open_streams(), 1);

        source.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(subscriber.open_streams(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_failure() {
        let source = SubscriptionSource::new(Arc::new(RefusingSubscriber));
        let (callback, _rx) = channel_callback();
        let err = source.start(callback).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceFailure(ref m) if m.contains("websocket closed")));
        assert!(!source.is_running().await);
    }
}
