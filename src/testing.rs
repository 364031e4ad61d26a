//! Test doubles shared by the unit tests.

use crate::error::PipelineError;
use crate::rpc::ChainRpc;
use crate::source::BlockCallback;
use crate::subscription::HeadSubscriber;
use crate::types::{Block, BlockTransaction, Receipt, Transaction};
use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Transactions generated for every mock block.
pub const TXS_PER_BLOCK: u64 = 3;

pub fn sender() -> Address {
    Address::repeat_byte(0x11)
}

pub fn recipient(index: u64) -> Address {
    Address::repeat_byte(0x20 + index as u8)
}

pub fn tx_hash(block: u64, index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&block.to_be_bytes());
    bytes[24..].copy_from_slice(&index.to_be_bytes());
    B256::from(bytes)
}

pub fn full_transaction(block: u64, index: u64) -> Transaction {
    Transaction {
        hash: tx_hash(block, index),
        from: sender(),
        to: Some(recipient(index)),
        value: U256::from(1000 + index),
        nonce: index,
        ..Default::default()
    }
}

/// In-memory chain: every block up to `head` exists and carries
/// `TXS_PER_BLOCK` transactions from `sender()` to `recipient(i)`.
#[derive(Default)]
pub struct MockRpc {
    pub head: AtomicU64,
    pub head_calls: AtomicUsize,
    pub receipt_calls: AtomicUsize,
    pub fail_head: AtomicBool,
    pub fail_blocks: AtomicBool,
    fetched: Mutex<Vec<u64>>,
    hidden_blocks: Mutex<HashSet<u64>>,
    missing_receipts: Mutex<HashSet<B256>>,
}

impl MockRpc {
    pub fn new(head: u64) -> Self {
        let rpc = Self::default();
        rpc.head.store(head, Ordering::SeqCst);
        rpc
    }

    /// Make `get_block` answer `null` for this block.
    pub fn hide_block(&self, number: u64) {
        self.hidden_blocks.lock().unwrap().insert(number);
    }

    pub fn reveal_block(&self, number: u64) {
        self.hidden_blocks.lock().unwrap().remove(&number);
    }

    /// Make `get_transaction_receipt` answer `null` for this transaction.
    pub fn drop_receipt(&self, hash: B256) {
        self.missing_receipts.lock().unwrap().insert(hash);
    }

    /// Block numbers requested through `get_block`, in call order.
    pub fn fetched_blocks(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn block_number(&self) -> Result<u64> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_block(&self, number: u64, full_transactions: bool) -> Result<Option<Block>> {
        self.fetched.lock().unwrap().push(number);
        if self.fail_blocks.load(Ordering::SeqCst) {
            anyhow::bail!("upstream unavailable");
        }
        if number > self.head.load(Ordering::SeqCst)
            || self.hidden_blocks.lock().unwrap().contains(&number)
        {
            return Ok(None);
        }

        let transactions = (0..TXS_PER_BLOCK)
            .map(|i| {
                if full_transactions {
                    full_transaction(number, i).into()
                } else {
                    BlockTransaction::Hash(tx_hash(number, i))
                }
            })
            .collect();

        Ok(Some(Block {
            number,
            timestamp: 1_700_000_000 + number * 12,
            transactions,
            ..Default::default()
        }))
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_receipts.lock().unwrap().contains(&hash) {
            return Ok(None);
        }
        Ok(Some(Receipt {
            transaction_hash: hash,
            status: 1,
            gas_used: U256::from(21000u64),
            effective_gas_price: None,
            logs: Vec::new(),
        }))
    }
}

/// Callback that forwards everything a source emits into a channel.
pub fn channel_callback() -> (
    BlockCallback,
    mpsc::UnboundedReceiver<Result<Block, PipelineError>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: BlockCallback = Arc::new(move |result| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(result);
        }
        .boxed()
    });
    (callback, rx)
}

/// Subscriber that emits a fixed list of items, then stays open until the
/// stream is dropped.
pub struct StaticSubscriber {
    items: Mutex<Vec<Result<Block>>>,
    subscriptions: AtomicUsize,
    live: Arc<()>,
}

impl StaticSubscriber {
    pub fn new(items: Vec<Result<Block>>) -> Self {
        Self {
            items: Mutex::new(items),
            subscriptions: AtomicUsize::new(0),
            live: Arc::new(()),
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        Arc::strong_count(&self.live) - 1
    }
}

#[async_trait]
impl HeadSubscriber for StaticSubscriber {
    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Block>>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let items = std::mem::take(&mut *self.items.lock().unwrap());
        let guard = Arc::clone(&self.live);
        Ok(stream::iter(items)
            .chain(stream::pending())
            .inspect(move |_| {
                let _live = &guard;
            })
            .boxed())
    }
}
