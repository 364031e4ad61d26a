//! JSON-RPC client for Ethereum nodes
//!
//! Defines the [`ChainRpc`] boundary the pipeline, block sources and handlers
//! talk to, and an HTTP implementation of it.

use crate::types::{parse_hex_u64, Block, Receipt};
use alloy_primitives::B256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Chain access needed by the pipeline.
///
/// `Ok(None)` means the node answered with `null`, e.g. a block that is not
/// available yet or a receipt for a pending transaction.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Current head block number.
    async fn block_number(&self) -> Result<u64>;

    /// Get a block by number, optionally with full transaction objects.
    async fn get_block(&self, number: u64, full_transactions: bool) -> Result<Option<Block>>;

    /// Get a transaction receipt by hash.
    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>>;
}

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let json: Value = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        // Extract result
        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let number_str = result
            .as_str()
            .context("Block number response is not a string")?;
        parse_hex_u64(number_str).context("Failed to parse block number")
    }

    async fn get_block(&self, number: u64, full_transactions: bool) -> Result<Option<Block>> {
        let params = json!([format!("0x{:x}", number), full_transactions]);
        let result = self.call("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .with_context(|| format!("Failed to deserialize block {}", number))
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let params = json!([format!("0x{:x}", hash)]);
        let result = self.call("eth_getTransactionReceipt", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .context("Failed to deserialize receipt")
    }
}
