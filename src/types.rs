//! Ethereum JSON-RPC types
//!
//! Type definitions for blocks, transactions, and receipts
//! returned from Ethereum JSON-RPC endpoints, plus the fields
//! handlers attach to them while a block moves through the pipeline.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer};

/// Ethereum block as seen by the pipeline.
///
/// Handlers receive `&mut Block` and may rewrite it in place; every handler
/// later in the same traversal sees those changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    /// Block number (hex string in JSON, parsed to u64)
    #[serde(rename = "number", deserialize_with = "deserialize_hex_u64")]
    pub number: u64,

    /// Block hash (null for pending blocks)
    #[serde(rename = "hash", default)]
    pub hash: Option<B256>,

    /// Parent block hash
    #[serde(rename = "parentHash", default)]
    pub parent_hash: Option<B256>,

    /// Unix timestamp (hex string in JSON)
    #[serde(rename = "timestamp", default, deserialize_with = "deserialize_hex_u64")]
    pub timestamp: u64,

    /// Transactions, either bare hashes or full objects depending on how the
    /// block was requested.
    #[serde(rename = "transactions", default)]
    pub transactions: Vec<BlockTransaction>,
}

impl Block {
    /// Create an empty block with the given number.
    pub fn new(number: u64) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    /// True if any transaction entry is only a hash.
    pub fn has_bare_hashes(&self) -> bool {
        self.transactions
            .iter()
            .any(|t| matches!(t, BlockTransaction::Hash(_)))
    }

    /// Iterate over the full transaction objects, skipping bare hashes.
    pub fn full_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter_map(BlockTransaction::as_full)
    }

    /// Number of full transactions with a receipt attached.
    pub fn receipt_count(&self) -> usize {
        self.full_transactions()
            .filter(|t| t.receipt.is_some())
            .count()
    }
}

/// Entry of a block's transaction list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockTransaction {
    /// Returned when the block is requested without full transactions.
    Hash(B256),
    /// Full transaction object.
    Full(Box<Transaction>),
}

impl BlockTransaction {
    pub fn hash(&self) -> B256 {
        match self {
            Self::Hash(hash) => *hash,
            Self::Full(tx) => tx.hash,
        }
    }

    pub fn as_full(&self) -> Option<&Transaction> {
        match self {
            Self::Full(tx) => Some(tx),
            Self::Hash(_) => None,
        }
    }

    pub fn as_full_mut(&mut self) -> Option<&mut Transaction> {
        match self {
            Self::Full(tx) => Some(tx),
            Self::Hash(_) => None,
        }
    }
}

impl From<Transaction> for BlockTransaction {
    fn from(tx: Transaction) -> Self {
        Self::Full(Box::new(tx))
    }
}

/// Ethereum transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transaction {
    /// Transaction hash (hex string in JSON)
    #[serde(rename = "hash")]
    pub hash: B256,

    /// Sender address (hex string in JSON)
    #[serde(rename = "from")]
    pub from: Address,

    /// Recipient address (None for contract creation, hex string in JSON)
    #[serde(rename = "to", default, deserialize_with = "deserialize_hex_address_opt")]
    pub to: Option<Address>,

    /// Value transferred in wei (hex string in JSON)
    #[serde(rename = "value", default, deserialize_with = "deserialize_hex_u256")]
    pub value: U256,

    /// Gas price (legacy transactions, hex string in JSON)
    #[serde(rename = "gasPrice", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub gas_price: Option<U256>,

    /// Max fee per gas (EIP-1559, hex string in JSON)
    #[serde(rename = "maxFeePerGas", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub max_fee_per_gas: Option<U256>,

    /// Transaction input data (hex string in JSON, "0x" for simple transfers)
    #[serde(rename = "input", default, deserialize_with = "deserialize_hex_bytes")]
    pub input: Vec<u8>,

    /// Transaction nonce (hex string in JSON)
    #[serde(rename = "nonce", default, deserialize_with = "deserialize_hex_u64")]
    pub nonce: u64,

    /// Receipt attached by the receipts handler.
    #[serde(skip)]
    pub receipt: Option<Receipt>,

    /// Timestamp of the containing block, stamped by the transactions handler.
    #[serde(skip)]
    pub timestamp: Option<u64>,
}

impl Transaction {
    /// Check if this transaction sends from or to `addr`.
    pub fn touches(&self, addr: &Address) -> bool {
        self.from == *addr || self.to.as_ref() == Some(addr)
    }
}

/// Log entry emitted by a contract during transaction execution.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    /// Address of the contract that emitted the log
    #[serde(rename = "address")]
    pub address: Address,

    /// Indexed topics (topic0 = event signature, topics[1..] = indexed params)
    #[serde(rename = "topics", default)]
    pub topics: Vec<B256>,

    /// Non-indexed event data (hex string)
    #[serde(rename = "data", default, deserialize_with = "deserialize_hex_bytes")]
    pub data: Vec<u8>,
}

/// Transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to
    #[serde(rename = "transactionHash")]
    pub transaction_hash: B256,

    /// Transaction status: 1 = success, 0 = failure (hex string in JSON)
    #[serde(rename = "status", default, deserialize_with = "deserialize_hex_u64")]
    pub status: u64,

    /// Gas used (hex string in JSON)
    #[serde(rename = "gasUsed", default, deserialize_with = "deserialize_hex_u256")]
    pub gas_used: U256,

    /// Effective gas price (post-London, hex string in JSON)
    #[serde(rename = "effectiveGasPrice", default, deserialize_with = "deserialize_hex_u256_opt")]
    pub effective_gas_price: Option<U256>,

    /// Logs emitted during transaction execution (empty for reverted txs)
    #[serde(rename = "logs", default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Check if the transaction succeeded.
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

// Hex deserialization helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Parse a hex quantity into a u64.
pub(crate) fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(s, 16)
}

/// Deserialize a hex string to u64.
fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn hex_to_u256<E: serde::de::Error>(s: &str) -> Result<U256, E> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(U256::ZERO);
    }
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).map_err(E::custom)?;
    if bytes.len() > 32 {
        return Err(E::custom(format!(
            "Expected at most 32 bytes for quantity, got {}",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes))
}

/// Deserialize a hex string to U256.
fn deserialize_hex_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    hex_to_u256(&s)
}

/// Deserialize an optional hex string to U256.
fn deserialize_hex_u256_opt<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| hex_to_u256(&s))
        .transpose()
}

/// Deserialize an optional hex string to Address.
///
/// Contract creations carry `"to": null`; some nodes send an empty string instead.
fn deserialize_hex_address_opt<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    match s {
        Some(s) => {
            let s = s.strip_prefix("0x").unwrap_or(&s);
            if s.is_empty() {
                return Ok(None);
            }
            let s = pad_hex_string(s);
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            if bytes.len() != 20 {
                return Err(serde::de::Error::custom(format!(
                    "Expected 20 bytes for address, got {}",
                    bytes.len()
                )));
            }
            Ok(Some(Address::from_slice(&bytes)))
        }
        None => Ok(None),
    }
}

/// Deserialize a hex string to bytes.
fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        let s = pad_hex_string(s);
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
