//! Ready-made pipeline handlers.

pub mod append_receipts;
pub mod append_transactions;
pub mod block_logger;
pub mod filter_address;

pub use append_receipts::AppendReceipts;
pub use append_transactions::AppendTransactions;
pub use block_logger::BlockLogger;
pub use filter_address::FilterAddress;

/// Retries used by handlers that fetch data from the node.
pub const FETCH_RETRIES: u32 = 10;
