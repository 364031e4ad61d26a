//! Configuration and watchlist loading
//!
//! Pipeline and poller settings with their defaults, plus loading an
//! address watchlist from a file for the address filter.
//! Each watchlist line should contain one Ethereum address in hex format.

use crate::error::PipelineError;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Number of blocks kept in memory before the oldest is purged.
pub const DEFAULT_HISTORY_WINDOW_SIZE: usize = 50;

/// Time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of blocks held in the history window
    pub history_window_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window_size: DEFAULT_HISTORY_WINDOW_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.history_window_size == 0 {
            return Err(PipelineError::Validation(
                "history_window_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Polling block source settings.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Time between the start of consecutive poll cycles
    pub interval: Duration,
    /// Last block already processed; polling resumes right after it.
    /// When unset, polling starts at the newest confirmed block.
    pub last_known_block: Option<u64>,
    /// Stay this many blocks behind the confirmed head
    pub lag_blocks: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            last_known_block: None,
            lag_blocks: 0,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.interval.is_zero() {
            return Err(PipelineError::Validation(
                "polling interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Load a watchlist from a file.
///
/// Each line should contain one Ethereum address in hex format (with or without 0x prefix).
/// Empty lines and lines starting with '#' are ignored.
///
/// # Example file format:
/// ```text
/// 0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb
/// 0xdAC17F958D2ee523a2206206994597C13D831ec7
/// # This is a comment
/// ```
pub fn load_watchlist(path: &Path) -> Result<Vec<Address>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read watchlist file: {:?}", path))?;

    let mut addresses = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let addr = parse_address(line)
            .with_context(|| format!("Invalid address on line {}: {}", line_num + 1, line))?;

        addresses.push(addr);
    }

    if addresses.is_empty() {
        anyhow::bail!("Watchlist is empty (no valid addresses found)");
    }

    Ok(addresses)
}

/// Parse an address from a hex string.
///
/// Accepts addresses with or without 0x prefix.
fn parse_address(s: &str) -> Result<Address> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).with_context(|| format!("Invalid hex address: {}", s))?;

    if bytes.len() != 20 {
        anyhow::bail!(
            "Address must be 20 bytes (40 hex chars), got {} bytes",
            bytes.len()
        );
    }

    Ok(Address::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_watchlist() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0x0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        writeln!(file, "# This is a comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        file.flush().unwrap();

        let addresses = load_watchlist(file.path()).unwrap();
        assert_eq!(addresses.len(), 2);
    }

    #[test]
    fn test_load_watchlist_empty() {
        let file = NamedTempFile::new().unwrap();
        let result = load_watchlist(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_watchlist_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0x0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        writeln!(file, "not-an-address").unwrap();
        file.flush().unwrap();

        let err = load_watchlist(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_parse_address() {
        let addr1 = parse_address("0x0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        let addr2 = parse_address("0742d35Cc6634C0532925a3b844Bc9e7595f0bEb").unwrap();
        assert_eq!(addr1, addr2);
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_defaults_and_validation() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.history_window_size, 50);
        assert!(pipeline.validate().is_ok());
        assert!(PipelineConfig {
            history_window_size: 0
        }
        .validate()
        .is_err());

        let polling = PollingConfig::default();
        assert_eq!(polling.interval, Duration::from_secs(10));
        assert_eq!(polling.lag_blocks, 0);
        assert!(polling.last_known_block.is_none());
        assert!(PollingConfig {
            interval: Duration::ZERO,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
