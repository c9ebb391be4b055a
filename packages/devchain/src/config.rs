//! Configuration
//!
//! Typed configuration loaded from environment variables (a `.env` file in the
//! working directory is read first when present).

use eyre::{eyre, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::cache::CacheConfig;
use crate::environment::SnapshotId;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_ARTIFACT_PATH: &str = "out/MockERC20.sol/MockERC20.json";
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct DevChainConfig {
    pub rpc_url: Url,
    /// Queried from the node when unset
    pub chain_id: Option<u64>,
    /// Forge artifact holding the mock token creation bytecode
    pub artifact_path: PathBuf,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    /// Snapshot recorded by a previous setup run
    pub snapshot_id: Option<SnapshotId>,
    pub cache: CacheConfig,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("valid default URL"),
            chain_id: None,
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            receipt_timeout: Duration::from_secs(DEFAULT_RECEIPT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            snapshot_id: None,
            cache: CacheConfig::default(),
        }
    }
}

impl DevChainConfig {
    /// Load `.env` (if any), then read the environment
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let rpc_url =
            std::env::var("EVM_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        let chain_id = parse_var("EVM_CHAIN_ID", std::env::var("EVM_CHAIN_ID").ok())?;
        let artifact_path = std::env::var("MOCK_ERC20_ARTIFACT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_PATH));
        let receipt_timeout_secs = parse_var(
            "RECEIPT_TIMEOUT_SECS",
            std::env::var("RECEIPT_TIMEOUT_SECS").ok(),
        )?
        .unwrap_or(DEFAULT_RECEIPT_TIMEOUT_SECS);
        let poll_interval_ms = parse_var(
            "RECEIPT_POLL_INTERVAL_MS",
            std::env::var("RECEIPT_POLL_INTERVAL_MS").ok(),
        )?
        .unwrap_or(DEFAULT_RECEIPT_POLL_INTERVAL_MS);
        let snapshot_id = std::env::var("SNAPSHOT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SnapshotId::new);

        Ok(Self {
            rpc_url: Url::parse(&rpc_url)?,
            chain_id,
            artifact_path,
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            snapshot_id,
            cache: CacheConfig::from_env(),
        })
    }
}

/// Parse an optional variable; a set but malformed value is an error
fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre!("Invalid {} '{}': {}", key, v, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_local_anvil() {
        let config = DevChainConfig::default();
        assert_eq!(config.rpc_url.as_str(), "http://localhost:8545/");
        assert!(config.chain_id.is_none());
        assert!(config.snapshot_id.is_none());
        assert_eq!(config.receipt_timeout, Duration::from_secs(30));
        assert_eq!(
            config.artifact_path,
            PathBuf::from("out/MockERC20.sol/MockERC20.json")
        );
    }

    #[test]
    fn test_parse_var_unset_is_none() {
        assert_eq!(parse_var::<u64>("RECEIPT_TIMEOUT_SECS", None).unwrap(), None);
    }

    #[test]
    fn test_parse_var_reads_value() {
        let secs = parse_var::<u64>("RECEIPT_TIMEOUT_SECS", Some(" 45 ".to_string())).unwrap();
        assert_eq!(secs, Some(45));
    }

    #[test]
    fn test_parse_var_rejects_malformed_value() {
        let err = parse_var::<u64>("RECEIPT_POLL_INTERVAL_MS", Some("fast".to_string()))
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid RECEIPT_POLL_INTERVAL_MS 'fast'"));
    }
}
