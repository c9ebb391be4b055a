//! Setup error types
//!
//! Remote failures travel as plain `eyre` reports. The variants here are the
//! conditions the setup routine detects itself, so callers can tell them apart
//! with `report.downcast_ref::<SetupError>()`.

use alloy::primitives::B256;
use std::time::Duration;
use thiserror::Error;

use crate::environment::SnapshotId;

#[derive(Debug, Error)]
pub enum SetupError {
    /// Deployment was confirmed but the receipt carries no contract address
    #[error("deployment 0x{tx_hash:x} confirmed without a contract address")]
    MissingContractAddress { tx_hash: B256 },

    /// Receipt reported a failed status
    #[error("transaction 0x{tx_hash:x} reverted")]
    TransactionReverted { tx_hash: B256 },

    /// No receipt arrived before the configured timeout
    #[error("transaction 0x{tx_hash:x} not confirmed after {timeout:?}")]
    ReceiptTimeout { tx_hash: B256, timeout: Duration },

    /// The node answered `evm_revert` with `false`
    #[error("test chain refused to revert to snapshot {id}")]
    RevertRejected { id: SnapshotId },

    /// A setup mutation is already in flight
    #[error("setup is already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_address_message_includes_hash() {
        let err = SetupError::MissingContractAddress {
            tx_hash: B256::repeat_byte(0xab),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("deployment 0xabab"));
        assert!(msg.ends_with("without a contract address"));
    }

    #[test]
    fn test_downcast_from_report() {
        let report = eyre::Report::new(SetupError::RevertRejected {
            id: SnapshotId::new("0x1"),
        });
        assert!(matches!(
            report.downcast_ref::<SetupError>(),
            Some(SetupError::RevertRejected { .. })
        ));
        assert_eq!(
            report.to_string(),
            "test chain refused to revert to snapshot 0x1"
        );
    }
}
