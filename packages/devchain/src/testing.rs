//! In-memory test doubles for the chain clients and the query cache
//!
//! `MockChain` implements all three client seams and records every call in
//! order, so tests can assert on the exact sequence the setup routine issued.

use alloy::primitives::{address, Address, B256};
use async_trait::async_trait;
use eyre::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cache::CacheInvalidator;
use crate::client::{
    DeployRequest, ReceiptReader, ReceiptSummary, TestChainControl, TransactionSubmitter,
    WriteRequest,
};
use crate::environment::SnapshotId;
use crate::error::SetupError;

/// One recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    Deploy(DeployRequest),
    Write(WriteRequest),
    WaitReceipt(B256),
    Snapshot,
    Revert(SnapshotId),
}

#[derive(Default)]
struct MockState {
    calls: Vec<ChainCall>,
    deploy_hashes: HashSet<B256>,
    tx_count: u64,
    receipt_count: usize,
    snapshot_count: u64,
}

/// Scripted chain that records every call
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
    omit_contract_address: bool,
    failing_receipt: Option<usize>,
    reject_reverts: bool,
}

impl MockChain {
    pub const DEPLOYED_ADDRESS: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");

    pub fn new() -> Self {
        Self::default()
    }

    /// Deployment receipts come back without a contract address
    pub fn without_contract_address(mut self) -> Self {
        self.omit_contract_address = true;
        self
    }

    /// The `index`-th receipt (0-based) reports a failed status
    pub fn fail_receipt_at(mut self, index: usize) -> Self {
        self.failing_receipt = Some(index);
        self
    }

    /// `revert` answers like a node that does not know the snapshot
    pub fn reject_reverts(mut self) -> Self {
        self.reject_reverts = true;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.lock().calls.clone()
    }

    pub fn deploys(&self) -> Vec<DeployRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChainCall::Deploy(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChainCall::Write(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn next_hash(state: &mut MockState) -> B256 {
        state.tx_count += 1;
        B256::left_padding_from(&state.tx_count.to_be_bytes())
    }
}

#[async_trait]
impl TransactionSubmitter for MockChain {
    async fn deploy_contract(&self, request: DeployRequest) -> Result<B256> {
        let mut state = self.lock();
        let hash = Self::next_hash(&mut state);
        state.deploy_hashes.insert(hash);
        state.calls.push(ChainCall::Deploy(request));
        Ok(hash)
    }

    async fn write_contract(&self, request: WriteRequest) -> Result<B256> {
        let mut state = self.lock();
        let hash = Self::next_hash(&mut state);
        state.calls.push(ChainCall::Write(request));
        Ok(hash)
    }
}

#[async_trait]
impl ReceiptReader for MockChain {
    async fn wait_for_transaction_receipt(&self, tx_hash: B256) -> Result<ReceiptSummary> {
        let mut state = self.lock();
        state.calls.push(ChainCall::WaitReceipt(tx_hash));

        let index = state.receipt_count;
        state.receipt_count += 1;

        let contract_address = (state.deploy_hashes.contains(&tx_hash)
            && !self.omit_contract_address)
            .then_some(Self::DEPLOYED_ADDRESS);

        Ok(ReceiptSummary {
            transaction_hash: tx_hash,
            contract_address,
            success: self.failing_receipt != Some(index),
            block_number: Some(index as u64 + 1),
        })
    }
}

#[async_trait]
impl TestChainControl for MockChain {
    async fn snapshot(&self) -> Result<SnapshotId> {
        let mut state = self.lock();
        state.calls.push(ChainCall::Snapshot);
        let id = SnapshotId::new(format!("{:#x}", state.snapshot_count));
        state.snapshot_count += 1;
        Ok(id)
    }

    async fn revert(&self, id: &SnapshotId) -> Result<()> {
        self.lock().calls.push(ChainCall::Revert(id.clone()));
        if self.reject_reverts {
            return Err(SetupError::RevertRejected { id: id.clone() }.into());
        }
        Ok(())
    }
}

/// Cache that only counts invalidations
#[derive(Debug, Default)]
pub struct RecordingCache {
    invalidations: AtomicUsize,
}

impl RecordingCache {
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate_all(&self) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
