//! Mock token setup and snapshot reset
//!
//! First run (no snapshot recorded): deploy the mock ERC20, record its
//! descriptor, mint the initial supply to ALICE and snapshot the chain.
//!
//! Later runs: revert to the recorded snapshot, take a fresh one (a reverted
//! snapshot cannot be assumed reusable) and invalidate cached queries.

use alloy::primitives::{Address, Bytes, B256};
use eyre::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::CacheInvalidator;
use crate::client::{
    DeployRequest, ReceiptReader, ReceiptSummary, TestChainControl, TransactionSubmitter,
    WriteRequest,
};
use crate::environment::{EnvironmentContext, SnapshotId};
use crate::error::SetupError;
use crate::token::{
    constructor_args, mint_calldata, to_token_units, TokenDescriptor, ALICE, DEPLOY_DECIMALS,
    INITIAL_MINT_TOKENS,
};

/// Which branch a run took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Deployed {
        token: TokenDescriptor,
        snapshot_id: SnapshotId,
    },
    Reset {
        reverted_to: SnapshotId,
        snapshot_id: SnapshotId,
    },
}

impl SetupOutcome {
    pub fn snapshot_id(&self) -> &SnapshotId {
        match self {
            Self::Deployed { snapshot_id, .. } => snapshot_id,
            Self::Reset { snapshot_id, .. } => snapshot_id,
        }
    }
}

/// Setup/reset routine over the three chain clients and the caller's state
pub struct SetupAction {
    wallet: Arc<dyn TransactionSubmitter>,
    public: Arc<dyn ReceiptReader>,
    test: Arc<dyn TestChainControl>,
    environment: Arc<dyn EnvironmentContext>,
    cache: Arc<dyn CacheInvalidator>,
    token_bytecode: Bytes,
}

impl SetupAction {
    pub fn new(
        wallet: Arc<dyn TransactionSubmitter>,
        public: Arc<dyn ReceiptReader>,
        test: Arc<dyn TestChainControl>,
        environment: Arc<dyn EnvironmentContext>,
        cache: Arc<dyn CacheInvalidator>,
        token_bytecode: Bytes,
    ) -> Self {
        Self {
            wallet,
            public,
            test,
            environment,
            cache,
            token_bytecode,
        }
    }

    /// Run once; every remote failure propagates unchanged
    pub async fn execute(&self) -> Result<SetupOutcome> {
        match self.environment.snapshot_id().await {
            None => self.deploy().await,
            Some(id) => self.reset(id).await,
        }
    }

    async fn deploy(&self) -> Result<SetupOutcome> {
        info!("No snapshot recorded, deploying mock token");

        let deploy_hash = self
            .wallet
            .deploy_contract(DeployRequest {
                from: ALICE,
                bytecode: self.token_bytecode.clone(),
                constructor_args: constructor_args(),
            })
            .await?;
        debug!(tx_hash = %deploy_hash, "Deploy submitted");

        let receipt = self.confirm(deploy_hash).await?;
        let token_address = receipt
            .contract_address
            .ok_or(SetupError::MissingContractAddress {
                tx_hash: deploy_hash,
            })?;
        info!(address = %token_address, "Mock token deployed");

        let token = TokenDescriptor::mock(token_address, self.environment.chain_id());
        self.environment.set_token(token.clone()).await;

        self.mint(token_address).await?;

        let snapshot_id = self.test.snapshot().await?;
        self.environment.set_snapshot_id(snapshot_id.clone()).await;
        info!(snapshot_id = %snapshot_id, "Setup snapshot taken");

        Ok(SetupOutcome::Deployed { token, snapshot_id })
    }

    async fn mint(&self, token: Address) -> Result<()> {
        let amount = to_token_units(INITIAL_MINT_TOKENS, DEPLOY_DECIMALS);
        let mint_hash = self
            .wallet
            .write_contract(WriteRequest {
                from: ALICE,
                to: token,
                calldata: mint_calldata(ALICE, amount),
            })
            .await?;
        self.confirm(mint_hash).await?;
        info!(to = %ALICE, amount = %amount, "Minted initial supply");
        Ok(())
    }

    async fn reset(&self, id: SnapshotId) -> Result<SetupOutcome> {
        info!(snapshot_id = %id, "Reverting to snapshot");
        self.test.revert(&id).await?;

        let snapshot_id = self.test.snapshot().await?;
        self.environment.set_snapshot_id(snapshot_id.clone()).await;
        debug!(snapshot_id = %snapshot_id, "Fresh snapshot taken");

        self.cache.invalidate_all().await?;
        info!("Chain reset complete");

        Ok(SetupOutcome::Reset {
            reverted_to: id,
            snapshot_id,
        })
    }

    async fn confirm(&self, tx_hash: B256) -> Result<ReceiptSummary> {
        let receipt = self.public.wait_for_transaction_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(SetupError::TransactionReverted { tx_hash }.into());
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvironmentState, SharedEnvironment};
    use crate::testing::{ChainCall, MockChain, RecordingCache};
    use crate::token::MockERC20;
    use alloy::primitives::U256;
    use alloy::sol_types::{sol_data, SolCall, SolType};

    const CHAIN_ID: u64 = 31337;

    type ConstructorParams = (sol_data::String, sol_data::String, sol_data::Uint<8>);

    struct Harness {
        chain: Arc<MockChain>,
        cache: Arc<RecordingCache>,
        env: SharedEnvironment,
        action: SetupAction,
    }

    fn harness(chain: MockChain, state: EnvironmentState) -> Harness {
        let chain = Arc::new(chain);
        let cache = Arc::new(RecordingCache::default());
        let env = SharedEnvironment::with_state(CHAIN_ID, state);
        let action = SetupAction::new(
            chain.clone(),
            chain.clone(),
            chain.clone(),
            Arc::new(env.clone()),
            cache.clone(),
            Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
        );
        Harness {
            chain,
            cache,
            env,
            action,
        }
    }

    fn with_snapshot(id: &str) -> EnvironmentState {
        EnvironmentState {
            snapshot_id: Some(SnapshotId::new(id)),
            token: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_environment_deploys_and_mints() {
        let h = harness(MockChain::new(), EnvironmentState::default());

        let outcome = h.action.execute().await.unwrap();

        let deploys = h.chain.deploys();
        assert_eq!(deploys.len(), 1);
        assert_eq!(deploys[0].from, ALICE);
        let (name, symbol, decimals) =
            ConstructorParams::abi_decode_params(&deploys[0].constructor_args, true).unwrap();
        assert_eq!(
            (name.as_str(), symbol.as_str(), decimals),
            ("Marshall Rogan INU", "MRI", 18)
        );

        let writes = h.chain.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].to, MockChain::DEPLOYED_ADDRESS);
        let mint = MockERC20::mintCall::abi_decode(&writes[0].calldata, true).unwrap();
        assert_eq!(mint.to, ALICE);
        assert_eq!(
            mint.amount,
            U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64))
        );

        let state = h.env.state().await;
        let token = state.token.expect("token set");
        assert_eq!(token.decimals, 18);
        assert_eq!(token.address, MockChain::DEPLOYED_ADDRESS);
        assert_eq!(token.chain_id, CHAIN_ID);
        assert!(state.snapshot_id.is_some());
        assert_eq!(state.snapshot_id.as_ref(), Some(outcome.snapshot_id()));

        assert_eq!(h.cache.invalidations(), 0);
    }

    #[tokio::test]
    async fn test_deploy_steps_run_in_order() {
        let h = harness(MockChain::new(), EnvironmentState::default());
        h.action.execute().await.unwrap();

        let calls = h.chain.calls();
        assert!(matches!(
            calls.as_slice(),
            [
                ChainCall::Deploy(_),
                ChainCall::WaitReceipt(_),
                ChainCall::Write(_),
                ChainCall::WaitReceipt(_),
                ChainCall::Snapshot,
            ]
        ));
    }

    #[tokio::test]
    async fn test_existing_snapshot_reverts_and_resnapshots() {
        let h = harness(MockChain::new(), with_snapshot("0x1"));

        let outcome = h.action.execute().await.unwrap();

        let calls = h.chain.calls();
        assert_eq!(
            calls,
            vec![ChainCall::Revert(SnapshotId::new("0x1")), ChainCall::Snapshot]
        );
        assert!(h.chain.deploys().is_empty());
        assert!(h.chain.writes().is_empty());

        let stored = h.env.snapshot_id().await.expect("snapshot set");
        assert_ne!(stored, SnapshotId::new("0x1"));
        assert_eq!(
            outcome,
            SetupOutcome::Reset {
                reverted_to: SnapshotId::new("0x1"),
                snapshot_id: stored,
            }
        );
        assert_eq!(h.cache.invalidations(), 1);
        assert!(h.env.token().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_contract_address_fails_before_mint() {
        let h = harness(
            MockChain::new().without_contract_address(),
            EnvironmentState::default(),
        );

        let err = h.action.execute().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::MissingContractAddress { .. })
        ));
        assert!(h.chain.writes().is_empty());
        assert!(!h.chain.calls().contains(&ChainCall::Snapshot));
        assert_eq!(h.env.state().await, EnvironmentState::default());
    }

    #[tokio::test]
    async fn test_reverted_mint_propagates() {
        let h = harness(
            MockChain::new().fail_receipt_at(1),
            EnvironmentState::default(),
        );

        let err = h.action.execute().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::TransactionReverted { .. })
        ));
        // token was recorded before the mint, snapshot never taken
        assert!(h.env.token().await.is_some());
        assert!(h.env.snapshot_id().await.is_none());
    }

    #[tokio::test]
    async fn test_revert_failure_skips_invalidation() {
        let h = harness(MockChain::new().reject_reverts(), with_snapshot("0x1"));

        let err = h.action.execute().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::RevertRejected { .. })
        ));
        assert_eq!(h.env.snapshot_id().await, Some(SnapshotId::new("0x1")));
        assert_eq!(h.cache.invalidations(), 0);
    }

    #[tokio::test]
    async fn test_second_run_uses_snapshot_from_first() {
        let h = harness(MockChain::new(), EnvironmentState::default());

        let first = h.action.execute().await.unwrap();
        let second = h.action.execute().await.unwrap();

        match second {
            SetupOutcome::Reset { reverted_to, .. } => {
                assert_eq!(&reverted_to, first.snapshot_id())
            }
            other => panic!("expected reset, got {:?}", other),
        }
        assert_eq!(h.chain.deploys().len(), 1);
        assert_eq!(h.cache.invalidations(), 1);
    }
}
