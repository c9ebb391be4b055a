//! Chain clients used by the setup routine
//!
//! Three seams, one per external service:
//!
//! - [`TransactionSubmitter`] - sends deploy and contract-write transactions
//! - [`ReceiptReader`] - waits for receipts on the public chain-read side
//! - [`TestChainControl`] - `evm_snapshot` / `evm_revert` on the test node
//!
//! Live implementations talk to Anvil over HTTP. Transactions go through
//! `eth_sendTransaction` from an unlocked dev account, so no key material is
//! held here.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::environment::SnapshotId;
use crate::error::SetupError;
use crate::token::MockERC20;

/// Contract creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub from: Address,
    pub bytecode: Bytes,
    /// ABI-encoded constructor arguments, appended to the bytecode
    pub constructor_args: Bytes,
}

impl DeployRequest {
    pub fn deploy_code(&self) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + self.constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&self.constructor_args);
        code.into()
    }
}

/// State-changing contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub from: Address,
    pub to: Address,
    pub calldata: Bytes,
}

/// The receipt fields the setup routine reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub transaction_hash: B256,
    pub contract_address: Option<Address>,
    pub success: bool,
    pub block_number: Option<u64>,
}

impl From<&TransactionReceipt> for ReceiptSummary {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            success: receipt.status(),
            block_number: receipt.block_number,
        }
    }
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit a contract deployment, returning the transaction hash
    async fn deploy_contract(&self, request: DeployRequest) -> Result<B256>;

    /// Submit a contract call, returning the transaction hash
    async fn write_contract(&self, request: WriteRequest) -> Result<B256>;
}

#[async_trait]
pub trait ReceiptReader: Send + Sync {
    /// Suspend until the transaction is included
    async fn wait_for_transaction_receipt(&self, tx_hash: B256) -> Result<ReceiptSummary>;
}

#[async_trait]
pub trait TestChainControl: Send + Sync {
    async fn snapshot(&self) -> Result<SnapshotId>;

    async fn revert(&self, id: &SnapshotId) -> Result<()>;
}

fn parse_rpc_url(rpc_url: &str) -> Result<Url> {
    rpc_url
        .parse()
        .map_err(|e| eyre!("Invalid RPC URL: {}", e))
}

// ============================================================================
// Wallet client
// ============================================================================

/// Sends transactions from an unlocked node account
pub struct WalletClient {
    provider: RootProvider<Http<Client>>,
}

impl WalletClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(parse_rpc_url(rpc_url)?);
        info!(rpc_url = %rpc_url, "Created wallet client");
        Ok(Self { provider })
    }

    async fn send(&self, tx: TransactionRequest) -> Result<B256> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .wrap_err("Failed to send transaction")?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "Transaction submitted");
        Ok(tx_hash)
    }
}

#[async_trait]
impl TransactionSubmitter for WalletClient {
    async fn deploy_contract(&self, request: DeployRequest) -> Result<B256> {
        let tx = TransactionRequest::default()
            .from(request.from)
            .with_deploy_code(request.deploy_code());
        self.send(tx).await
    }

    async fn write_contract(&self, request: WriteRequest) -> Result<B256> {
        let tx = TransactionRequest::default()
            .from(request.from)
            .to(request.to)
            .input(request.calldata.into());
        self.send(tx).await
    }
}

// ============================================================================
// Public client
// ============================================================================

/// Read-only chain client
pub struct PublicClient {
    provider: RootProvider<Http<Client>>,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl PublicClient {
    pub fn new(rpc_url: &str, receipt_timeout: Duration, poll_interval: Duration) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(parse_rpc_url(rpc_url)?);
        info!(rpc_url = %rpc_url, "Created public client");
        Ok(Self {
            provider,
            receipt_timeout,
            poll_interval,
        })
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.provider.get_chain_id().await?;
        Ok(chain_id)
    }

    pub async fn block_number(&self) -> Result<u64> {
        let block = self.provider.get_block_number().await?;
        Ok(block)
    }

    /// ERC20 balance of `account`
    pub async fn token_balance(&self, token: Address, account: Address) -> Result<U256> {
        let contract = MockERC20::new(token, &self.provider);
        let balance = contract
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| eyre!("Failed to get balance: {}", e))?;
        Ok(balance._0)
    }

    /// On-chain `(name, symbol, decimals)`
    pub async fn token_metadata(&self, token: Address) -> Result<(String, String, u8)> {
        let contract = MockERC20::new(token, &self.provider);

        let (name, symbol, decimals) = tokio::try_join!(
            async {
                contract
                    .name()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| eyre!("Failed to get name: {}", e))
            },
            async {
                contract
                    .symbol()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| eyre!("Failed to get symbol: {}", e))
            },
            async {
                contract
                    .decimals()
                    .call()
                    .await
                    .map(|r| r._0)
                    .map_err(|e| eyre!("Failed to get decimals: {}", e))
            }
        )?;

        Ok((name, symbol, decimals))
    }
}

#[async_trait]
impl ReceiptReader for PublicClient {
    async fn wait_for_transaction_receipt(&self, tx_hash: B256) -> Result<ReceiptSummary> {
        let start = std::time::Instant::now();

        while start.elapsed() < self.receipt_timeout {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                let summary = ReceiptSummary::from(&receipt);
                debug!(
                    tx_hash = %tx_hash,
                    block = ?summary.block_number,
                    success = summary.success,
                    "Receipt received"
                );
                return Ok(summary);
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(SetupError::ReceiptTimeout {
            tx_hash,
            timeout: self.receipt_timeout,
        }
        .into())
    }
}

// ============================================================================
// Test chain client
// ============================================================================

/// Anvil test-RPC client (`evm_snapshot`, `evm_revert`)
pub struct AnvilTestClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl AnvilTestClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(eyre!("{} failed: {}", method, response.status()));
        }

        let mut body: serde_json::Value = response.json().await?;
        if body.get("error").is_some() {
            return Err(eyre!("{} error: {}", method, body["error"]));
        }

        Ok(body["result"].take())
    }
}

#[async_trait]
impl TestChainControl for AnvilTestClient {
    async fn snapshot(&self) -> Result<SnapshotId> {
        let result = self.call("evm_snapshot", serde_json::json!([])).await?;
        let id = result
            .as_str()
            .ok_or_else(|| eyre!("evm_snapshot returned a non-string id: {}", result))?;
        debug!(snapshot_id = %id, "Snapshot taken");
        Ok(SnapshotId::new(id))
    }

    async fn revert(&self, id: &SnapshotId) -> Result<()> {
        let result = self
            .call("evm_revert", serde_json::json!([id.as_str()]))
            .await?;
        if result.as_bool() != Some(true) {
            warn!(snapshot_id = %id, "evm_revert returned {}", result);
            return Err(SetupError::RevertRejected { id: id.clone() }.into());
        }
        debug!(snapshot_id = %id, "Reverted to snapshot");
        Ok(())
    }
}
