//! Mock ERC20 token
//!
//! ABI bindings, the fixed deploy and display metadata, and loading of the
//! compiled creation bytecode from a forge artifact.

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolConstructor};
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

sol! {
    /// Mintable mock ERC20 token ABI
    #[derive(Debug)]
    #[sol(rpc)]
    contract MockERC20 {
        constructor(string name, string symbol, uint8 decimals);

        function mint(address to, uint256 amount) external;
        function balanceOf(address account) public view returns (uint256);
        function name() public view returns (string);
        function symbol() public view returns (string);
        function decimals() public view returns (uint8);
    }
}

/// First Anvil dev account; deploys the token and receives the minted supply
pub const ALICE: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

/// On-chain constructor arguments
pub const DEPLOY_NAME: &str = "Marshall Rogan INU";
pub const DEPLOY_SYMBOL: &str = "MRI";
pub const DEPLOY_DECIMALS: u8 = 18;

/// Display metadata recorded in the environment
pub const DISPLAY_NAME: &str = "Mock ERC";
pub const DISPLAY_SYMBOL: &str = "MOCK";
pub const DISPLAY_DECIMALS: u8 = 18;
pub const LOGO_URI: &str =
    "https://assets.coingecko.com/coins/images/23784/small/mri.png?1647693409";

/// Whole tokens minted to ALICE on first setup
pub const INITIAL_MINT_TOKENS: u64 = 10;

/// Fungible token as presented to the front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub chain_id: u64,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl TokenDescriptor {
    pub fn new(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        chain_id: u64,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            chain_id,
            logo_uri: None,
        }
    }

    pub fn with_logo_uri(mut self, uri: impl Into<String>) -> Self {
        self.logo_uri = Some(uri.into());
        self
    }

    /// Descriptor for a freshly deployed mock token
    pub fn mock(address: Address, chain_id: u64) -> Self {
        Self::new(
            address,
            DISPLAY_NAME,
            DISPLAY_SYMBOL,
            DISPLAY_DECIMALS,
            chain_id,
        )
        .with_logo_uri(LOGO_URI)
    }
}

/// Scale a whole-token amount to raw units
pub fn to_token_units(whole: u64, decimals: u8) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}

/// ABI-encoded constructor arguments for the mock token deployment
pub fn constructor_args() -> Bytes {
    MockERC20::constructorCall {
        name: DEPLOY_NAME.to_string(),
        symbol: DEPLOY_SYMBOL.to_string(),
        decimals: DEPLOY_DECIMALS,
    }
    .abi_encode()
    .into()
}

/// Calldata for `mint(to, amount)`
pub fn mint_calldata(to: Address, amount: U256) -> Bytes {
    MockERC20::mintCall { to, amount }.abi_encode().into()
}

/// Compiled contract artifact as written by `forge build`
#[derive(Debug, Deserialize)]
pub struct ForgeArtifact {
    pub bytecode: ArtifactBytecode,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactBytecode {
    pub object: Bytes,
}

impl ForgeArtifact {
    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read artifact {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: ForgeArtifact =
            serde_json::from_str(content).wrap_err("Failed to parse forge artifact")?;
        if artifact.bytecode.object.is_empty() {
            return Err(eyre!("Artifact has no creation bytecode"));
        }
        Ok(artifact)
    }

    pub fn creation_code(&self) -> &Bytes {
        &self.bytecode.object
    }
}
