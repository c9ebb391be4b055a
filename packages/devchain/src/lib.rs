//! devchain: mock token setup and snapshot reset for a local test chain
//!
//! The first run deploys a mock ERC20, mints 10 tokens to the first Anvil dev
//! account and snapshots the chain. Every later run reverts to that snapshot,
//! takes a fresh one and invalidates cached queries.
//!
//! - **environment** - caller-owned state (snapshot id, token descriptor)
//! - **token** - mock ERC20 bindings, fixed metadata, forge artifact loading
//! - **client** - wallet, public and test-chain client seams with live Anvil clients
//! - **cache** - bounded TTL query cache and the invalidation seam
//! - **setup** - the setup/reset routine
//! - **mutation** - UI-style mutation state around the routine
//!
//! ## Feature Flags
//!
//! - `testing` - export the in-memory client doubles

pub mod cache;
pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod mutation;
pub mod setup;
pub mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheConfig, CacheInvalidator, QueryCache};
pub use client::{
    AnvilTestClient, DeployRequest, PublicClient, ReceiptReader, ReceiptSummary,
    TestChainControl, TransactionSubmitter, WalletClient, WriteRequest,
};
pub use config::DevChainConfig;
pub use environment::{EnvironmentContext, EnvironmentState, SharedEnvironment, SnapshotId};
pub use error::SetupError;
pub use mutation::{MutationStatus, SetupMutation};
pub use setup::{SetupAction, SetupOutcome};
pub use token::{ForgeArtifact, TokenDescriptor, ALICE};
