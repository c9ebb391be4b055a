//! Environment state shared between the setup routine and its caller
//!
//! The caller owns the state; the setup routine only reads the chain id and
//! snapshot id and writes back through the setters on [`EnvironmentContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::token::TokenDescriptor;

/// Opaque snapshot handle returned by the test chain (e.g. `"0x1"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Caller-owned environment state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub snapshot_id: Option<SnapshotId>,
    pub token: Option<TokenDescriptor>,
}

/// Read access and setters the setup routine is allowed to use
#[async_trait]
pub trait EnvironmentContext: Send + Sync {
    /// Chain the caller is connected to
    fn chain_id(&self) -> u64;

    async fn snapshot_id(&self) -> Option<SnapshotId>;

    async fn set_snapshot_id(&self, id: SnapshotId);

    async fn set_token(&self, token: TokenDescriptor);
}

/// In-process environment backed by a shared lock
#[derive(Debug, Clone)]
pub struct SharedEnvironment {
    chain_id: u64,
    state: Arc<RwLock<EnvironmentState>>,
}

impl SharedEnvironment {
    pub fn new(chain_id: u64) -> Self {
        Self::with_state(chain_id, EnvironmentState::default())
    }

    pub fn with_state(chain_id: u64, state: EnvironmentState) -> Self {
        Self {
            chain_id,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the current state
    pub async fn state(&self) -> EnvironmentState {
        self.state.read().await.clone()
    }

    pub async fn token(&self) -> Option<TokenDescriptor> {
        self.state.read().await.token.clone()
    }
}

#[async_trait]
impl EnvironmentContext for SharedEnvironment {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn snapshot_id(&self) -> Option<SnapshotId> {
        self.state.read().await.snapshot_id.clone()
    }

    async fn set_snapshot_id(&self, id: SnapshotId) {
        self.state.write().await.snapshot_id = Some(id);
    }

    async fn set_token(&self, token: TokenDescriptor) {
        self.state.write().await.token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[tokio::test]
    async fn test_clones_share_state() {
        let env = SharedEnvironment::new(31337);
        let other = env.clone();

        other.set_snapshot_id(SnapshotId::new("0x2")).await;
        assert_eq!(env.snapshot_id().await, Some(SnapshotId::new("0x2")));
    }

    #[tokio::test]
    async fn test_set_token_replaces_previous() {
        let env = SharedEnvironment::new(31337);
        env.set_token(TokenDescriptor::mock(Address::repeat_byte(1), 31337))
            .await;
        env.set_token(TokenDescriptor::mock(Address::repeat_byte(2), 31337))
            .await;

        let token = env.token().await.expect("token set");
        assert_eq!(token.address, Address::repeat_byte(2));
        assert!(env.state().await.snapshot_id.is_none());
    }

    #[test]
    fn test_snapshot_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SnapshotId::new("0x1f")).unwrap();
        assert_eq!(json, "\"0x1f\"");
        assert_eq!(SnapshotId::from("0x1f").to_string(), "0x1f");
    }
}
