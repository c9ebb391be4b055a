//! Mutation wrapper around [`SetupAction`]
//!
//! Mirrors the state a UI mutation hook exposes and refuses to start a second
//! run while one is in flight. `SetupAction` itself does not guard against
//! overlapping invocations.

use eyre::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::SetupError;
use crate::setup::{SetupAction, SetupOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success(SetupOutcome),
    Error(String),
}

pub struct SetupMutation {
    action: Arc<SetupAction>,
    in_flight: Mutex<()>,
    status: RwLock<MutationStatus>,
}

impl SetupMutation {
    pub fn new(action: Arc<SetupAction>) -> Self {
        Self {
            action,
            in_flight: Mutex::new(()),
            status: RwLock::new(MutationStatus::Idle),
        }
    }

    /// Run the setup action unless a run is already pending
    pub async fn mutate(&self) -> Result<SetupOutcome> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SetupError::AlreadyRunning)?;

        *self.status.write().await = MutationStatus::Pending;

        let result = self.action.execute().await;

        *self.status.write().await = match &result {
            Ok(outcome) => MutationStatus::Success(outcome.clone()),
            Err(e) => {
                warn!(error = %e, "Setup failed");
                MutationStatus::Error(format!("{:#}", e))
            }
        };

        result
    }

    pub async fn status(&self) -> MutationStatus {
        self.status.read().await.clone()
    }

    pub async fn is_pending(&self) -> bool {
        matches!(*self.status.read().await, MutationStatus::Pending)
    }

    /// Back to `Idle`; a pending run is left alone
    pub async fn reset(&self) {
        let mut status = self.status.write().await;
        if *status != MutationStatus::Pending {
            *status = MutationStatus::Idle;
        }
    }
}
