//! Two-step guard in front of account deletion
//!
//! ```text
//! Closed --request_delete--> Open(target)
//! Open   --cancel----------> Closed
//! Open   --confirm---------> Pending(target) --ok----> Closed
//!                                            --error-> Open(target, message)
//! ```
//!
//! The delete request can only be issued from `confirm`, and only while
//! `Open`.

use smartbank_core::{AccountId, BankError, BankResult, ErrorContext};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::operation::{DeleteAccountController, OperationState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionState {
    #[default]
    Closed,
    Open {
        target: AccountId,
        /// Failure of the last confirm attempt
        message: Option<String>,
    },
    Pending {
        target: AccountId,
    },
}

impl DeletionState {
    pub fn target(&self) -> Option<AccountId> {
        match self {
            DeletionState::Closed => None,
            DeletionState::Open { target, .. } | DeletionState::Pending { target } => {
                Some(*target)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DeletionState::Closed)
    }
}

#[derive(Clone)]
pub struct DeletionConfirmationFlow {
    state: Arc<Mutex<DeletionState>>,
    controller: DeleteAccountController,
}

impl DeletionConfirmationFlow {
    pub fn new(controller: DeleteAccountController) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeletionState::Closed)),
            controller,
        }
    }

    pub fn state(&self) -> DeletionState {
        self.lock_state().clone()
    }

    /// Outcome of the last delete attempt, kept after the flow closes
    pub fn operation_state(&self) -> OperationState {
        self.controller.state()
    }

    /// Failure message shown while the confirmation is open
    pub fn message(&self) -> Option<String> {
        match &*self.lock_state() {
            DeletionState::Open { message, .. } => message.clone(),
            _ => None,
        }
    }

    /// Ask to delete `account_id`. Clears the outcome of any previous
    /// attempt, both here and on the delete controller.
    pub fn request_delete(&self, account_id: AccountId) -> BankResult<()> {
        let mut state = self.lock_state();
        if let DeletionState::Pending { target } = *state {
            return Err(invalid_transition(format!(
                "Deletion of account {} is still in progress",
                target
            )));
        }

        self.controller.reset()?;

        *state = DeletionState::Open {
            target: account_id,
            message: None,
        };
        debug!(account_id, "Deletion requested; awaiting confirmation");
        Ok(())
    }

    /// Dismiss without deleting. Nothing is sent.
    pub fn cancel(&self) -> BankResult<()> {
        let mut state = self.lock_state();
        match *state {
            DeletionState::Pending { .. } => Err(invalid_transition(
                "Cannot cancel while the deletion is being processed".to_string(),
            )),
            DeletionState::Open { target, .. } => {
                *state = DeletionState::Closed;
                info!(account_id = target, "Deletion cancelled");
                Ok(())
            }
            DeletionState::Closed => Ok(()),
        }
    }

    /// Issue the delete for the captured target.
    ///
    /// Success closes the flow. Failure reopens it with the failure message
    /// so the user can retry or cancel.
    pub async fn confirm(&self) -> BankResult<()> {
        let target = {
            let mut state = self.lock_state();
            let DeletionState::Open { target, .. } = *state else {
                return Err(invalid_transition(
                    "There is no deletion awaiting confirmation".to_string(),
                ));
            };
            *state = DeletionState::Pending { target };
            target
        };

        let guard = ReopenGuard {
            state: &self.state,
            target,
            armed: true,
        };
        let result = self.controller.submit(Some(target)).await;
        guard.disarm();

        let mut state = self.lock_state();
        match &result {
            Ok(()) => *state = DeletionState::Closed,
            Err(e) => {
                *state = DeletionState::Open {
                    target,
                    message: Some(e.user_message()),
                }
            }
        }
        result
    }

    pub async fn wait_for_refresh(&self) {
        self.controller.wait_for_refresh().await
    }

    fn lock_state(&self) -> MutexGuard<'_, DeletionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Reopens the confirmation if `confirm` is dropped mid-request, so the
/// user can cancel or retry.
struct ReopenGuard<'a> {
    state: &'a Mutex<DeletionState>,
    target: AccountId,
    armed: bool,
}

impl ReopenGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReopenGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == (DeletionState::Pending { target: self.target }) {
            *state = DeletionState::Open {
                target: self.target,
                message: None,
            };
            debug!(account_id = self.target, "Abandoned deletion; confirmation reopened");
        }
    }
}

fn invalid_transition(message: String) -> BankError {
    BankError::InvalidTransition {
        message,
        context: ErrorContext::new("deletion_flow"),
    }
}
