//! Write-operation lifecycle shared by create, transfer and delete
//!
//! `Idle -> Pending -> {Succeeded, Failed}`; the next attempt passes through
//! `Idle` again and clears the previous message. While `Pending`, a second
//! submit on the same controller is rejected with [`BankError::Busy`] and
//! leaves the state untouched. Controllers for different operations share
//! nothing but the read-only session, so they never wait on each other.
//!
//! On success the controller starts an [`AccountCache`] refresh and does not
//! wait for it. On failure the cache is left alone.

use async_trait::async_trait;
use smartbank_core::{
    log_operation_error, log_operation_start, log_operation_success, BankError, BankResult,
    Credential, ErrorContext, LedgerGateway,
};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::cache::AccountCache;
use crate::session::SessionStore;

pub mod create;
pub mod delete;
pub mod transfer;

pub use create::{CreateAccount, CreateAccountController, CreateAccountForm};
pub use delete::{DeleteAccount, DeleteAccountController};
pub use transfer::{TransferForm, TransferFunds, TransferFundsController};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationPhase {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Phase and user-facing message of one controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationState {
    pub phase: OperationPhase,
    pub message: String,
}

impl OperationState {
    pub fn is_pending(&self) -> bool {
        self.phase == OperationPhase::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateAccount,
    TransferFunds,
    DeleteAccount,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateAccount => "create_account",
            OperationKind::TransferFunds => "transfer_funds",
            OperationKind::DeleteAccount => "delete_account",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::CreateAccount => "Account creation",
            OperationKind::TransferFunds => "Transfer",
            OperationKind::DeleteAccount => "Account deletion",
        };
        f.write_str(label)
    }
}

/// One kind of write against the ledger.
///
/// `prepare` checks local preconditions and builds the request; it runs
/// before anything is sent. `dispatch` performs the call.
#[async_trait]
pub trait WriteOperation: Send + Sync + 'static {
    type Input: Send;
    type Request: Send + Sync;

    const KIND: OperationKind;
    const SUCCESS_MESSAGE: &'static str;

    fn prepare(input: Self::Input) -> BankResult<Self::Request>;

    async fn dispatch(
        gateway: &dyn LedgerGateway,
        credential: &Credential,
        request: &Self::Request,
    ) -> BankResult<()>;
}

/// Drives one [`WriteOperation`] through its lifecycle.
pub struct OperationController<O: WriteOperation> {
    state: Arc<Mutex<OperationState>>,
    refresh: Arc<Mutex<Option<JoinHandle<()>>>>,
    session: SessionStore,
    cache: AccountCache,
    gateway: Arc<dyn LedgerGateway>,
    _operation: PhantomData<fn() -> O>,
}

impl<O: WriteOperation> Clone for OperationController<O> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            refresh: Arc::clone(&self.refresh),
            session: self.session.clone(),
            cache: self.cache.clone(),
            gateway: Arc::clone(&self.gateway),
            _operation: PhantomData,
        }
    }
}

impl<O: WriteOperation> OperationController<O> {
    pub fn new(session: SessionStore, cache: AccountCache, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            state: Arc::new(Mutex::new(OperationState::default())),
            refresh: Arc::new(Mutex::new(None)),
            session,
            cache,
            gateway,
            _operation: PhantomData,
        }
    }

    pub fn kind(&self) -> OperationKind {
        O::KIND
    }

    pub fn state(&self) -> OperationState {
        self.lock_state().clone()
    }

    pub fn phase(&self) -> OperationPhase {
        self.lock_state().phase
    }

    pub fn message(&self) -> String {
        self.lock_state().message.clone()
    }

    /// Run the operation once.
    ///
    /// The returned error is also recorded as this controller's message,
    /// except for `Busy`, which leaves the in-flight attempt's state alone.
    pub async fn submit(&self, input: O::Input) -> BankResult<()> {
        let (request, credential) = self.begin(input)?;
        let guard = PendingGuard::new(&self.state, O::KIND);

        log_operation_start!(O::KIND.as_str());

        let result = O::dispatch(self.gateway.as_ref(), &credential, &request).await;
        guard.disarm();

        match result {
            Ok(()) => {
                self.settle(OperationPhase::Succeeded, O::SUCCESS_MESSAGE.to_string());
                log_operation_success!(O::KIND.as_str());

                let handle = self.cache.spawn_refresh();
                *self.lock_refresh() = Some(handle);
                Ok(())
            }
            Err(e) => {
                log_operation_error!(O::KIND.as_str(), e);
                self.settle(OperationPhase::Failed, e.user_message());
                Err(e)
            }
        }
    }

    /// Back to `Idle` with no message. Refused while a request is in flight.
    pub(crate) fn reset(&self) -> BankResult<()> {
        let mut state = self.lock_state();
        if state.is_pending() {
            return Err(busy::<O>());
        }
        *state = OperationState::default();
        Ok(())
    }

    /// Wait for the refresh started by the last success, if any.
    pub async fn wait_for_refresh(&self) {
        let handle = self.lock_refresh().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Account refresh task did not complete");
            }
        }
    }

    /// Check-and-set under one lock: reject if pending, otherwise reset to
    /// `Idle`, validate, and enter `Pending`.
    fn begin(&self, input: O::Input) -> BankResult<(O::Request, Credential)> {
        let mut state = self.lock_state();

        if state.is_pending() {
            return Err(busy::<O>());
        }

        *state = OperationState::default();

        let prepared = O::prepare(input).and_then(|request| {
            let credential = self.session.credential()?;
            Ok((request, credential))
        });

        match prepared {
            Ok(ready) => {
                state.phase = OperationPhase::Pending;
                Ok(ready)
            }
            Err(e) => {
                e.log();
                state.phase = OperationPhase::Failed;
                state.message = e.user_message();
                Err(e)
            }
        }
    }

    fn settle(&self, phase: OperationPhase, message: String) {
        let mut state = self.lock_state();
        state.phase = phase;
        state.message = message;
    }

    fn lock_state(&self) -> MutexGuard<'_, OperationState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_refresh(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn busy<O: WriteOperation>() -> BankError {
    BankError::Busy {
        operation: O::KIND.to_string(),
        context: ErrorContext::new("operation_controller")
            .with_operation(O::KIND.as_str())
            .with_suggestion("Wait for the current request to finish"),
    }
}

/// Held across the ledger call. If the submit future is dropped before the
/// call returns, the controller goes back to `Idle` instead of staying
/// `Pending`.
struct PendingGuard<'a> {
    state: &'a Mutex<OperationState>,
    kind: OperationKind,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(state: &'a Mutex<OperationState>, kind: OperationKind) -> Self {
        Self {
            state,
            kind,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.is_pending() {
            *state = OperationState::default();
            tracing::debug!(operation = self.kind.as_str(), "Abandoned request; controller idle");
        }
    }
}
