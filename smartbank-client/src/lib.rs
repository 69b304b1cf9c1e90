//! Smart Bank Client - session-gated account operations
//!
//! This crate drives every write the user can make against the ledger
//! service and keeps a local mirror of the user's accounts consistent with
//! it. It includes:
//!
//! - [`HttpGateway`]: authenticated requests to the ledger
//! - [`SessionStore`]: the persisted identity and its credential
//! - [`AccountCache`]: the account list, replaced wholesale after each write
//! - [`OperationController`]: the idle/pending/succeeded/failed lifecycle
//!   shared by account creation, transfers and deletion
//! - [`DeletionConfirmationFlow`]: explicit confirmation before a delete
//! - [`Dashboard`]: wires the above together behind the session gate
//!
//! ## Consistency
//!
//! Controllers never patch the local list. A successful write triggers a
//! full re-fetch, because a transfer changes accounts the cache may not
//! even contain. In-flight requests are not cancelled and overlapping
//! refreshes are not de-duplicated: the last refresh to finish wins.

pub mod cache;
pub mod dashboard;
pub mod deletion;
pub mod gateway;
pub mod operation;
pub mod session;
pub mod storage;

pub use cache::AccountCache;
pub use dashboard::{AccountSummary, Dashboard, DashboardAccess};
pub use deletion::{DeletionConfirmationFlow, DeletionState};
pub use gateway::{classify_rejection, EndpointScope, HttpGateway};
pub use operation::{
    CreateAccount, CreateAccountController, CreateAccountForm, DeleteAccount,
    DeleteAccountController, OperationController, OperationKind, OperationPhase, OperationState,
    TransferForm, TransferFunds, TransferFundsController, WriteOperation,
};
pub use session::{decode_subject, SessionStore, REGISTRATION_SUCCESS_MESSAGE, SESSION_RECORD_KEY};
pub use storage::{FileRecordStore, MemoryRecordStore};

pub use smartbank_core;
