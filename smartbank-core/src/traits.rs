//! Core trait definitions

use crate::error::BankResult;
use crate::types::*;
use async_trait::async_trait;

/// Remote ledger service.
///
/// Implementations only move requests and classify failures; they hold no
/// session state. Account-scoped calls take the credential explicitly so a
/// request cannot be issued without one.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// `GET /`
    async fn health(&self) -> BankResult<String>;

    /// `POST /auth/register`
    async fn register(&self, request: &RegistrationRequest) -> BankResult<()>;

    /// `POST /auth/token` (form encoded)
    async fn issue_token(&self, email: &str, password: &str) -> BankResult<TokenResponse>;

    /// `GET /accounts/`
    async fn list_accounts(&self, credential: &Credential) -> BankResult<Vec<Account>>;

    /// `POST /accounts/`
    async fn create_account(
        &self,
        credential: &Credential,
        request: &NewAccountRequest,
    ) -> BankResult<Account>;

    /// `POST /accounts/{id}/transfer`
    async fn transfer(
        &self,
        credential: &Credential,
        request: &TransferRequest,
    ) -> BankResult<Account>;

    /// `DELETE /accounts/{id}`
    async fn delete_account(&self, credential: &Credential, account_id: AccountId)
        -> BankResult<()>;
}

/// Key/value store for small persisted records.
///
/// Values are opaque text. Removing an absent key succeeds.
pub trait RecordStore: Send + Sync {
    fn load(&self, key: &str) -> BankResult<Option<String>>;

    fn save(&self, key: &str, value: &str) -> BankResult<()>;

    fn remove(&self, key: &str) -> BankResult<()>;
}
