//! Common test utilities
//!
//! [`FakeLedger`] is an in-memory ledger implementing [`LedgerGateway`]. It
//! counts calls per endpoint, can be told to fail an endpoint, and can hold
//! an endpoint open until the test releases it, which is how overlapping
//! in-flight requests are produced.

#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde::Serialize;
use smartbank_client::{decode_subject, MemoryRecordStore, SessionStore};
use smartbank_core::{
    Account, AccountId, AccountStatus, BankError, BankResult, Credential, ErrorContext,
    LedgerGateway, NewAccountRequest, RegistrationRequest, TokenResponse, TransferRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const HEALTH: &str = "health";
pub const REGISTER: &str = "register";
pub const ISSUE_TOKEN: &str = "issue_token";
pub const LIST_ACCOUNTS: &str = "list_accounts";
pub const CREATE_ACCOUNT: &str = "create_account";
pub const TRANSFER: &str = "transfer";
pub const DELETE_ACCOUNT: &str = "delete_account";

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const FULL_NAME: &str = "Ada Lovelace";

/// Failure injected into an endpoint
#[derive(Debug, Clone)]
pub enum Injected {
    Conflict(&'static str),
    NotFound(&'static str),
    Network(&'static str),
}

impl Injected {
    fn to_error(&self) -> BankError {
        let context = ErrorContext::new("fake_ledger");
        match self {
            Injected::Conflict(message) => BankError::Conflict {
                message: message.to_string(),
                status: 400,
                context,
            },
            Injected::NotFound(message) => BankError::NotFound {
                message: message.to_string(),
                context,
            },
            Injected::Network(message) => BankError::Network {
                message: message.to_string(),
                source: None,
                context,
            },
        }
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: i64,
}

struct User {
    password: String,
    full_name: String,
}

#[derive(Default)]
struct LedgerState {
    users: HashMap<String, User>,
    /// (owner email, account)
    accounts: Vec<(String, Account)>,
    next_id: AccountId,
}

#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    calls: Mutex<HashMap<&'static str, Arc<AtomicUsize>>>,
    failures: Mutex<HashMap<&'static str, Injected>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self, endpoint: &'static str) -> usize {
        self.counter(endpoint).load(Ordering::SeqCst)
    }

    pub fn fail(&self, endpoint: &'static str, failure: Injected) {
        self.failures.lock().unwrap().insert(endpoint, failure);
    }

    pub fn heal(&self, endpoint: &'static str) {
        self.failures.lock().unwrap().remove(endpoint);
    }

    /// Hold `endpoint` until the returned handle is notified.
    pub fn gate(&self, endpoint: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(endpoint, Arc::clone(&notify));
        notify
    }

    /// Add an account directly, bypassing the API.
    pub fn seed_account(&self, owner: &str, number: &str, balance: i64) -> AccountId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.accounts.push((
            owner.to_string(),
            Account {
                id,
                account_number: number.to_string(),
                account_type: smartbank_core::AccountType::Savings,
                balance: Decimal::from(balance),
                status: AccountStatus::Active,
            },
        ));
        id
    }

    pub fn set_status(&self, account_id: AccountId, status: AccountStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, account)) = state.accounts.iter_mut().find(|(_, a)| a.id == account_id) {
            account.status = status;
        }
    }

    pub fn balance_of(&self, account_number: &str) -> Option<Decimal> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .iter()
            .find(|(_, a)| a.account_number == account_number)
            .map(|(_, a)| a.balance)
    }

    pub fn mint_token(email: &str) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: email,
                exp: 4_102_444_800,
            },
            &EncodingKey::from_secret(b"fake-ledger"),
        )
        .unwrap()
    }

    fn counter(&self, endpoint: &'static str) -> Arc<AtomicUsize> {
        Arc::clone(self.calls.lock().unwrap().entry(endpoint).or_default())
    }

    /// Count the call, wait at the gate if one is set, then apply any
    /// injected failure.
    async fn enter(&self, endpoint: &'static str) -> BankResult<()> {
        self.counter(endpoint).fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().remove(endpoint);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.failures.lock().unwrap().get(endpoint) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn owner(credential: &Credential) -> BankResult<String> {
        decode_subject(credential.expose()).map_err(|_| BankError::Authentication {
            message: "Could not validate credentials".to_string(),
            context: ErrorContext::new("fake_ledger"),
        })
    }

    fn conflict(message: &str) -> BankError {
        BankError::Conflict {
            message: message.to_string(),
            status: 400,
            context: ErrorContext::new("fake_ledger"),
        }
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn health(&self) -> BankResult<String> {
        self.enter(HEALTH).await?;
        Ok("API is running".to_string())
    }

    async fn register(&self, request: &RegistrationRequest) -> BankResult<()> {
        self.enter(REGISTER).await?;
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(&request.email) {
            return Err(BankError::Authentication {
                message: "Email already registered".to_string(),
                context: ErrorContext::new("fake_ledger"),
            });
        }
        state.users.insert(
            request.email.clone(),
            User {
                password: request.password.clone(),
                full_name: request.full_name.clone(),
            },
        );
        Ok(())
    }

    async fn issue_token(&self, email: &str, password: &str) -> BankResult<TokenResponse> {
        self.enter(ISSUE_TOKEN).await?;
        let state = self.state.lock().unwrap();
        match state.users.get(email) {
            Some(user) if user.password == password => Ok(TokenResponse {
                access_token: Self::mint_token(email),
                token_type: Some("bearer".to_string()),
                full_name: Some(user.full_name.clone()),
            }),
            _ => Err(BankError::Authentication {
                message: "Incorrect email or password".to_string(),
                context: ErrorContext::new("fake_ledger"),
            }),
        }
    }

    async fn list_accounts(&self, credential: &Credential) -> BankResult<Vec<Account>> {
        self.enter(LIST_ACCOUNTS).await?;
        let owner = Self::owner(credential)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .filter(|(o, _)| *o == owner)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn create_account(
        &self,
        credential: &Credential,
        request: &NewAccountRequest,
    ) -> BankResult<Account> {
        self.enter(CREATE_ACCOUNT).await?;
        let owner = Self::owner(credential)?;
        if request.initial_deposit < Decimal::from(500) {
            return Err(Self::conflict("Initial deposit must be at least 500."));
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let account = Account {
            id: state.next_id,
            account_number: format!("{:012}", 100_000_000_000i64 + state.next_id),
            account_type: request.account_type,
            balance: request.initial_deposit,
            status: AccountStatus::Active,
        };
        state.accounts.push((owner, account.clone()));
        Ok(account)
    }

    async fn transfer(
        &self,
        credential: &Credential,
        request: &TransferRequest,
    ) -> BankResult<Account> {
        self.enter(TRANSFER).await?;
        let owner = Self::owner(credential)?;
        let mut state = self.state.lock().unwrap();

        let source = state
            .accounts
            .iter()
            .position(|(o, a)| *o == owner && a.id == request.source_account_id)
            .ok_or_else(|| BankError::NotFound {
                message: "Source account not found or does not belong to user".to_string(),
                context: ErrorContext::new("fake_ledger"),
            })?;
        let destination = state
            .accounts
            .iter()
            .position(|(_, a)| a.account_number == request.destination_account_number)
            .ok_or_else(|| Self::conflict("Destination account not found."))?;

        if state.accounts[source].1.balance < request.amount {
            return Err(Self::conflict("Insufficient funds."));
        }
        if source == destination {
            return Err(Self::conflict("Cannot transfer to the same account."));
        }

        state.accounts[source].1.balance -= request.amount;
        state.accounts[destination].1.balance += request.amount;
        Ok(state.accounts[source].1.clone())
    }

    async fn delete_account(
        &self,
        credential: &Credential,
        account_id: AccountId,
    ) -> BankResult<()> {
        self.enter(DELETE_ACCOUNT).await?;
        let owner = Self::owner(credential)?;
        let mut state = self.state.lock().unwrap();

        let index = state
            .accounts
            .iter()
            .position(|(o, a)| *o == owner && a.id == account_id)
            .ok_or_else(|| BankError::NotFound {
                message: "Account not found or does not belong to user".to_string(),
                context: ErrorContext::new("fake_ledger"),
            })?;

        let account = &state.accounts[index].1;
        if account.status == AccountStatus::Locked {
            return Err(Self::conflict("account is locked"));
        }
        if account.balance != Decimal::ZERO {
            return Err(Self::conflict("Account balance must be zero to delete"));
        }

        state.accounts.remove(index);
        Ok(())
    }
}

/// Session store over an in-memory record store and the given ledger
pub fn session_store(ledger: &Arc<FakeLedger>) -> SessionStore {
    SessionStore::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::clone(ledger) as Arc<dyn LedgerGateway>,
    )
}

/// Register the default user and log in.
pub async fn signed_in(ledger: &Arc<FakeLedger>) -> SessionStore {
    let sessions = session_store(ledger);
    sessions.register(EMAIL, PASSWORD, FULL_NAME).await.unwrap();
    sessions.login(EMAIL, PASSWORD).await.unwrap();
    sessions
}
