//! Local mirror of the user's accounts
//!
//! The list is only ever replaced as a whole by the result of a fetch.
//! Readers take an `Arc` snapshot, so they see either the old list or the
//! new one. A failed fetch empties the list instead of leaving it stale.

use rust_decimal::Decimal;
use smartbank_core::{Account, AccountId, BankResult, LedgerGateway};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::SessionStore;

#[derive(Default)]
struct CacheState {
    accounts: Arc<Vec<Account>>,
    last_error: Option<String>,
    /// Bumped on every replacement, successful or not
    generation: u64,
}

#[derive(Clone)]
pub struct AccountCache {
    state: Arc<RwLock<CacheState>>,
    session: SessionStore,
    gateway: Arc<dyn LedgerGateway>,
}

impl AccountCache {
    pub fn new(session: SessionStore, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            session,
            gateway,
        }
    }

    /// Re-fetch the full list from the ledger and replace the mirror.
    pub async fn refresh(&self) -> BankResult<Arc<Vec<Account>>> {
        let fetched = match self.session.credential() {
            Ok(credential) => self.gateway.list_accounts(&credential).await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(accounts) => {
                let accounts = Arc::new(accounts);
                self.replace(Arc::clone(&accounts), None);
                debug!(count = accounts.len(), "Account list refreshed");
                Ok(accounts)
            }
            Err(e) => {
                warn!(error = %e, "Account refresh failed; clearing list");
                self.replace(Arc::new(Vec::new()), Some(e.user_message()));
                Err(e)
            }
        }
    }

    /// Start a refresh without waiting for it.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.refresh().await {
                e.log();
            }
        })
    }

    /// Current snapshot of the list
    pub fn accounts(&self) -> Arc<Vec<Account>> {
        Arc::clone(&self.read().accounts)
    }

    pub fn find(&self, account_id: AccountId) -> Option<Account> {
        self.read()
            .accounts
            .iter()
            .find(|account| account.id == account_id)
            .cloned()
    }

    pub fn total_balance(&self) -> Decimal {
        self.read().accounts.iter().map(|account| account.balance).sum()
    }

    pub fn account_count(&self) -> usize {
        self.read().accounts.len()
    }

    /// Message of the last failed refresh, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Drop the mirror, e.g. after logout.
    pub fn clear(&self) {
        self.replace(Arc::new(Vec::new()), None);
    }

    fn replace(&self, accounts: Arc<Vec<Account>>, last_error: Option<String>) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.accounts = accounts;
        state.last_error = last_error;
        state.generation += 1;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
