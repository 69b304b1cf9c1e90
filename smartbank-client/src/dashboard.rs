//! Session-gated composition of the account components
//!
//! Entering the dashboard without a session is not an error: the caller is
//! told to redirect to login. With a session, the cache is loaded once and
//! the three controllers are wired to the same cache and session store.

use rust_decimal::Decimal;
use smartbank_core::{format_currency, Account, LedgerGateway, Session};
use std::sync::Arc;
use tracing::info;

use crate::cache::AccountCache;
use crate::deletion::DeletionConfirmationFlow;
use crate::operation::{CreateAccountController, DeleteAccountController, TransferFundsController};
use crate::session::SessionStore;

pub enum DashboardAccess {
    Granted(Dashboard),
    RedirectToLogin,
}

/// Aggregates over the current account list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub total_balance: Decimal,
    pub account_count: usize,
}

impl AccountSummary {
    pub fn formatted_total(&self) -> String {
        format_currency(self.total_balance)
    }
}

pub struct Dashboard {
    session: Session,
    cache: AccountCache,
    create: CreateAccountController,
    transfer: TransferFundsController,
    deletion: DeletionConfirmationFlow,
}

impl Dashboard {
    /// Open the dashboard for the current session and load the accounts.
    pub async fn enter(sessions: &SessionStore) -> DashboardAccess {
        let Some(session) = sessions.current_session() else {
            info!("No session; redirecting to login");
            return DashboardAccess::RedirectToLogin;
        };

        let dashboard = Self::assemble(session, sessions.clone(), sessions.gateway());

        // A failure is recorded on the cache and shown as the dashboard message.
        let _ = dashboard.cache.refresh().await;

        DashboardAccess::Granted(dashboard)
    }

    fn assemble(session: Session, sessions: SessionStore, gateway: Arc<dyn LedgerGateway>) -> Self {
        let cache = AccountCache::new(sessions.clone(), Arc::clone(&gateway));

        let create =
            CreateAccountController::new(sessions.clone(), cache.clone(), Arc::clone(&gateway));
        let transfer =
            TransferFundsController::new(sessions.clone(), cache.clone(), Arc::clone(&gateway));
        let deletion = DeletionConfirmationFlow::new(DeleteAccountController::new(
            sessions,
            cache.clone(),
            gateway,
        ));

        Self {
            session,
            cache,
            create,
            transfer,
            deletion,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn greeting(&self) -> String {
        format!("Welcome, {}!", self.session.display_name)
    }

    pub fn accounts(&self) -> Arc<Vec<Account>> {
        self.cache.accounts()
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            total_balance: self.cache.total_balance(),
            account_count: self.cache.account_count(),
        }
    }

    /// Failure text of the last account refresh
    pub fn message(&self) -> Option<String> {
        self.cache.last_error()
    }

    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    pub fn create_account(&self) -> &CreateAccountController {
        &self.create
    }

    pub fn transfer_funds(&self) -> &TransferFundsController {
        &self.transfer
    }

    pub fn deletion(&self) -> &DeletionConfirmationFlow {
        &self.deletion
    }
}
