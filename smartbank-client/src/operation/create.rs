//! Open a new account

use async_trait::async_trait;
use rust_decimal::Decimal;
use smartbank_core::{
    validation_error, AccountType, BankResult, Credential, LedgerGateway, NewAccountRequest,
    MINIMUM_OPENING_DEPOSIT,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{OperationController, OperationKind, OperationState, WriteOperation};
use crate::cache::AccountCache;
use crate::session::SessionStore;

pub struct CreateAccount;

/// Raw form input. `account_type` is free text until validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountForm {
    pub account_type: String,
    pub initial_deposit: Decimal,
}

impl Default for CreateAccountForm {
    fn default() -> Self {
        Self {
            account_type: AccountType::Savings.as_str().to_string(),
            initial_deposit: MINIMUM_OPENING_DEPOSIT,
        }
    }
}

#[async_trait]
impl WriteOperation for CreateAccount {
    type Input = CreateAccountForm;
    type Request = NewAccountRequest;

    const KIND: OperationKind = OperationKind::CreateAccount;
    const SUCCESS_MESSAGE: &'static str = "Account created successfully!";

    fn prepare(form: CreateAccountForm) -> BankResult<NewAccountRequest> {
        let account_type: AccountType = form
            .account_type
            .parse()
            .map_err(|message: String| validation_error!(message, "account_type", "create_account"))?;

        if form.initial_deposit < MINIMUM_OPENING_DEPOSIT {
            return Err(validation_error!(
                "Initial deposit must be at least 500.",
                "initial_deposit",
                "create_account"
            ));
        }

        Ok(NewAccountRequest {
            account_type,
            initial_deposit: form.initial_deposit,
        })
    }

    async fn dispatch(
        gateway: &dyn LedgerGateway,
        credential: &Credential,
        request: &NewAccountRequest,
    ) -> BankResult<()> {
        let account = gateway.create_account(credential, request).await?;
        debug!(account_number = %account.account_number, "Ledger opened account");
        Ok(())
    }
}

/// Create-account form plus its controller
#[derive(Clone)]
pub struct CreateAccountController {
    operation: OperationController<CreateAccount>,
    form: Arc<Mutex<CreateAccountForm>>,
}

impl CreateAccountController {
    pub fn new(session: SessionStore, cache: AccountCache, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            operation: OperationController::new(session, cache, gateway),
            form: Arc::new(Mutex::new(CreateAccountForm::default())),
        }
    }

    pub fn set_account_type(&self, account_type: &str) {
        self.lock_form().account_type = account_type.to_string();
    }

    pub fn set_initial_deposit(&self, amount: Decimal) {
        self.lock_form().initial_deposit = amount;
    }

    pub fn form(&self) -> CreateAccountForm {
        self.lock_form().clone()
    }

    /// Submit the current form. The form is kept as is afterwards.
    pub async fn submit(&self) -> BankResult<()> {
        let form = self.form();
        self.operation.submit(form).await
    }

    pub fn state(&self) -> OperationState {
        self.operation.state()
    }

    pub async fn wait_for_refresh(&self) {
        self.operation.wait_for_refresh().await
    }

    fn lock_form(&self) -> MutexGuard<'_, CreateAccountForm> {
        self.form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
