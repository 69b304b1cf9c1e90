//! Move funds from one of the user's accounts to any account number

use async_trait::async_trait;
use rust_decimal::Decimal;
use smartbank_core::{
    validation_error, AccountId, BankResult, Credential, LedgerGateway, TransferRequest,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{OperationController, OperationKind, OperationState, WriteOperation};
use crate::cache::AccountCache;
use crate::session::SessionStore;

pub struct TransferFunds;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferForm {
    pub source_account_id: Option<AccountId>,
    pub destination_account_number: String,
    pub amount: Decimal,
}

#[async_trait]
impl WriteOperation for TransferFunds {
    type Input = TransferForm;
    type Request = TransferRequest;

    const KIND: OperationKind = OperationKind::TransferFunds;
    const SUCCESS_MESSAGE: &'static str = "Money transferred successfully!";

    fn prepare(form: TransferForm) -> BankResult<TransferRequest> {
        let Some(source_account_id) = form.source_account_id else {
            return Err(validation_error!(
                "Please select an account to transfer from.",
                "source_account_id",
                "transfer_funds"
            ));
        };

        let destination = form.destination_account_number.trim();
        if destination.is_empty() {
            return Err(validation_error!(
                "Please enter a destination account number.",
                "destination_account_number",
                "transfer_funds"
            ));
        }

        if form.amount <= Decimal::ZERO {
            return Err(validation_error!(
                "Transfer amount must be positive.",
                "amount",
                "transfer_funds"
            ));
        }

        Ok(TransferRequest {
            source_account_id,
            destination_account_number: destination.to_string(),
            amount: form.amount,
        })
    }

    async fn dispatch(
        gateway: &dyn LedgerGateway,
        credential: &Credential,
        request: &TransferRequest,
    ) -> BankResult<()> {
        // The returned source account is not applied locally; the refresh
        // that follows is the only way balances change.
        let source = gateway.transfer(credential, request).await?;
        debug!(source = %source.account_number, "Ledger accepted transfer");
        Ok(())
    }
}

/// Transfer form plus its controller
#[derive(Clone)]
pub struct TransferFundsController {
    operation: OperationController<TransferFunds>,
    form: Arc<Mutex<TransferForm>>,
}

impl TransferFundsController {
    pub fn new(session: SessionStore, cache: AccountCache, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            operation: OperationController::new(session, cache, gateway),
            form: Arc::new(Mutex::new(TransferForm::default())),
        }
    }

    /// Pick the account to transfer from.
    pub fn select_source(&self, account_id: AccountId) {
        self.lock_form().source_account_id = Some(account_id);
    }

    pub fn clear_source(&self) {
        self.lock_form().source_account_id = None;
    }

    pub fn set_destination(&self, account_number: &str) {
        self.lock_form().destination_account_number = account_number.to_string();
    }

    pub fn set_amount(&self, amount: Decimal) {
        self.lock_form().amount = amount;
    }

    pub fn form(&self) -> TransferForm {
        self.lock_form().clone()
    }

    /// Submit the current form. On success the destination and amount are
    /// cleared and the source stays selected.
    ///
    /// The form is read once before the request goes out. Edits made while
    /// it is pending are not sent and are cleared along with the rest on
    /// success.
    pub async fn submit(&self) -> BankResult<()> {
        let form = self.form();
        self.operation.submit(form).await?;

        let mut form = self.lock_form();
        form.destination_account_number.clear();
        form.amount = Decimal::ZERO;
        Ok(())
    }

    pub fn state(&self) -> OperationState {
        self.operation.state()
    }

    pub async fn wait_for_refresh(&self) {
        self.operation.wait_for_refresh().await
    }

    fn lock_form(&self) -> MutexGuard<'_, TransferForm> {
        self.form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
