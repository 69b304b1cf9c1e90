//! Close an account

use async_trait::async_trait;
use smartbank_core::{validation_error, AccountId, BankResult, Credential, LedgerGateway};

use super::{OperationController, OperationKind, WriteOperation};

pub struct DeleteAccount;

/// Only [`crate::DeletionConfirmationFlow`] should drive this controller.
pub type DeleteAccountController = OperationController<DeleteAccount>;

#[async_trait]
impl WriteOperation for DeleteAccount {
    /// Target chosen by the confirmation flow
    type Input = Option<AccountId>;
    type Request = AccountId;

    const KIND: OperationKind = OperationKind::DeleteAccount;
    const SUCCESS_MESSAGE: &'static str = "Account deleted successfully!";

    fn prepare(target: Option<AccountId>) -> BankResult<AccountId> {
        target.ok_or_else(|| {
            validation_error!(
                "No account selected for deletion.",
                "account_id",
                "delete_account"
            )
        })
    }

    async fn dispatch(
        gateway: &dyn LedgerGateway,
        credential: &Credential,
        account_id: &AccountId,
    ) -> BankResult<()> {
        gateway.delete_account(credential, *account_id).await
    }
}
