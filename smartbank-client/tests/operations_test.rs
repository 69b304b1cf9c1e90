//! Write operations, the account cache, and deletion confirmation against
//! the in-memory ledger

mod common;

use common::*;
use rust_decimal::Decimal;
use smartbank_client::{
    AccountCache, CreateAccountController, Dashboard, DashboardAccess, DeletionState,
    OperationPhase, OperationState, TransferFundsController,
};
use smartbank_core::{AccountStatus, AccountType, BankError, LedgerGateway};
use std::sync::Arc;
use std::time::Duration;

async fn dashboard(ledger: &Arc<FakeLedger>) -> Dashboard {
    let sessions = signed_in(ledger).await;
    match Dashboard::enter(&sessions).await {
        DashboardAccess::Granted(dashboard) => dashboard,
        DashboardAccess::RedirectToLogin => panic!("expected a session"),
    }
}

async fn wait_until_pending(is_pending: impl Fn() -> bool) {
    while !is_pending() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_create_savings_account_refreshes_cache() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();

    create.set_account_type("savings");
    create.set_initial_deposit(Decimal::from(500));
    create.submit().await.unwrap();

    let state = create.state();
    assert_eq!(state.phase, OperationPhase::Succeeded);
    assert_eq!(state.message, "Account created successfully!");

    create.wait_for_refresh().await;
    let accounts = dashboard.accounts();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account_type, AccountType::Savings);
    assert_eq!(accounts[0].balance, Decimal::from(500));
    assert_eq!(dashboard.summary().formatted_total(), "$500.00");
}

#[tokio::test]
async fn test_deposit_below_minimum_never_reaches_ledger() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();

    for deposit in [Decimal::ZERO, Decimal::new(49999, 2), Decimal::from(-10)] {
        create.set_initial_deposit(deposit);
        let error = create.submit().await.unwrap_err();
        assert!(matches!(error, BankError::Validation { .. }));
        assert_eq!(create.state().phase, OperationPhase::Failed);
        assert_eq!(create.state().message, "Initial deposit must be at least 500.");
    }

    create.set_initial_deposit(Decimal::from(500));
    create.set_account_type("checking");
    let error = create.submit().await.unwrap_err();
    assert_eq!(error.user_message(), "Unsupported account type: checking");

    assert_eq!(ledger.calls(CREATE_ACCOUNT), 0);
}

#[tokio::test]
async fn test_fixed_deposit_alias_is_accepted() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();

    create.set_account_type("fixedDeposit");
    create.set_initial_deposit(Decimal::from(1000));
    create.submit().await.unwrap();
    create.wait_for_refresh().await;

    assert_eq!(dashboard.accounts()[0].account_type, AccountType::FixedDeposit);
}

#[tokio::test]
async fn test_transfer_without_source_is_local_validation_error() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let transfer = dashboard.transfer_funds();

    transfer.set_destination("100000000002");
    transfer.set_amount(Decimal::from(10));
    let error = transfer.submit().await.unwrap_err();

    assert!(matches!(error, BankError::Validation { .. }));
    assert_eq!(error.user_message(), "Please select an account to transfer from.");
    assert_eq!(transfer.state().phase, OperationPhase::Failed);
    assert_eq!(
        transfer.state().message,
        "Please select an account to transfer from."
    );
    assert_eq!(ledger.calls(TRANSFER), 0);
}

#[tokio::test]
async fn test_transfer_success_keeps_source_and_clears_form() {
    let ledger = FakeLedger::new();
    let source = ledger.seed_account(EMAIL, "100000000101", 800);
    ledger.seed_account("grace@example.com", "100000000202", 0);
    let dashboard = dashboard(&ledger).await;
    let transfer = dashboard.transfer_funds();

    transfer.select_source(source);
    transfer.set_destination(" 100000000202 ");
    transfer.set_amount(Decimal::from(300));
    transfer.submit().await.unwrap();

    assert_eq!(transfer.state().message, "Money transferred successfully!");
    let form = transfer.form();
    assert_eq!(form.source_account_id, Some(source));
    assert!(form.destination_account_number.is_empty());
    assert_eq!(form.amount, Decimal::ZERO);

    transfer.wait_for_refresh().await;
    assert_eq!(
        dashboard.cache().find(source).unwrap().balance,
        Decimal::from(500)
    );
    assert_eq!(ledger.balance_of("100000000202"), Some(Decimal::from(300)));
}

#[tokio::test]
async fn test_rejected_transfer_keeps_form_and_cache() {
    let ledger = FakeLedger::new();
    let source = ledger.seed_account(EMAIL, "100000000101", 100);
    ledger.seed_account(EMAIL, "100000000102", 0);
    let dashboard = dashboard(&ledger).await;
    let transfer = dashboard.transfer_funds();
    let generation = dashboard.cache().generation();
    let lists = ledger.calls(LIST_ACCOUNTS);

    transfer.select_source(source);
    transfer.set_destination("100000000102");
    transfer.set_amount(Decimal::from(1000));
    let error = transfer.submit().await.unwrap_err();

    assert!(matches!(error, BankError::Conflict { .. }));
    assert_eq!(transfer.state().message, "Insufficient funds.");
    assert_eq!(transfer.form().amount, Decimal::from(1000));
    assert_eq!(transfer.form().destination_account_number, "100000000102");

    transfer.wait_for_refresh().await;
    assert_eq!(dashboard.cache().generation(), generation);
    assert_eq!(ledger.calls(LIST_ACCOUNTS), lists);
}

#[tokio::test]
async fn test_each_successful_write_refreshes_exactly_once() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();
    assert_eq!(ledger.calls(LIST_ACCOUNTS), 1);

    create.submit().await.unwrap();
    create.wait_for_refresh().await;
    assert_eq!(ledger.calls(LIST_ACCOUNTS), 2);

    create.submit().await.unwrap();
    create.wait_for_refresh().await;
    assert_eq!(ledger.calls(LIST_ACCOUNTS), 3);

    // A failed write does not refresh.
    create.set_initial_deposit(Decimal::from(10));
    let _ = create.submit().await;
    create.wait_for_refresh().await;
    assert_eq!(ledger.calls(LIST_ACCOUNTS), 3);
}

#[tokio::test]
async fn test_refresh_replaces_list_wholesale() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();

    create.submit().await.unwrap();
    create.wait_for_refresh().await;
    let before = dashboard.accounts();
    assert_eq!(before.len(), 1);

    // Changed behind the client's back; only a refresh can reveal it.
    let outside = ledger.seed_account(EMAIL, "100000000999", 42);
    create.submit().await.unwrap();
    create.wait_for_refresh().await;

    let after = dashboard.accounts();
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 3);
    assert!(after.iter().any(|account| account.id == outside));
    assert_eq!(dashboard.summary().total_balance, Decimal::from(1042));
}

#[tokio::test]
async fn test_pending_controller_rejects_second_submit() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account().clone();
    let gate = ledger.gate(CREATE_ACCOUNT);

    let first = tokio::spawn({
        let create = create.clone();
        async move { create.submit().await }
    });
    wait_until_pending(|| create.state().is_pending()).await;

    let second = create.submit().await;
    assert!(matches!(second, Err(BankError::Busy { .. })));
    assert!(create.state().is_pending());
    assert!(create.state().message.is_empty());

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(create.state().phase, OperationPhase::Succeeded);
    assert_eq!(ledger.calls(CREATE_ACCOUNT), 1);
}

#[tokio::test]
async fn test_abandoned_submit_returns_controller_to_idle() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();
    let _gate = ledger.gate(CREATE_ACCOUNT);

    create.set_account_type("savings");
    create.set_initial_deposit(Decimal::from(500));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), create.submit()).await;
    assert!(timed_out.is_err());

    assert_eq!(create.state(), OperationState::default());

    create.submit().await.unwrap();
    assert_eq!(create.state().phase, OperationPhase::Succeeded);
    assert_eq!(ledger.calls(CREATE_ACCOUNT), 2);
}

#[tokio::test]
async fn test_burst_of_submits_issues_one_request() {
    let ledger = FakeLedger::new();
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account();
    let gate = ledger.gate(CREATE_ACCOUNT);

    let burst = futures::future::join_all((0..5).map(|_| create.submit()));
    let release = async {
        wait_until_pending(|| create.state().is_pending()).await;
        gate.notify_one();
    };
    let (results, ()) = tokio::join!(burst, release);

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(BankError::Busy { .. })))
            .count(),
        4
    );
    assert_eq!(ledger.calls(CREATE_ACCOUNT), 1);
    create.wait_for_refresh().await;
    assert_eq!(dashboard.summary().account_count, 1);
}

#[tokio::test]
async fn test_different_controllers_do_not_block_each_other() {
    let ledger = FakeLedger::new();
    let source = ledger.seed_account(EMAIL, "100000000101", 800);
    ledger.seed_account(EMAIL, "100000000102", 0);
    let dashboard = dashboard(&ledger).await;
    let create = dashboard.create_account().clone();
    let transfer = dashboard.transfer_funds();
    let gate = ledger.gate(CREATE_ACCOUNT);

    let pending_create = tokio::spawn({
        let create = create.clone();
        async move { create.submit().await }
    });
    wait_until_pending(|| create.state().is_pending()).await;

    transfer.select_source(source);
    transfer.set_destination("100000000102");
    transfer.set_amount(Decimal::from(100));
    transfer.submit().await.unwrap();
    assert_eq!(transfer.state().phase, OperationPhase::Succeeded);
    assert!(create.state().is_pending());

    gate.notify_one();
    pending_create.await.unwrap().unwrap();
    create.wait_for_refresh().await;
    transfer.wait_for_refresh().await;

    assert_eq!(ledger.calls(CREATE_ACCOUNT), 1);
    assert_eq!(ledger.calls(TRANSFER), 1);
    dashboard.cache().refresh().await.unwrap();
    assert_eq!(dashboard.summary().account_count, 3);
}

#[tokio::test]
async fn test_controller_without_session_fails_locally() {
    let ledger = FakeLedger::new();
    let sessions = session_store(&ledger);
    let gateway = Arc::clone(&ledger) as Arc<dyn LedgerGateway>;
    let cache = AccountCache::new(sessions.clone(), Arc::clone(&gateway));

    let create = CreateAccountController::new(sessions.clone(), cache.clone(), Arc::clone(&gateway));
    let error = create.submit().await.unwrap_err();
    assert!(matches!(error, BankError::SessionRequired { .. }));
    assert_eq!(create.state().message, "Please log in to continue.");

    let transfer = TransferFundsController::new(sessions, cache, gateway);
    transfer.select_source(1);
    transfer.set_destination("100000000102");
    transfer.set_amount(Decimal::ONE);
    assert!(transfer.submit().await.is_err());

    assert_eq!(ledger.calls(CREATE_ACCOUNT), 0);
    assert_eq!(ledger.calls(TRANSFER), 0);
}

#[tokio::test]
async fn test_locked_account_deletion_keeps_confirmation_open() {
    let ledger = FakeLedger::new();
    let locked = ledger.seed_account(EMAIL, "100000000101", 0);
    ledger.set_status(locked, AccountStatus::Locked);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion();
    let before = dashboard.accounts();
    let generation = dashboard.cache().generation();
    let lists = ledger.calls(LIST_ACCOUNTS);

    deletion.request_delete(locked).unwrap();
    let error = deletion.confirm().await.unwrap_err();

    assert!(matches!(error, BankError::Conflict { .. }));
    assert_eq!(
        deletion.state(),
        DeletionState::Open {
            target: locked,
            message: Some("account is locked".to_string()),
        }
    );
    assert_eq!(deletion.message().as_deref(), Some("account is locked"));
    assert_eq!(deletion.operation_state().phase, OperationPhase::Failed);

    deletion.wait_for_refresh().await;
    assert_eq!(dashboard.cache().generation(), generation);
    assert_eq!(dashboard.accounts(), before);
    assert_eq!(ledger.calls(LIST_ACCOUNTS), lists);
    assert_eq!(ledger.calls(DELETE_ACCOUNT), 1);
}

#[tokio::test]
async fn test_retry_after_failed_deletion() {
    let ledger = FakeLedger::new();
    let account = ledger.seed_account(EMAIL, "100000000101", 0);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion();
    ledger.fail(DELETE_ACCOUNT, Injected::Conflict("ledger is busy"));

    deletion.request_delete(account).unwrap();
    assert!(deletion.confirm().await.is_err());
    assert_eq!(deletion.message().as_deref(), Some("ledger is busy"));

    ledger.heal(DELETE_ACCOUNT);
    deletion.confirm().await.unwrap();
    assert_eq!(deletion.state(), DeletionState::Closed);
    assert_eq!(
        deletion.operation_state().message,
        "Account deleted successfully!"
    );

    deletion.wait_for_refresh().await;
    assert!(dashboard.accounts().is_empty());
}

#[tokio::test]
async fn test_cancelled_deletion_never_calls_ledger() {
    let ledger = FakeLedger::new();
    let account = ledger.seed_account(EMAIL, "100000000101", 0);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion();

    deletion.request_delete(account).unwrap();
    assert_eq!(deletion.state().target(), Some(account));
    deletion.cancel().unwrap();
    assert_eq!(deletion.state(), DeletionState::Closed);

    // Nothing to confirm once closed
    let error = deletion.confirm().await.unwrap_err();
    assert!(matches!(error, BankError::InvalidTransition { .. }));

    assert_eq!(ledger.calls(DELETE_ACCOUNT), 0);
    assert_eq!(dashboard.accounts().len(), 1);
}

#[tokio::test]
async fn test_pending_deletion_cannot_be_cancelled_or_retargeted() {
    let ledger = FakeLedger::new();
    let account = ledger.seed_account(EMAIL, "100000000101", 0);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion().clone();
    let gate = ledger.gate(DELETE_ACCOUNT);

    deletion.request_delete(account).unwrap();
    let confirming = tokio::spawn({
        let deletion = deletion.clone();
        async move { deletion.confirm().await }
    });
    wait_until_pending(|| matches!(deletion.state(), DeletionState::Pending { .. })).await;

    assert!(matches!(
        deletion.cancel(),
        Err(BankError::InvalidTransition { .. })
    ));
    assert!(deletion.request_delete(account + 1).is_err());
    assert!(matches!(
        deletion.confirm().await,
        Err(BankError::InvalidTransition { .. })
    ));

    gate.notify_one();
    confirming.await.unwrap().unwrap();
    assert_eq!(deletion.state(), DeletionState::Closed);
    assert_eq!(ledger.calls(DELETE_ACCOUNT), 1);
}

#[tokio::test]
async fn test_abandoned_confirm_reopens_confirmation() {
    let ledger = FakeLedger::new();
    let account = ledger.seed_account(EMAIL, "100000000101", 0);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion();
    let _gate = ledger.gate(DELETE_ACCOUNT);

    deletion.request_delete(account).unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(50), deletion.confirm()).await;
    assert!(timed_out.is_err());

    assert_eq!(
        deletion.state(),
        DeletionState::Open {
            target: account,
            message: None,
        }
    );
    assert_eq!(deletion.operation_state(), OperationState::default());

    deletion.cancel().unwrap();
    assert_eq!(deletion.state(), DeletionState::Closed);

    deletion.request_delete(account).unwrap();
    deletion.confirm().await.unwrap();
    assert_eq!(deletion.state(), DeletionState::Closed);
    assert_eq!(ledger.calls(DELETE_ACCOUNT), 2);
}

#[tokio::test]
async fn test_new_deletion_request_clears_previous_failure() {
    let ledger = FakeLedger::new();
    let locked = ledger.seed_account(EMAIL, "100000000101", 0);
    let other = ledger.seed_account(EMAIL, "100000000102", 0);
    ledger.set_status(locked, AccountStatus::Locked);
    let dashboard = dashboard(&ledger).await;
    let deletion = dashboard.deletion();

    deletion.request_delete(locked).unwrap();
    assert!(deletion.confirm().await.is_err());
    assert_eq!(deletion.operation_state().phase, OperationPhase::Failed);

    deletion.request_delete(other).unwrap();
    assert_eq!(
        deletion.state(),
        DeletionState::Open {
            target: other,
            message: None,
        }
    );
    assert_eq!(deletion.message(), None);
    assert_eq!(deletion.operation_state(), OperationState::default());
}

#[tokio::test]
async fn test_list_transport_failure_empties_cache() {
    let ledger = FakeLedger::new();
    ledger.seed_account(EMAIL, "100000000101", 700);
    let dashboard = dashboard(&ledger).await;
    assert_eq!(dashboard.accounts().len(), 1);

    let transport = "error sending request for url (http://127.0.0.1:9/accounts/)";
    ledger.fail(LIST_ACCOUNTS, Injected::Network(transport));

    let error = dashboard.cache().refresh().await.unwrap_err();
    assert!(matches!(error, BankError::Network { .. }));
    assert!(dashboard.accounts().is_empty());
    assert_eq!(dashboard.summary().total_balance, Decimal::ZERO);
    assert_eq!(dashboard.message().as_deref(), Some(transport));

    // The next good fetch clears the message.
    ledger.heal(LIST_ACCOUNTS);
    dashboard.cache().refresh().await.unwrap();
    assert_eq!(dashboard.accounts().len(), 1);
    assert_eq!(dashboard.message(), None);
}

#[tokio::test]
async fn test_dashboard_entry_with_failing_ledger_shows_message() {
    let ledger = FakeLedger::new();
    let sessions = signed_in(&ledger).await;
    ledger.fail(LIST_ACCOUNTS, Injected::Network("connection refused"));

    let DashboardAccess::Granted(dashboard) = Dashboard::enter(&sessions).await else {
        panic!("expected a session");
    };
    assert!(dashboard.accounts().is_empty());
    assert_eq!(dashboard.message().as_deref(), Some("connection refused"));
}
