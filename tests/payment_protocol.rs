use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use payme_ledger::payment::{
    Branch, InMemoryPaymentStore, PaymentError, PaymentStore, StatementBuilder, Student,
    TransactionState, TransactionStateMachine, ledger,
};

struct Harness {
    store: InMemoryPaymentStore,
    machine: Arc<TransactionStateMachine>,
    student_id: Uuid,
}

/// One branch (fee 500 000, merchant "merchant-1") with active student "A1"
async fn harness() -> Harness {
    harness_with_timeout(Duration::from_secs(2)).await
}

async fn harness_with_timeout(timeout: Duration) -> Harness {
    let store = InMemoryPaymentStore::new();
    let branch = Branch {
        id: Uuid::new_v4(),
        name: "Chilonzor".into(),
        monthly_fee: 500_000,
        mfo_code: "00444".into(),
        account_number: "20208000900123456001".into(),
        merchant_id: Some("merchant-1".into()),
        topic_id: Some(7),
    };
    let student = Student {
        id: Uuid::new_v4(),
        account_id: Some("A1".into()),
        branch_id: branch.id,
        full_name: Some("Ali Valiyev".into()),
        parent_name: "Vali Valiyev".into(),
        group_name: Some("G-12".into()),
        contract_number: Some("C-2024-1".into()),
        discount_percent: Decimal::ZERO,
        balance: 0,
        active: true,
    };
    let student_id = student.id;
    store.add_branch(branch).await;
    store.add_student(student).await;

    let machine = TransactionStateMachine::new(Arc::new(store.clone()), timeout)
        .with_ledger_offset(ledger::ledger_offset(300));
    Harness {
        store,
        machine: Arc::new(machine),
        student_id,
    }
}

async fn balance(h: &Harness) -> i64 {
    h.store.student(h.student_id).await.unwrap().balance
}

// ============================================================
// Concrete scenarios
// ============================================================

#[tokio::test]
async fn test_create_perform_replay_then_cancel_rejected() {
    let h = harness().await;

    let created = h.machine.create("tx1", 50_000, "A1", 1000).await.unwrap();
    assert_eq!(created.transaction.state, TransactionState::Pending);
    assert_eq!(created.transaction.state.id(), 1);
    assert_eq!(created.transaction.create_time, 1000);
    assert_eq!(created.receivers.len(), 1);
    assert_eq!(created.receivers[0].id, "merchant-1");
    assert_eq!(created.receivers[0].amount, 50_000);

    let performed = h.machine.perform("tx1").await.unwrap();
    assert_eq!(performed.state.id(), 2);
    assert!(performed.perform_time > 0);
    assert_eq!(balance(&h).await, 50_000);
    assert_eq!(h.store.ledger_entries(h.student_id).await.unwrap().len(), 1);

    let again = h.machine.perform("tx1").await.unwrap();
    assert_eq!(again, performed);
    assert_eq!(balance(&h).await, 50_000);
    assert_eq!(h.store.ledger_entries(h.student_id).await.unwrap().len(), 1);

    let err = h.machine.cancel("tx1", Some(5)).await.unwrap_err();
    assert_eq!(err, PaymentError::CouldNotCancel);
    assert_eq!(err.code(), -31007);
    let after = h.machine.check("tx1").await.unwrap();
    assert_eq!(after.state, TransactionState::Performed);
    assert_eq!(after.cancel_time, 0);
    assert_eq!(balance(&h).await, 50_000);
}

#[tokio::test]
async fn test_zero_amount_is_rejected_without_row() {
    let h = harness().await;
    let err = h.machine.create("tx2", 0, "A1", 1000).await.unwrap_err();
    assert_eq!(err, PaymentError::InvalidAmount);
    assert_eq!(err.code(), -31001);
    assert_eq!(h.store.transaction_count().await, 0);
    assert_eq!(
        h.machine.check("tx2").await.unwrap_err(),
        PaymentError::TransactionNotFound
    );
}

#[tokio::test]
async fn test_unknown_account() {
    let h = harness().await;
    let err = h.machine.create("tx3", 1000, "unknown", 1000).await.unwrap_err();
    assert_eq!(err, PaymentError::AccountNotFound);
    assert_eq!(err.code(), -31050);
    assert_eq!(err.data(), Some("account"));
}

#[tokio::test]
async fn test_inactive_student_is_indistinguishable_from_unknown() {
    let h = harness().await;
    h.store.set_student_active(h.student_id, false).await;

    let inactive = h.machine.check_perform(1000, "A1").await.unwrap_err();
    let unknown = h.machine.check_perform(1000, "nobody").await.unwrap_err();
    assert_eq!(inactive, unknown);
    assert_eq!(
        h.machine.create("tx4", 1000, "A1", 1).await.unwrap_err(),
        PaymentError::AccountNotFound
    );
}

// ============================================================
// Idempotence
// ============================================================

#[tokio::test]
async fn test_create_twice_returns_same_snapshot() {
    let h = harness().await;
    let first = h.machine.create("c1", 10_000, "A1", 500).await.unwrap();
    let second = h.machine.create("c1", 10_000, "A1", 500).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.store.transaction_count().await, 1);
}

#[tokio::test]
async fn test_cancel_twice_keeps_original_time_and_reason() {
    let h = harness().await;
    h.machine.create("k1", 10_000, "A1", 500).await.unwrap();

    let first = h.machine.cancel("k1", Some(3)).await.unwrap();
    assert_eq!(first.state.id(), -1);
    assert_eq!(first.reason, Some(3));
    assert!(first.cancel_time > 0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.machine.cancel("k1", Some(4)).await.unwrap();
    assert_eq!(second.cancel_time, first.cancel_time);
    assert_eq!(second.reason, Some(3));
    assert_eq!(balance(&h).await, 0);
}

// ============================================================
// Accounting invariant
// ============================================================

#[tokio::test]
async fn test_balance_equals_sum_of_performed() {
    let h = harness().await;
    let amounts = [10_000, 25_000, 40_000, 5_000];
    for (i, amount) in amounts.iter().enumerate() {
        h.machine
            .create(&format!("inv-{}", i), *amount, "A1", 100 + i as i64)
            .await
            .unwrap();
    }
    h.machine.perform("inv-0").await.unwrap();
    h.machine.perform("inv-2").await.unwrap();
    h.machine.cancel("inv-1", Some(1)).await.unwrap();
    // inv-3 stays pending

    let performed: i64 = h
        .store
        .transactions_between(i64::MIN, i64::MAX)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.state == TransactionState::Performed)
        .map(|tx| tx.amount)
        .sum();
    let ledger_sum: i64 = h
        .store
        .ledger_entries(h.student_id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount_paid)
        .sum();

    assert_eq!(performed, 50_000);
    assert_eq!(balance(&h).await, performed);
    assert_eq!(ledger_sum, performed);
}

// ============================================================
// Concurrency
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_perform_credits_once() {
    let h = harness().await;
    h.machine.create("race", 70_000, "A1", 1).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let machine = h.machine.clone();
        handles.push(tokio::spawn(async move { machine.perform("race").await }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert!(results.iter().all(|r| r == &results[0]));
    assert_eq!(balance(&h).await, 70_000);
    assert_eq!(h.store.ledger_entries(h.student_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_perform_and_cancel_pick_one_outcome() {
    let h = harness().await;
    h.machine.create("duel", 30_000, "A1", 1).await.unwrap();

    let m1 = h.machine.clone();
    let m2 = h.machine.clone();
    let perform = tokio::spawn(async move { m1.perform("duel").await });
    let cancel = tokio::spawn(async move { m2.cancel("duel", Some(2)).await });
    let perform = perform.await.unwrap();
    let cancel = cancel.await.unwrap();

    let stored = h.machine.check("duel").await.unwrap();
    match stored.state {
        TransactionState::Performed => {
            assert!(perform.is_ok());
            assert_eq!(cancel.unwrap_err(), PaymentError::CouldNotCancel);
            assert_eq!(balance(&h).await, 30_000);
        }
        TransactionState::Cancelled => {
            assert!(cancel.is_ok());
            assert_eq!(perform.unwrap_err(), PaymentError::CouldNotPerform);
            assert_eq!(balance(&h).await, 0);
        }
        TransactionState::Pending => panic!("one of the calls must win"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_inserts_one_row() {
    let h = harness().await;
    let mut handles = Vec::new();
    for _ in 0..8 {
        let machine = h.machine.clone();
        handles.push(tokio::spawn(async move {
            machine.create("dup", 1_000, "A1", 9).await
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().transaction.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.store.transaction_count().await, 1);
}

// ============================================================
// Timeouts
// ============================================================

#[tokio::test]
async fn test_timeout_is_internal_and_retry_is_safe() {
    let h = harness_with_timeout(Duration::from_millis(50)).await;
    h.machine.create("slow", 20_000, "A1", 1).await.unwrap();

    h.store.set_latency(Some(Duration::from_millis(500))).await;
    let err = h.machine.perform("slow").await.unwrap_err();
    assert!(err.is_internal());
    assert_eq!(err.code(), -32603);

    h.store.set_latency(None).await;
    let stored = h.machine.check("slow").await.unwrap();
    assert_eq!(stored.state, TransactionState::Pending);
    assert_eq!(stored.perform_time, 0);
    assert_eq!(balance(&h).await, 0);
    assert!(h.store.ledger_entries(h.student_id).await.unwrap().is_empty());

    // Provider retries after the timeout
    let performed = h.machine.perform("slow").await.unwrap();
    assert_eq!(performed.state, TransactionState::Performed);
    assert_eq!(balance(&h).await, 20_000);
}

// ============================================================
// Statement
// ============================================================

#[tokio::test]
async fn test_statement_window_and_order() {
    let h = harness().await;
    for (id, time) in [("s3", 300), ("s1", 100), ("s4", 400), ("s2", 200)] {
        h.machine.create(id, 1_000, "A1", time).await.unwrap();
    }
    h.machine.perform("s2").await.unwrap();

    let builder = StatementBuilder::new(h.machine.clone());
    let lines = builder.build(100, 300).await.unwrap();
    let ids: Vec<_> = lines
        .iter()
        .map(|l| l.transaction.payme_tx_id.as_str())
        .collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(lines[1].transaction.state, TransactionState::Performed);
    assert!(lines.iter().all(|l| l.account_id == "A1"));
    assert!(lines.iter().all(|l| l.receivers[0].id == "merchant-1"));
}
