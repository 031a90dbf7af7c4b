//! In-process payment store
//!
//! Same port contract as the PostgreSQL store. A single async mutex plays the role
//! of the row lock, so the CAS primitives stay atomic under concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::PaymentError;
use super::ledger::{LedgerCredit, LedgerEntry};
use super::state::TransactionState;
use super::store::{InsertOutcome, PaymentStore, SettleOutcome};
use super::types::{AccountContext, Branch, NewTransaction, PaymentTransaction, Student};

#[derive(Default)]
struct StoreState {
    branches: HashMap<Uuid, Branch>,
    students: HashMap<Uuid, Student>,
    /// payme_tx_id → transaction
    transactions: HashMap<String, PaymentTransaction>,
    next_id: i64,
    ledger: Vec<LedgerEntry>,
    latency: Option<Duration>,
    failure: Option<String>,
}

impl StoreState {
    fn context(&self, student: &Student) -> Option<AccountContext> {
        let branch = self.branches.get(&student.branch_id)?;
        Some(AccountContext {
            student: student.clone(),
            branch: branch.clone(),
        })
    }
}

/// Thread-safe in-memory payment store for tests and local runs
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_branch(&self, branch: Branch) {
        self.state.lock().await.branches.insert(branch.id, branch);
    }

    pub async fn add_student(&self, student: Student) {
        self.state.lock().await.students.insert(student.id, student);
    }

    pub async fn set_student_active(&self, student_id: Uuid, active: bool) {
        if let Some(student) = self.state.lock().await.students.get_mut(&student_id) {
            student.active = active;
        }
    }

    /// Current snapshot of a student row
    pub async fn student(&self, student_id: Uuid) -> Option<Student> {
        self.state.lock().await.students.get(&student_id).cloned()
    }

    /// Number of stored transactions
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    /// Delay every call before it touches the data (simulates a slow backend)
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Make every call fail with `Internal(message)` until cleared
    pub async fn set_failure(&self, message: Option<String>) {
        self.state.lock().await.failure = message;
    }

    async fn enter(&self) -> Result<tokio::sync::MutexGuard<'_, StoreState>, PaymentError> {
        let latency = self.state.lock().await.latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let guard = self.state.lock().await;
        if let Some(message) = &guard.failure {
            return Err(PaymentError::Internal(message.clone()));
        }
        Ok(guard)
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_account(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountContext>, PaymentError> {
        let state = self.enter().await?;
        Ok(state
            .students
            .values()
            .find(|s| s.account_id.as_deref() == Some(account_id))
            .and_then(|s| state.context(s)))
    }

    async fn find_student(&self, student_id: Uuid) -> Result<Option<AccountContext>, PaymentError> {
        let state = self.enter().await?;
        Ok(state
            .students
            .get(&student_id)
            .and_then(|s| state.context(s)))
    }

    async fn get_transaction(
        &self,
        payme_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentError> {
        let state = self.enter().await?;
        Ok(state.transactions.get(payme_tx_id).cloned())
    }

    async fn insert_pending(&self, tx: &NewTransaction) -> Result<InsertOutcome, PaymentError> {
        let mut state = self.enter().await?;
        if let Some(existing) = state.transactions.get(&tx.payme_tx_id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        state.next_id += 1;
        let record = PaymentTransaction {
            id: state.next_id,
            payme_tx_id: tx.payme_tx_id.clone(),
            student_id: tx.student_id,
            amount: tx.amount,
            state: TransactionState::Pending,
            create_time: tx.create_time,
            perform_time: 0,
            cancel_time: 0,
            reason: None,
        };
        state
            .transactions
            .insert(record.payme_tx_id.clone(), record.clone());
        Ok(InsertOutcome::Created(record))
    }

    async fn perform_if_pending(
        &self,
        payme_tx_id: &str,
        perform_time: i64,
        credit: &LedgerCredit,
    ) -> Result<SettleOutcome, PaymentError> {
        let mut guard = self.enter().await?;
        let state = &mut *guard;

        let Some(tx) = state.transactions.get(payme_tx_id) else {
            return Ok(SettleOutcome::NotPending);
        };
        if tx.state != TransactionState::Pending {
            return Ok(SettleOutcome::NotPending);
        }
        if tx.id != credit.transaction_id
            || tx.amount != credit.amount
            || tx.student_id != credit.student_id
        {
            return Err(PaymentError::Internal(format!(
                "ledger credit does not match transaction {}",
                payme_tx_id
            )));
        }

        let Some(student) = state
            .students
            .get_mut(&credit.student_id)
            .filter(|s| s.active)
        else {
            return Ok(SettleOutcome::OwnerUnavailable);
        };
        student.balance += credit.amount;
        state.ledger.push(LedgerEntry::from(credit));

        let Some(tx) = state.transactions.get_mut(payme_tx_id) else {
            return Err(PaymentError::Internal(format!(
                "transaction {} vanished under lock",
                payme_tx_id
            )));
        };
        tx.state = TransactionState::Performed;
        tx.perform_time = perform_time;
        Ok(SettleOutcome::Settled(tx.clone()))
    }

    async fn cancel_if_pending(
        &self,
        payme_tx_id: &str,
        cancel_time: i64,
        reason: i32,
    ) -> Result<Option<PaymentTransaction>, PaymentError> {
        let mut state = self.enter().await?;
        match state.transactions.get_mut(payme_tx_id) {
            Some(tx) if tx.state == TransactionState::Pending => {
                tx.state = TransactionState::Cancelled;
                tx.cancel_time = cancel_time;
                tx.reason = Some(reason);
                Ok(Some(tx.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn transactions_between(
        &self,
        from: i64,
        to: i64,
    ) -> Result<Vec<PaymentTransaction>, PaymentError> {
        let state = self.enter().await?;
        let mut records: Vec<PaymentTransaction> = state
            .transactions
            .values()
            .filter(|tx| tx.create_time >= from && tx.create_time <= to)
            .cloned()
            .collect();
        records.sort_by_key(|tx| (tx.create_time, tx.id));
        Ok(records)
    }

    async fn ledger_entries(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>, PaymentError> {
        let state = self.enter().await?;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }
}
