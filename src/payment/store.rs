//! Payment storage port
//!
//! The FSM never assumes single-writer access. Every mutation here is a
//! compare-and-set against `state = PENDING`, evaluated by the storage engine under
//! a row lock, so concurrent retries of the same provider call cannot double-apply.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::PaymentError;
use super::ledger::{LedgerCredit, LedgerEntry};
use super::types::{AccountContext, NewTransaction, PaymentTransaction};

/// Result of inserting a Pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written
    Created(PaymentTransaction),
    /// The provider id was already taken (possibly by a concurrent call)
    Existing(PaymentTransaction),
}

/// Result of the PENDING → PERFORMED atomic unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// State flipped, balance credited and ledger entry appended in one commit
    Settled(PaymentTransaction),
    /// The row was no longer PENDING when locked (or no longer exists)
    NotPending,
    /// The owning student is gone or inactive; nothing was written
    OwnerUnavailable,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Student + branch by external account id (active flag NOT checked)
    async fn find_account(&self, account_id: &str)
    -> Result<Option<AccountContext>, PaymentError>;

    /// Student + branch by internal student id (active flag NOT checked)
    async fn find_student(&self, student_id: Uuid) -> Result<Option<AccountContext>, PaymentError>;

    async fn get_transaction(
        &self,
        payme_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentError>;

    /// Insert a PENDING row unless `payme_tx_id` already exists
    async fn insert_pending(&self, tx: &NewTransaction) -> Result<InsertOutcome, PaymentError>;

    /// CAS PENDING → PERFORMED together with the ledger credit, all-or-nothing
    async fn perform_if_pending(
        &self,
        payme_tx_id: &str,
        perform_time: i64,
        credit: &LedgerCredit,
    ) -> Result<SettleOutcome, PaymentError>;

    /// CAS PENDING → CANCELLED; `None` if the row was not PENDING
    async fn cancel_if_pending(
        &self,
        payme_tx_id: &str,
        cancel_time: i64,
        reason: i32,
    ) -> Result<Option<PaymentTransaction>, PaymentError>;

    /// Transactions with `from <= create_time <= to`, ascending by create time
    async fn transactions_between(
        &self,
        from: i64,
        to: i64,
    ) -> Result<Vec<PaymentTransaction>, PaymentError>;

    /// Ledger history of a student, oldest first
    async fn ledger_entries(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>, PaymentError>;
}
