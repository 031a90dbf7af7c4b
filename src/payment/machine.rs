//! Transaction State Machine
//!
//! Drives provider transactions through PENDING → PERFORMED | CANCELLED.
//!
//! Every operation is replay-safe: a repeated call observes the stored state and
//! returns the same snapshot instead of applying its effect twice. Transitions go
//! through the store's CAS primitives; when a CAS misses, the row is re-read and the
//! replay rules are applied to whatever a concurrent caller left behind.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tracing::{debug, error, info, warn};

use super::error::PaymentError;
use super::ledger::{self, LedgerCredit};
use super::resolver::AccountResolver;
use super::state::TransactionState;
use super::store::{InsertOutcome, PaymentStore, SettleOutcome};
use super::types::{AccountContext, NewTransaction, PaymentTransaction, Receiver};
use crate::notify::{NotificationSender, PaymentNotification};

/// Result of CreateTransaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub transaction: PaymentTransaction,
    pub receivers: Vec<Receiver>,
}

pub struct TransactionStateMachine {
    store: Arc<dyn PaymentStore>,
    resolver: AccountResolver,
    storage_timeout: Duration,
    ledger_offset: FixedOffset,
    notifier: Option<NotificationSender>,
}

impl TransactionStateMachine {
    pub fn new(store: Arc<dyn PaymentStore>, storage_timeout: Duration) -> Self {
        Self {
            resolver: AccountResolver::new(store.clone()),
            store,
            storage_timeout,
            ledger_offset: ledger::ledger_offset(0),
            notifier: None,
        }
    }

    /// Offset used for accounting months and notification timestamps
    pub fn with_ledger_offset(mut self, offset: FixedOffset) -> Self {
        self.ledger_offset = offset;
        self
    }

    pub fn with_notifier(mut self, sender: NotificationSender) -> Self {
        self.notifier = Some(sender);
        self
    }

    pub fn store(&self) -> &Arc<dyn PaymentStore> {
        &self.store
    }

    pub fn resolver(&self) -> &AccountResolver {
        &self.resolver
    }

    /// Bound a storage call. On timeout the future is dropped; an open database
    /// transaction inside it rolls back.
    pub(crate) async fn guarded<T, F>(&self, op: &'static str, fut: F) -> Result<T, PaymentError>
    where
        F: Future<Output = Result<T, PaymentError>>,
    {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(res) => res,
            Err(elapsed) => {
                error!(
                    op,
                    timeout_ms = self.storage_timeout.as_millis() as u64,
                    "Storage call timed out"
                );
                Err(elapsed.into())
            }
        }
    }

    // ========================================================================
    // CheckPerformTransaction
    // ========================================================================

    /// Read-only precondition check. Success means `allow = true`.
    pub async fn check_perform(
        &self,
        amount: i64,
        account_id: &str,
    ) -> Result<AccountContext, PaymentError> {
        if amount < 1 {
            debug!(amount, account_id, "Rejected non-positive amount");
            return Err(PaymentError::InvalidAmount);
        }
        self.guarded("resolve_account", self.resolver.resolve(account_id))
            .await
    }

    // ========================================================================
    // CreateTransaction
    // ========================================================================

    pub async fn create(
        &self,
        payme_tx_id: &str,
        amount: i64,
        account_id: &str,
        time: i64,
    ) -> Result<CreatedTransaction, PaymentError> {
        if let Some(existing) = self
            .guarded("get_transaction", self.store.get_transaction(payme_tx_id))
            .await?
        {
            return self.replay_create(existing).await;
        }

        let account = self.check_perform(amount, account_id).await?;
        let Some(receiver) = account.receiver(amount) else {
            warn!(
                account_id,
                branch_id = %account.branch.id,
                "Branch has no merchant id, refusing to create transaction"
            );
            return Err(PaymentError::AccountNotFound);
        };

        let new_tx = NewTransaction {
            payme_tx_id: payme_tx_id.to_string(),
            student_id: account.student.id,
            amount,
            create_time: time,
        };

        match self
            .guarded("insert_pending", self.store.insert_pending(&new_tx))
            .await?
        {
            InsertOutcome::Created(tx) => {
                info!(
                    payme_tx_id,
                    transaction = tx.id,
                    student_id = %tx.student_id,
                    amount,
                    state = %tx.state,
                    "Transaction created"
                );
                Ok(CreatedTransaction {
                    transaction: tx,
                    receivers: vec![receiver],
                })
            }
            // A concurrent Create with the same id won the insert
            InsertOutcome::Existing(tx) => self.replay_create(tx).await,
        }
    }

    async fn replay_create(
        &self,
        existing: PaymentTransaction,
    ) -> Result<CreatedTransaction, PaymentError> {
        if !existing.is_pending() {
            debug!(
                payme_tx_id = %existing.payme_tx_id,
                state = %existing.state,
                "Create on a finished transaction"
            );
            return Err(PaymentError::CouldNotPerform);
        }

        let owner = self
            .guarded("find_student", self.resolver.owner_of(existing.student_id))
            .await?;
        let receivers = owner
            .and_then(|o| o.receiver(existing.amount))
            .into_iter()
            .collect();

        debug!(payme_tx_id = %existing.payme_tx_id, "Create replayed");
        Ok(CreatedTransaction {
            transaction: existing,
            receivers,
        })
    }

    // ========================================================================
    // PerformTransaction
    // ========================================================================

    pub async fn perform(&self, payme_tx_id: &str) -> Result<PaymentTransaction, PaymentError> {
        let current = self.load(payme_tx_id).await?;
        if let Some(replayed) = Self::perform_replay(current.clone())? {
            return Ok(replayed);
        }

        let owner = self
            .guarded("find_student", self.resolver.owner_of(current.student_id))
            .await?;
        let Some(owner) = owner.filter(|o| o.student.active) else {
            info!(
                payme_tx_id,
                student_id = %current.student_id,
                "Owner missing or inactive, refusing to perform"
            );
            return Err(PaymentError::CouldNotPerform);
        };

        let paid_at = Utc::now();
        let perform_time = paid_at.timestamp_millis();
        let credit = LedgerCredit {
            student_id: current.student_id,
            transaction_id: current.id,
            amount: current.amount,
            discount_applied: owner.discount_amount(),
            paid_at,
            month: ledger::accounting_month(paid_at, self.ledger_offset),
        };

        let outcome = self
            .guarded(
                "perform_if_pending",
                self.store
                    .perform_if_pending(payme_tx_id, perform_time, &credit),
            )
            .await?;

        match outcome {
            SettleOutcome::Settled(tx) => {
                info!(
                    payme_tx_id,
                    transaction = tx.id,
                    student_id = %tx.student_id,
                    amount = tx.amount,
                    state = %tx.state,
                    "Transaction performed"
                );
                self.schedule_notification(&owner, &tx);
                Ok(tx)
            }
            SettleOutcome::OwnerUnavailable => {
                info!(payme_tx_id, "Owner became unavailable during settlement");
                Err(PaymentError::CouldNotPerform)
            }
            SettleOutcome::NotPending => {
                // Someone else moved the row first
                let latest = self.load(payme_tx_id).await?;
                match Self::perform_replay(latest)? {
                    Some(tx) => Ok(tx),
                    None => Err(PaymentError::Internal(format!(
                        "transaction {} still pending after lost CAS",
                        payme_tx_id
                    ))),
                }
            }
        }
    }

    /// `Some` when a non-pending row answers Perform by itself
    fn perform_replay(
        tx: PaymentTransaction,
    ) -> Result<Option<PaymentTransaction>, PaymentError> {
        if tx.state.can_transition_to(TransactionState::Performed) {
            return Ok(None);
        }
        if tx.state == TransactionState::Performed {
            debug!(payme_tx_id = %tx.payme_tx_id, "Perform replayed");
            return Ok(Some(tx));
        }
        Err(PaymentError::CouldNotPerform)
    }

    fn schedule_notification(&self, owner: &AccountContext, tx: &PaymentTransaction) {
        let Some(sender) = &self.notifier else {
            return;
        };
        let student = &owner.student;
        let notification = PaymentNotification {
            student_name: student.full_name.clone().unwrap_or_default(),
            branch_name: owner.branch.name.clone(),
            group_name: student.group_name.clone().unwrap_or_default(),
            account_id: student.account_id.clone().unwrap_or_default(),
            contract_number: student.contract_number.clone().unwrap_or_default(),
            amount: tx.amount,
            payment_time: ledger::format_payment_time(tx.perform_time, self.ledger_offset),
            topic_id: owner.branch.topic_id,
        };
        sender.try_notify(notification);
    }

    // ========================================================================
    // CancelTransaction
    // ========================================================================

    pub async fn cancel(
        &self,
        payme_tx_id: &str,
        reason: Option<i32>,
    ) -> Result<PaymentTransaction, PaymentError> {
        let Some(reason) = reason else {
            return Err(PaymentError::InvalidParams("reason is required".to_string()));
        };

        let current = self.load(payme_tx_id).await?;
        if let Some(replayed) = Self::cancel_replay(current)? {
            return Ok(replayed);
        }

        let cancel_time = Utc::now().timestamp_millis();
        let cancelled = self
            .guarded(
                "cancel_if_pending",
                self.store
                    .cancel_if_pending(payme_tx_id, cancel_time, reason),
            )
            .await?;

        match cancelled {
            Some(tx) => {
                info!(
                    payme_tx_id,
                    transaction = tx.id,
                    student_id = %tx.student_id,
                    amount = tx.amount,
                    reason,
                    state = %tx.state,
                    "Transaction cancelled"
                );
                Ok(tx)
            }
            None => {
                let latest = self.load(payme_tx_id).await?;
                match Self::cancel_replay(latest)? {
                    Some(tx) => Ok(tx),
                    None => Err(PaymentError::Internal(format!(
                        "transaction {} still pending after lost CAS",
                        payme_tx_id
                    ))),
                }
            }
        }
    }

    fn cancel_replay(tx: PaymentTransaction) -> Result<Option<PaymentTransaction>, PaymentError> {
        if tx.state.can_transition_to(TransactionState::Cancelled) {
            return Ok(None);
        }
        if tx.state == TransactionState::Cancelled {
            debug!(payme_tx_id = %tx.payme_tx_id, "Cancel replayed");
            return Ok(Some(tx));
        }
        Err(PaymentError::CouldNotCancel)
    }

    // ========================================================================
    // CheckTransaction
    // ========================================================================

    pub async fn check(&self, payme_tx_id: &str) -> Result<PaymentTransaction, PaymentError> {
        self.load(payme_tx_id).await
    }

    async fn load(&self, payme_tx_id: &str) -> Result<PaymentTransaction, PaymentError> {
        self.guarded("get_transaction", self.store.get_transaction(payme_tx_id))
            .await?
            .ok_or(PaymentError::TransactionNotFound)
    }
}
