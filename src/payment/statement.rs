//! Statement Builder
//!
//! Read-only projection of transactions created in a time window, for provider
//! reconciliation. A transaction whose owner or merchant can no longer be resolved is
//! left out and logged; it never fails the whole report.

use std::sync::Arc;

use super::error::PaymentError;
use super::machine::TransactionStateMachine;
use super::types::{PaymentTransaction, Receiver};

/// One reconciled statement row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLine {
    pub transaction: PaymentTransaction,
    pub account_id: String,
    pub receivers: Vec<Receiver>,
}

#[derive(Clone)]
pub struct StatementBuilder {
    machine: Arc<TransactionStateMachine>,
}

impl StatementBuilder {
    pub fn new(machine: Arc<TransactionStateMachine>) -> Self {
        Self { machine }
    }

    /// Transactions with `from <= create_time <= to`, oldest first
    pub async fn build(&self, from: i64, to: i64) -> Result<Vec<StatementLine>, PaymentError> {
        if from > to {
            return Ok(Vec::new());
        }

        let machine = &self.machine;
        let transactions = machine
            .guarded(
                "transactions_between",
                machine.store().transactions_between(from, to),
            )
            .await?;

        let mut lines = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let owner = machine
                .guarded("find_student", machine.resolver().owner_of(tx.student_id))
                .await?;
            let Some(owner) = owner else {
                tracing::warn!(
                    payme_tx_id = %tx.payme_tx_id,
                    student_id = %tx.student_id,
                    "Statement: owner not found, skipping transaction"
                );
                continue;
            };
            let Some(receiver) = owner.receiver(tx.amount) else {
                tracing::warn!(
                    payme_tx_id = %tx.payme_tx_id,
                    branch_id = %owner.branch.id,
                    "Statement: branch has no merchant id, skipping transaction"
                );
                continue;
            };
            let account_id = owner.student.account_id.clone().unwrap_or_default();

            lines.push(StatementLine {
                transaction: tx,
                account_id,
                receivers: vec![receiver],
            });
        }

        tracing::debug!(from, to, count = lines.len(), "Statement built");
        Ok(lines)
    }
}
