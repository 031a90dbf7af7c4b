//! Method result payloads

use serde::Serialize;

use crate::payment::{
    AccountContext, CreatedTransaction, PaymentTransaction, Receiver, StatementLine,
};

/// Display info the provider shows the payer before confirming
#[derive(Debug, Clone, Serialize)]
pub struct AdditionalInfo {
    pub full_name: Option<String>,
    pub parent_name: String,
    pub branch_name: String,
    pub group_name: Option<String>,
    pub group_number: String,
    pub amount_to_pay: i64,
    pub mfo_code: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckPerformResult {
    pub allow: bool,
    pub additional: AdditionalInfo,
}

impl From<&AccountContext> for CheckPerformResult {
    fn from(ctx: &AccountContext) -> Self {
        Self {
            allow: true,
            additional: AdditionalInfo {
                full_name: ctx.student.full_name.clone(),
                parent_name: ctx.student.parent_name.clone(),
                branch_name: ctx.branch.name.clone(),
                group_name: ctx.student.group_name.clone(),
                group_number: ctx.group_number(),
                amount_to_pay: ctx.payable_amount(),
                mfo_code: ctx.branch.mfo_code.clone(),
                account_number: ctx.branch.account_number.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateResult {
    pub create_time: i64,
    pub transaction: String,
    pub state: i16,
    pub receivers: Vec<Receiver>,
}

impl From<&CreatedTransaction> for CreateResult {
    fn from(created: &CreatedTransaction) -> Self {
        Self {
            create_time: created.transaction.create_time,
            transaction: created.transaction.transaction_ref(),
            state: created.transaction.state.id(),
            receivers: created.receivers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformResult {
    pub transaction: String,
    pub perform_time: i64,
    pub state: i16,
}

impl From<&PaymentTransaction> for PerformResult {
    fn from(tx: &PaymentTransaction) -> Self {
        Self {
            transaction: tx.transaction_ref(),
            perform_time: tx.perform_time,
            state: tx.state.id(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResult {
    pub transaction: String,
    pub cancel_time: i64,
    pub state: i16,
}

impl From<&PaymentTransaction> for CancelResult {
    fn from(tx: &PaymentTransaction) -> Self {
        Self {
            transaction: tx.transaction_ref(),
            cancel_time: tx.cancel_time,
            state: tx.state.id(),
        }
    }
}

/// `reason` is serialized as `null` until the transaction is cancelled
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub create_time: i64,
    pub perform_time: i64,
    pub cancel_time: i64,
    pub transaction: String,
    pub state: i16,
    pub reason: Option<i32>,
}

impl From<&PaymentTransaction> for CheckResult {
    fn from(tx: &PaymentTransaction) -> Self {
        Self {
            create_time: tx.create_time,
            perform_time: tx.perform_time,
            cancel_time: tx.cancel_time,
            transaction: tx.transaction_ref(),
            state: tx.state.id(),
            reason: tx.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementTransaction {
    pub id: String,
    pub time: i64,
    pub amount: i64,
    pub account: AccountRef,
    pub create_time: i64,
    pub perform_time: i64,
    pub cancel_time: i64,
    pub transaction: String,
    pub state: i16,
    pub reason: Option<i32>,
    pub receivers: Vec<Receiver>,
}

impl From<StatementLine> for StatementTransaction {
    fn from(line: StatementLine) -> Self {
        let tx = line.transaction;
        Self {
            transaction: tx.transaction_ref(),
            state: tx.state.id(),
            id: tx.payme_tx_id,
            time: tx.create_time,
            amount: tx.amount,
            account: AccountRef {
                id: line.account_id,
            },
            create_time: tx.create_time,
            perform_time: tx.perform_time,
            cancel_time: tx.cancel_time,
            reason: tx.reason,
            receivers: line.receivers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementResult {
    pub transactions: Vec<StatementTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordResult {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::TransactionState;
    use uuid::Uuid;

    fn tx(state: TransactionState) -> PaymentTransaction {
        PaymentTransaction {
            id: 42,
            payme_tx_id: "p-1".into(),
            student_id: Uuid::new_v4(),
            amount: 1500,
            state,
            create_time: 100,
            perform_time: 0,
            cancel_time: 0,
            reason: None,
        }
    }

    #[test]
    fn test_check_result_reason_is_null() {
        let v = serde_json::to_value(CheckResult::from(&tx(TransactionState::Pending))).unwrap();
        assert_eq!(v["transaction"], "42");
        assert_eq!(v["state"], 1);
        assert!(v["reason"].is_null());
        assert!(v.as_object().unwrap().contains_key("reason"));
    }

    #[test]
    fn test_statement_transaction_shape() {
        let line = StatementLine {
            transaction: tx(TransactionState::Cancelled),
            account_id: "A1".into(),
            receivers: vec![Receiver {
                id: "m".into(),
                amount: 1500,
            }],
        };
        let v = serde_json::to_value(StatementTransaction::from(line)).unwrap();
        assert_eq!(v["id"], "p-1");
        assert_eq!(v["time"], 100);
        assert_eq!(v["account"]["id"], "A1");
        assert_eq!(v["state"], -1);
        assert_eq!(v["receivers"][0]["amount"], 1500);
    }
}
