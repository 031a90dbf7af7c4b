//! Payment Core Types
//!
//! Billable entities (student + branch) and the provider transaction snapshot.
//! All amounts are minor currency units (tiyin), all times epoch milliseconds.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::state::TransactionState;

/// Placeholder the provider UI shows when a student has no group assigned.
pub const UNKNOWN_GROUP: &str = "Noma'lum";

/// Branch pricing and settlement details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    /// Monthly tuition fee (minor units)
    pub monthly_fee: i64,
    /// Receiver bank routing code (MFO)
    pub mfo_code: String,
    pub account_number: String,
    /// Provider-side merchant id; a branch without one cannot receive payments
    pub merchant_id: Option<String>,
    /// Chat topic used by the notification sink
    pub topic_id: Option<i64>,
}

/// Student ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: Uuid,
    /// External account identifier typed by the payer
    pub account_id: Option<String>,
    pub branch_id: Uuid,
    pub full_name: Option<String>,
    pub parent_name: String,
    pub group_name: Option<String>,
    pub contract_number: Option<String>,
    /// 0..=100
    pub discount_percent: Decimal,
    /// Credited only by the ledger mutator
    pub balance: i64,
    pub active: bool,
}

/// A resolved account: the student together with its pricing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub student: Student,
    pub branch: Branch,
}

impl AccountContext {
    /// Amount the student owes for one month after discount
    pub fn payable_amount(&self) -> i64 {
        payable_amount(self.branch.monthly_fee, self.student.discount_percent)
    }

    /// Discount in minor units (fee minus payable)
    pub fn discount_amount(&self) -> i64 {
        self.branch.monthly_fee - self.payable_amount()
    }

    pub fn group_number(&self) -> String {
        group_number(self.student.group_name.as_deref())
    }

    /// Receiver entry for this account, if the branch has a merchant id
    pub fn receiver(&self, amount: i64) -> Option<Receiver> {
        self.branch.merchant_id.as_ref().map(|id| Receiver {
            id: id.clone(),
            amount,
        })
    }
}

/// `monthly_fee − round(monthly_fee × discount / 100)`, rounding half away from zero.
pub fn payable_amount(monthly_fee: i64, discount_percent: Decimal) -> i64 {
    if discount_percent <= Decimal::ZERO {
        return monthly_fee;
    }
    let discount = (Decimal::from(monthly_fee) * discount_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(monthly_fee);
    monthly_fee - discount.min(monthly_fee)
}

/// First token of `[0-9A-Za-z_-]` in the group name, e.g. "G-12 (evening)" → "G-12".
pub fn group_number(group_name: Option<&str>) -> String {
    let token: String = group_name
        .unwrap_or_default()
        .chars()
        .skip_while(|c| !is_group_char(*c))
        .take_while(|c| is_group_char(*c))
        .collect();
    if token.is_empty() {
        UNKNOWN_GROUP.to_string()
    } else {
        token
    }
}

fn is_group_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Settlement target returned to the provider
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Receiver {
    pub id: String,
    pub amount: i64,
}

/// Stored provider transaction
///
/// Invariants: `perform_time != 0` iff `state == Performed`;
/// `cancel_time != 0` and `reason.is_some()` iff `state == Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Internal sequence id (reported as `transaction`)
    pub id: i64,
    /// Provider transaction id (idempotency key)
    pub payme_tx_id: String,
    pub student_id: Uuid,
    pub amount: i64,
    pub state: TransactionState,
    pub create_time: i64,
    pub perform_time: i64,
    pub cancel_time: i64,
    pub reason: Option<i32>,
}

impl PaymentTransaction {
    /// Internal id as the decimal string the protocol expects
    pub fn transaction_ref(&self) -> String {
        self.id.to_string()
    }

    pub fn is_pending(&self) -> bool {
        !self.state.is_terminal()
    }
}

/// Insert payload for a new Pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub payme_tx_id: String,
    pub student_id: Uuid,
    pub amount: i64,
    pub create_time: i64,
}
