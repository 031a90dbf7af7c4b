//! Ledger Mutator
//!
//! Credits a student balance and appends the matching `payments` row. Always runs
//! inside the same database transaction as the PENDING → PERFORMED CAS; it does not
//! guard against double application by itself.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

/// Credit to apply for one settled transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCredit {
    pub student_id: Uuid,
    /// Internal id of the settling transaction
    pub transaction_id: i64,
    /// Balance delta (minor units)
    pub amount: i64,
    /// Fee minus payable at settlement time, informational
    pub discount_applied: i64,
    pub paid_at: DateTime<Utc>,
    /// First day of the accounting month
    pub month: NaiveDate,
}

/// Append-only payment history row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub student_id: Uuid,
    pub transaction_id: i64,
    pub month: NaiveDate,
    pub amount_paid: i64,
    pub discount_applied: i64,
    pub paid_at: DateTime<Utc>,
}

impl From<&LedgerCredit> for LedgerEntry {
    fn from(credit: &LedgerCredit) -> Self {
        Self {
            student_id: credit.student_id,
            transaction_id: credit.transaction_id,
            month: credit.month,
            amount_paid: credit.amount,
            discount_applied: credit.discount_applied,
            paid_at: credit.paid_at,
        }
    }
}

/// Result of applying a credit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Applied,
    /// Student vanished or was deactivated between the read and the lock
    OwnerUnavailable,
}

/// Fixed offset used for accounting months; falls back to UTC on an invalid value.
pub fn ledger_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Accounting month (first day) that a payment made at `paid_at` belongs to
pub fn accounting_month(paid_at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let local = paid_at.with_timezone(&offset);
    NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or_else(|| local.date_naive())
}

/// "2024-03-01 17:04:05" in the ledger offset, as shown to staff
pub fn format_payment_time(epoch_ms: i64, offset: FixedOffset) -> String {
    match offset.timestamp_millis_opt(epoch_ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => epoch_ms.to_string(),
    }
}

/// Apply a credit on the caller's open database transaction
pub async fn apply_credit(
    conn: &mut PgConnection,
    credit: &LedgerCredit,
) -> Result<LedgerOutcome, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE students
        SET balance = balance + $1, updated_at = NOW()
        WHERE id = $2 AND status = TRUE
        RETURNING balance
        "#,
    )
    .bind(credit.amount)
    .bind(credit.student_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = updated else {
        return Ok(LedgerOutcome::OwnerUnavailable);
    };
    let new_balance: i64 = row.get("balance");

    sqlx::query(
        r#"
        INSERT INTO payments (student_id, transaction_id, month, amount_paid, discount_applied, paid_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(credit.student_id)
    .bind(credit.transaction_id)
    .bind(credit.month)
    .bind(credit.amount)
    .bind(credit.discount_applied)
    .bind(credit.paid_at)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        student_id = %credit.student_id,
        transaction_id = credit.transaction_id,
        amount = credit.amount,
        new_balance,
        "Ledger credit applied"
    );

    Ok(LedgerOutcome::Applied)
}

/// Ledger history of one student, oldest first
pub async fn entries_for_student(
    conn: &mut PgConnection,
    student_id: Uuid,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT student_id, transaction_id, month, amount_paid, discount_applied, paid_at
        FROM payments
        WHERE student_id = $1
        ORDER BY paid_at ASC, transaction_id ASC
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|r| LedgerEntry {
            student_id: r.get("student_id"),
            transaction_id: r.get("transaction_id"),
            month: r.get("month"),
            amount_paid: r.get("amount_paid"),
            discount_applied: r.get("discount_applied"),
            paid_at: r.get("paid_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting_month_uses_local_offset() {
        let tashkent = ledger_offset(300);
        // 2024-02-29 20:30 UTC is already 2024-03-01 01:30 in Tashkent
        let paid_at = Utc.with_ymd_and_hms(2024, 2, 29, 20, 30, 0).unwrap();
        assert_eq!(
            accounting_month(paid_at, tashkent),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            accounting_month(paid_at, ledger_offset(0)),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        assert_eq!(ledger_offset(100_000).local_minus_utc(), 0);
    }

    #[test]
    fn test_format_payment_time() {
        let ms = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 4, 5)
            .unwrap()
            .timestamp_millis();
        assert_eq!(
            format_payment_time(ms, ledger_offset(300)),
            "2024-03-01 17:04:05"
        );
    }

    #[test]
    fn test_entry_from_credit() {
        let credit = LedgerCredit {
            student_id: Uuid::new_v4(),
            transaction_id: 7,
            amount: 50_000,
            discount_applied: 5_000,
            paid_at: Utc::now(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let entry = LedgerEntry::from(&credit);
        assert_eq!(entry.amount_paid, 50_000);
        assert_eq!(entry.transaction_id, 7);
        assert_eq!(entry.month, credit.month);
    }
}
