//! Payment Database Layer
//!
//! PostgreSQL-based persistence for the payment FSM.
//! All state updates are atomic CAS operations on `state = PENDING`.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::error::PaymentError;
use super::ledger::{self, LedgerCredit, LedgerEntry, LedgerOutcome};
use super::state::TransactionState;
use super::store::{InsertOutcome, PaymentStore, SettleOutcome};
use super::types::{AccountContext, Branch, NewTransaction, PaymentTransaction, Student};

const TRANSACTION_COLUMNS: &str = "id, payme_tx_id, student_id, amount, state, create_time, \
                                   perform_time, cancel_time, reason";

const ACCOUNT_SELECT: &str = r#"
    SELECT s.id AS student_id, s.account_id, s.branch_id, s.full_name, s.parent_name,
           s.group_name, s.contract_number, s.discount_percent, s.balance, s.status,
           b.name AS branch_name, b.monthly_fee, b.mfo_code, b.account_number,
           b.merchant_id, b.topic_id
    FROM students s
    JOIN branches b ON b.id = s.branch_id
"#;

/// PostgreSQL payment store
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_account(
        &self,
        filter: &str,
        bind: AccountKey<'_>,
    ) -> Result<Option<AccountContext>, PaymentError> {
        let sql = format!("{ACCOUNT_SELECT} WHERE {filter}");
        let query = sqlx::query(&sql);
        let query = match bind {
            AccountKey::External(account_id) => query.bind(account_id),
            AccountKey::Student(student_id) => query.bind(student_id),
        };
        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_account).transpose()
    }
}

enum AccountKey<'a> {
    External(&'a str),
    Student(Uuid),
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn find_account(
        &self,
        account_id: &str,
    ) -> Result<Option<AccountContext>, PaymentError> {
        self.fetch_account("s.account_id = $1", AccountKey::External(account_id))
            .await
    }

    async fn find_student(&self, student_id: Uuid) -> Result<Option<AccountContext>, PaymentError> {
        self.fetch_account("s.id = $1", AccountKey::Student(student_id))
            .await
    }

    async fn get_transaction(
        &self,
        payme_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE payme_tx_id = $1");
        let row = sqlx::query(&sql)
            .bind(payme_tx_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    /// Idempotent insert: the unique key on `payme_tx_id` decides the winner of a race
    async fn insert_pending(&self, tx: &NewTransaction) -> Result<InsertOutcome, PaymentError> {
        let sql = format!(
            r#"
            INSERT INTO transactions (payme_tx_id, student_id, amount, state, create_time)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (payme_tx_id) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let inserted = sqlx::query(&sql)
            .bind(&tx.payme_tx_id)
            .bind(tx.student_id)
            .bind(tx.amount)
            .bind(TransactionState::Pending.id())
            .bind(tx.create_time)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Created(row_to_transaction(&row)?));
        }

        // Lost the race (or a plain replay): report whatever is stored now
        match self.get_transaction(&tx.payme_tx_id).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(PaymentError::Internal(format!(
                "transaction {} vanished after insert conflict",
                tx.payme_tx_id
            ))),
        }
    }

    /// State flip and ledger credit share one database transaction.
    ///
    /// The CAS `UPDATE ... WHERE state = PENDING` takes the row lock; a concurrent
    /// caller blocks on it and, once we commit, re-evaluates the predicate and
    /// matches zero rows.
    async fn perform_if_pending(
        &self,
        payme_tx_id: &str,
        perform_time: i64,
        credit: &LedgerCredit,
    ) -> Result<SettleOutcome, PaymentError> {
        let mut db_tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE transactions
            SET state = $1, perform_time = $2, updated_at = NOW()
            WHERE payme_tx_id = $3 AND state = $4
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(TransactionState::Performed.id())
            .bind(perform_time)
            .bind(payme_tx_id)
            .bind(TransactionState::Pending.id())
            .fetch_optional(&mut *db_tx)
            .await?;

        let Some(row) = row else {
            db_tx.rollback().await?;
            return Ok(SettleOutcome::NotPending);
        };
        let settled = row_to_transaction(&row)?;

        if settled.id != credit.transaction_id
            || settled.amount != credit.amount
            || settled.student_id != credit.student_id
        {
            db_tx.rollback().await?;
            return Err(PaymentError::Internal(format!(
                "ledger credit does not match transaction {}",
                payme_tx_id
            )));
        }

        match ledger::apply_credit(&mut *db_tx, credit).await? {
            LedgerOutcome::Applied => {}
            LedgerOutcome::OwnerUnavailable => {
                db_tx.rollback().await?;
                return Ok(SettleOutcome::OwnerUnavailable);
            }
        }

        db_tx.commit().await?;
        Ok(SettleOutcome::Settled(settled))
    }

    async fn cancel_if_pending(
        &self,
        payme_tx_id: &str,
        cancel_time: i64,
        reason: i32,
    ) -> Result<Option<PaymentTransaction>, PaymentError> {
        let sql = format!(
            r#"
            UPDATE transactions
            SET state = $1, cancel_time = $2, reason = $3, updated_at = NOW()
            WHERE payme_tx_id = $4 AND state = $5
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(TransactionState::Cancelled.id())
            .bind(cancel_time)
            .bind(reason)
            .bind(payme_tx_id)
            .bind(TransactionState::Pending.id())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn transactions_between(
        &self,
        from: i64,
        to: i64,
    ) -> Result<Vec<PaymentTransaction>, PaymentError> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE create_time >= $1 AND create_time <= $2
            ORDER BY create_time ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(row_to_transaction(&row)?);
        }
        Ok(records)
    }

    async fn ledger_entries(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>, PaymentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::entries_for_student(&mut *conn, student_id).await?)
    }
}

/// Convert database row to PaymentTransaction
fn row_to_transaction(row: &PgRow) -> Result<PaymentTransaction, PaymentError> {
    let state_id: i16 = row.try_get("state")?;
    let state = TransactionState::from_id(state_id)
        .ok_or_else(|| PaymentError::Internal(format!("Invalid state ID: {}", state_id)))?;

    Ok(PaymentTransaction {
        id: row.try_get("id")?,
        payme_tx_id: row.try_get("payme_tx_id")?,
        student_id: row.try_get("student_id")?,
        amount: row.try_get("amount")?,
        state,
        create_time: row.try_get("create_time")?,
        perform_time: row.try_get("perform_time")?,
        cancel_time: row.try_get("cancel_time")?,
        reason: row.try_get("reason")?,
    })
}

fn row_to_account(row: &PgRow) -> Result<AccountContext, PaymentError> {
    let branch = Branch {
        id: row.try_get("branch_id")?,
        name: row.try_get("branch_name")?,
        monthly_fee: row.try_get("monthly_fee")?,
        mfo_code: row.try_get("mfo_code")?,
        account_number: row.try_get("account_number")?,
        merchant_id: row.try_get("merchant_id")?,
        topic_id: row.try_get("topic_id")?,
    };
    let student = Student {
        id: row.try_get("student_id")?,
        account_id: row.try_get("account_id")?,
        branch_id: branch.id,
        full_name: row.try_get("full_name")?,
        parent_name: row.try_get("parent_name")?,
        group_name: row.try_get("group_name")?,
        contract_number: row.try_get("contract_number")?,
        discount_percent: row.try_get("discount_percent")?,
        balance: row.try_get("balance")?,
        active: row.try_get("status")?,
    };
    Ok(AccountContext { student, branch })
}
