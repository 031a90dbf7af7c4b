//! PostgreSQL schema for the tuition ledger.
//!
//! `transactions.payme_tx_id` is the provider's idempotency key. `payments` is the
//! append-only ledger; `transaction_id` is unique so a transaction can never be
//! credited twice even if the FSM guard were bypassed.

use sqlx::PgPool;

pub const CREATE_BRANCHES: &str = r#"
CREATE TABLE IF NOT EXISTS branches (
    id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name            TEXT NOT NULL,
    monthly_fee     BIGINT NOT NULL CHECK (monthly_fee >= 0),
    mfo_code        TEXT NOT NULL,
    account_number  TEXT NOT NULL,
    merchant_id     TEXT,
    topic_id        BIGINT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_STUDENTS: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    account_id        TEXT UNIQUE,
    branch_id         UUID NOT NULL REFERENCES branches(id),
    parent_name       TEXT NOT NULL DEFAULT '',
    discount_percent  NUMERIC(5, 2) NOT NULL DEFAULT 0
                      CHECK (discount_percent >= 0 AND discount_percent <= 100),
    balance           BIGINT NOT NULL DEFAULT 0,
    full_name         TEXT,
    group_name        TEXT,
    phone             TEXT,
    contract_number   TEXT,
    status            BOOLEAN NOT NULL DEFAULT TRUE,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id            BIGSERIAL PRIMARY KEY,
    payme_tx_id   TEXT NOT NULL UNIQUE,
    student_id    UUID NOT NULL REFERENCES students(id),
    amount        BIGINT NOT NULL CHECK (amount > 0),
    create_time   BIGINT NOT NULL,
    perform_time  BIGINT NOT NULL DEFAULT 0,
    cancel_time   BIGINT NOT NULL DEFAULT 0,
    state         SMALLINT NOT NULL,
    reason        INTEGER,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS_TIME_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_create_time ON transactions (create_time)";

pub const CREATE_PAYMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id        UUID NOT NULL REFERENCES students(id),
    transaction_id    BIGINT NOT NULL UNIQUE REFERENCES transactions(id),
    month             DATE NOT NULL,
    amount_paid       BIGINT NOT NULL,
    discount_applied  BIGINT NOT NULL DEFAULT 0,
    paid_at           TIMESTAMPTZ NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Create all tables (idempotent)
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for ddl in [
        CREATE_BRANCHES,
        CREATE_STUDENTS,
        CREATE_TRANSACTIONS,
        CREATE_TRANSACTIONS_TIME_IDX,
        CREATE_PAYMENTS,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!("Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_keys_are_unique() {
        assert!(CREATE_TRANSACTIONS.contains("payme_tx_id   TEXT NOT NULL UNIQUE"));
        assert!(CREATE_PAYMENTS.contains("transaction_id    BIGINT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_ddl_is_rerunnable() {
        for ddl in [
            CREATE_BRANCHES,
            CREATE_STUDENTS,
            CREATE_TRANSACTIONS,
            CREATE_TRANSACTIONS_TIME_IDX,
            CREATE_PAYMENTS,
        ] {
            assert!(ddl.contains("IF NOT EXISTS"));
        }
    }
}
