use std::sync::Arc;

use crate::auth::CredentialStore;
use crate::db::Database;
use crate::payment::{StatementBuilder, TransactionStateMachine};

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Transaction FSM
    pub machine: Arc<TransactionStateMachine>,
    /// GetStatement projection
    pub statements: StatementBuilder,
    /// Merchant Basic-Auth credentials
    pub credentials: Arc<CredentialStore>,
    /// PostgreSQL (None when running on the in-memory store)
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        machine: Arc<TransactionStateMachine>,
        credentials: Arc<CredentialStore>,
        db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            statements: StatementBuilder::new(machine.clone()),
            machine,
            credentials,
            db,
        }
    }
}
