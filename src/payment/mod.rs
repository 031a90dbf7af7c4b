//! Payme Transaction FSM
//!
//! Merchant-side state machine for provider-initiated tuition payments.
//!
//! # Architecture
//!
//! The provider drives each payment through a fixed set of remote calls. Each call
//! re-reads current storage state and applies at most one transition:
//! - **AccountResolver**: account id → active student + branch
//! - **TransactionStateMachine**: Create / Perform / Cancel / Check
//! - **Ledger**: balance credit + `payments` row, only on PENDING → PERFORMED
//! - **StatementBuilder**: read-only reconciliation window
//!
//! # State Machine
//!
//! ```text
//! (none) ──create──▶ PENDING (1) ──perform──▶ PERFORMED (2)
//!                        │
//!                        └───cancel───▶ CANCELLED (-1)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **CAS Transitions**: a state change only succeeds if the stored row is still PENDING
//! 2. **Credit Once**: balance credit, ledger append and state flip commit together
//! 3. **Replay Safety**: repeating any call returns the stored snapshot, never a new effect
//! 4. **No Reversal**: a PERFORMED transaction cannot be cancelled

pub mod error;
pub mod ledger;
pub mod machine;
pub mod memory_store;
pub mod pg_store;
pub mod resolver;
pub mod state;
pub mod statement;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use error::{LocalizedMessage, PaymentError};
pub use ledger::{LedgerCredit, LedgerEntry};
pub use machine::{CreatedTransaction, TransactionStateMachine};
pub use memory_store::InMemoryPaymentStore;
pub use pg_store::PgPaymentStore;
pub use resolver::AccountResolver;
pub use state::TransactionState;
pub use statement::{StatementBuilder, StatementLine};
pub use store::{InsertOutcome, PaymentStore, SettleOutcome};
pub use types::{AccountContext, Branch, PaymentTransaction, Receiver, Student};
