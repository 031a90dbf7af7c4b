//! Payment transaction FSM states
//!
//! State IDs are the values transmitted to the provider and stored as SMALLINT.

use std::fmt;

/// Payment transaction states
///
/// ```text
/// PENDING (1) ──perform──▶ PERFORMED (2)
///     │
///     └──────cancel─────▶ CANCELLED (-1)
/// ```
///
/// PERFORMED → CANCELLED does not exist: settled money is never reversed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransactionState {
    /// Created, waiting for the provider to settle or abort
    Pending = 1,

    /// Terminal: balance credited, ledger entry written
    Performed = 2,

    /// Terminal: aborted before settlement, no balance effect
    Cancelled = -1,
}

impl TransactionState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionState::Pending)
    }

    /// Whether the FSM allows `self → next`
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        matches!(
            (self, next),
            (TransactionState::Pending, TransactionState::Performed)
                | (TransactionState::Pending, TransactionState::Cancelled)
        )
    }

    /// Get the numeric state ID (wire and storage value)
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from wire/storage state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionState::Pending),
            2 => Some(TransactionState::Performed),
            -1 => Some(TransactionState::Cancelled),
            _ => None,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Pending => "PENDING",
            TransactionState::Performed => "PERFORMED",
            TransactionState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
