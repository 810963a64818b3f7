use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::transaction::{TransactionStatus, TransactionType};

pub type Result<T> = std::result::Result<T, AtmError>;

/// Unified error taxonomy for the ATM core.
///
/// Business-rule failures (`InsufficientFunds`, `DailyLimitExceeded`,
/// `NotPending`, `WrongType`) are also recorded in the transaction journal
/// before they surface, so the audit trail and the caller agree on the
/// outcome. `VersionConflict` is transient and absorbed by the coordinator's
/// retry loop; callers only ever see `RetriesExhausted`.
#[derive(Error, Debug)]
pub enum AtmError {
    #[error("account not found: {0}")]
    AccountNotFound(u64),

    #[error("account {0} is not active")]
    AccountInactive(u64),

    #[error("transaction not found: {0}")]
    TransactionNotFound(u64),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid card number or PIN")]
    InvalidCredentials,

    #[error("card number already registered")]
    DuplicateCard,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient funds, available balance: {available:.2}")]
    InsufficientFunds { available: Decimal },

    #[error("daily withdrawal limit exceeded, remaining limit: {remaining:.2}")]
    DailyLimitExceeded { remaining: Decimal },

    #[error("transaction {id} is not in PENDING status (current: {status})")]
    NotPending { id: u64, status: TransactionStatus },

    #[error("transaction {id} is not a {expected} (current type: {actual})")]
    WrongType {
        id: u64,
        expected: TransactionType,
        actual: TransactionType,
    },

    #[error("version conflict on account {0}")]
    VersionConflict(u64),

    #[error("operation aborted after {attempts} conflicting attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtmError {
    /// Conflicts are the only errors worth retrying within a call; everything
    /// else is either permanent or must be re-decided by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, AtmError::VersionConflict(_))
    }
}
