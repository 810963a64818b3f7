use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;
use crate::error::{AtmError, Result};

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Withdrawal,
    Deposit,
    /// Part of the journal schema; inquiries are read-only and never write
    /// an entry themselves.
    BalanceInquiry,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::BalanceInquiry => "BALANCE_INQUIRY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Declined,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Declined => "DECLINED",
        };
        f.write_str(s)
    }
}

/// Terminal outcome supplied when completing a PENDING transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    Declined,
}

impl Outcome {
    pub fn status(self) -> TransactionStatus {
        match self {
            Outcome::Success => TransactionStatus::Success,
            Outcome::Failed => TransactionStatus::Failed,
            Outcome::Declined => TransactionStatus::Declined,
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Outcome::Success),
            "FAILED" => Ok(Outcome::Failed),
            "DECLINED" => Ok(Outcome::Declined),
            other => Err(AtmError::Validation(format!("invalid outcome: {other}"))),
        }
    }
}

/// A journal entry. Created PENDING during initiation, transitioned exactly
/// once to a terminal status during completion, immutable after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub amount: Decimal,
    /// Settled-balance snapshot: projected at initiation, actual at
    /// settlement.
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Guards the entry's type and PENDING status before settlement. The
    /// terminal states are final: re-settling an already completed entry is
    /// an illegal-state error, never a silent repeat.
    pub fn ensure_settleable(&self, expected: TransactionType) -> Result<()> {
        if self.kind != expected {
            return Err(AtmError::WrongType {
                id: self.id,
                expected,
                actual: self.kind,
            });
        }
        if !self.is_pending() {
            return Err(AtmError::NotPending {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Transitions the entry to its terminal state, recording the settled
    /// balance snapshot and an audit description.
    pub fn settle(
        &mut self,
        outcome: Outcome,
        balance_after: Decimal,
        description: impl Into<String>,
    ) {
        self.status = outcome.status();
        self.balance_after = balance_after;
        self.description = description.into();
    }
}

/// Journal entry input; the journal assigns the id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: TransactionStatus,
}
