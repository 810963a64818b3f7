use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AtmError, Result};

pub type AccountId = u64;

/// A positive monetary amount for transactions.
///
/// Wraps `rust_decimal::Decimal` so that zero and negative amounts are
/// rejected at the boundary instead of deep inside the protocol.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(AtmError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AtmError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A card-linked account.
///
/// Carries two balances: `balance` is settled bank-of-record funds,
/// `available_balance` is `balance` minus amounts reserved by in-flight
/// PENDING withdrawals. The invariant `0 <= available_balance <= balance`
/// holds at every commit point.
///
/// `version` is the optimistic-concurrency stamp: every conditional write at
/// the store boundary requires the version observed at read time and bumps
/// it on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub card_number: String,
    pub customer_name: String,
    /// Opaque credential, compared only during authentication.
    pub pin: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub daily_withdrawal_limit: Decimal,
    /// Only meaningful while `last_activity_date` is today; logically zero
    /// otherwise (lazy reset).
    pub daily_withdrawn_amount: Decimal,
    pub last_activity_date: NaiveDate,
    pub active: bool,
    pub version: u64,
}

impl Account {
    /// Lazily resets the daily withdrawal counter on the first touch of a new
    /// calendar day. Returns whether anything changed, so callers can fold
    /// the reset into the same conditional write as the business mutation.
    pub fn roll_daily_window(&mut self, today: NaiveDate) -> bool {
        if self.last_activity_date == today {
            return false;
        }
        self.daily_withdrawn_amount = Decimal::ZERO;
        self.last_activity_date = today;
        true
    }

    pub fn remaining_daily_limit(&self, today: NaiveDate) -> Decimal {
        let withdrawn = if self.last_activity_date == today {
            self.daily_withdrawn_amount
        } else {
            Decimal::ZERO
        };
        self.daily_withdrawal_limit - withdrawn
    }

    /// Earmarks funds for an in-flight withdrawal: validates available
    /// balance and the daily ceiling against current state, then decrements
    /// `available_balance`. The settled `balance` is untouched until the
    /// dispense is confirmed.
    pub fn reserve(&mut self, amount: Amount, today: NaiveDate) -> Result<()> {
        self.roll_daily_window(today);
        if self.available_balance < amount.value() {
            return Err(AtmError::InsufficientFunds {
                available: self.available_balance,
            });
        }
        if self.daily_withdrawn_amount + amount.value() > self.daily_withdrawal_limit {
            return Err(AtmError::DailyLimitExceeded {
                remaining: self.remaining_daily_limit(today),
            });
        }
        self.available_balance -= amount.value();
        Ok(())
    }

    /// Restores a reservation after a failed or declined dispense.
    pub fn release(&mut self, amount: Amount) {
        self.available_balance += amount.value();
    }

    /// Settles a confirmed withdrawal: the settled balance comes down to meet
    /// the already-reserved available balance, and the amount counts against
    /// today's limit.
    pub fn settle_withdrawal(&mut self, amount: Amount, today: NaiveDate) {
        self.roll_daily_window(today);
        self.balance -= amount.value();
        self.daily_withdrawn_amount += amount.value();
        self.last_activity_date = today;
    }

    /// Settles a verified deposit: both balances grow together, no
    /// reservation was ever held.
    pub fn settle_deposit(&mut self, amount: Amount) {
        self.balance += amount.value();
        self.available_balance += amount.value();
    }
}

/// Provisioning input for a new account. Ids and versions are assigned by
/// the store; the opening available balance equals the opening balance.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub card_number: String,
    pub customer_name: String,
    pub pin: String,
    pub opening_balance: Decimal,
    pub daily_withdrawal_limit: Decimal,
}

impl NewAccount {
    pub fn new(
        card_number: impl Into<String>,
        customer_name: impl Into<String>,
        pin: impl Into<String>,
        opening_balance: Decimal,
        daily_withdrawal_limit: Decimal,
    ) -> Result<Self> {
        let card_number = card_number.into();
        let pin = pin.into();
        if card_number.len() != 16 || !card_number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AtmError::Validation(
                "card number must be exactly 16 digits".to_string(),
            ));
        }
        if pin.len() != 4 || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AtmError::Validation(
                "PIN must be exactly 4 digits".to_string(),
            ));
        }
        if opening_balance < Decimal::ZERO {
            return Err(AtmError::Validation(
                "opening balance cannot be negative".to_string(),
            ));
        }
        if daily_withdrawal_limit < Decimal::ZERO {
            return Err(AtmError::Validation(
                "daily withdrawal limit cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            card_number,
            customer_name: customer_name.into(),
            pin,
            opening_balance,
            daily_withdrawal_limit,
        })
    }
}
