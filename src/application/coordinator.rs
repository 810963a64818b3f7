use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::card::mask_card_number;
use crate::domain::ports::{AccountStore, JournalWrite, SharedStore, TransactionJournal};
use crate::domain::transaction::{
    NewTransaction, Outcome, Transaction, TransactionId, TransactionStatus, TransactionType,
};
use crate::error::{AtmError, Result};

/// Bounded attempts per operation; each attempt re-reads and re-validates
/// from scratch.
const MAX_ATTEMPTS: u32 = 3;
const CONFLICT_BACKOFF: Duration = Duration::from_millis(50);

/// Read projection returned by the balance inquiry.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSummary {
    pub masked_card_number: String,
    pub customer_name: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub daily_withdrawal_limit: Decimal,
    pub remaining_daily_limit: Decimal,
}

/// Orchestrates how an account's balances and its journal change together.
///
/// Withdrawals run a two-phase protocol: `initiate_withdrawal` reserves
/// funds against the available balance and records a PENDING entry, and
/// `complete_withdrawal` either settles the true balance (the dispenser
/// confirmed) or releases the reservation (it did not). Deposits defer all
/// balance movement to `complete_deposit`.
///
/// No in-process locks are taken: safety comes from the store's
/// version-conditional commit. A conflicting writer forces the whole
/// operation, validation included, to restart from a fresh read.
#[derive(Clone)]
pub struct Coordinator {
    store: SharedStore,
}

impl Coordinator {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// First phase of a withdrawal: validates against fresh state, reserves
    /// the amount and records a PENDING journal entry. The caller dispenses
    /// the cash and reports back via [`Coordinator::complete_withdrawal`].
    ///
    /// Declined initiations (insufficient funds, daily limit) are recorded
    /// as DECLINED journal entries and leave the account untouched.
    pub async fn initiate_withdrawal(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction> {
        self.with_retry("initiate_withdrawal", || {
            self.try_initiate_withdrawal(account_id, amount)
        })
        .await
    }

    async fn try_initiate_withdrawal(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction> {
        let today = Utc::now().date_naive();
        let mut account = self
            .load_active_account(account_id, TransactionType::Withdrawal, amount)
            .await?;

        if let Err(decline) = account.reserve(amount, today) {
            // The audit trail and the caller both reflect the decline.
            self.record_declined(&account, TransactionType::Withdrawal, amount, &decline)
                .await;
            return Err(decline);
        }

        let entry = NewTransaction {
            account_id,
            kind: TransactionType::Withdrawal,
            amount: amount.value(),
            balance_after: account.balance - amount.value(),
            timestamp: Utc::now(),
            description: "Withdrawal initiated - awaiting ATM confirmation".to_string(),
            status: TransactionStatus::Pending,
        };

        let committed = self.store.commit(account, JournalWrite::Append(entry)).await?;
        let transaction = committed
            .transaction
            .ok_or_else(|| AtmError::Storage("commit returned no journal entry".to_string()))?;

        info!(
            account_id,
            transaction_id = transaction.id,
            amount = %amount,
            "withdrawal initiated, awaiting confirmation"
        );
        Ok(transaction)
    }

    /// Second phase of a withdrawal. SUCCESS settles the balance; FAILED or
    /// DECLINED restores the reservation. Completing a non-PENDING entry is
    /// rejected, never silently repeated.
    pub async fn complete_withdrawal(
        &self,
        transaction_id: TransactionId,
        outcome: Outcome,
        reason: Option<String>,
    ) -> Result<Transaction> {
        self.with_retry("complete_withdrawal", || {
            self.try_complete_withdrawal(transaction_id, outcome, reason.as_deref())
        })
        .await
    }

    async fn try_complete_withdrawal(
        &self,
        transaction_id: TransactionId,
        outcome: Outcome,
        reason: Option<&str>,
    ) -> Result<Transaction> {
        let mut transaction = self.load_transaction(transaction_id).await?;
        transaction.ensure_settleable(TransactionType::Withdrawal)?;

        let mut account = self
            .store
            .get(transaction.account_id)
            .await?
            .ok_or(AtmError::AccountNotFound(transaction.account_id))?;
        let amount = Amount::new(transaction.amount)?;

        match outcome {
            Outcome::Success => {
                account.settle_withdrawal(amount, Utc::now().date_naive());
                transaction.settle(outcome, account.balance, "Cash withdrawal completed");
            }
            Outcome::Failed | Outcome::Declined => {
                account.release(amount);
                transaction.settle(
                    outcome,
                    account.balance,
                    reason.unwrap_or("Transaction declined"),
                );
            }
        }

        let committed = self
            .store
            .commit(account, JournalWrite::Update(transaction))
            .await?;
        let transaction = committed
            .transaction
            .ok_or_else(|| AtmError::Storage("commit returned no journal entry".to_string()))?;

        info!(
            transaction_id,
            status = %transaction.status,
            balance = %committed.account.balance,
            available = %committed.account.available_balance,
            "withdrawal completed"
        );
        Ok(transaction)
    }

    /// Records a PENDING deposit. No reservation is taken and the account is
    /// not touched: depositing removes nothing the customer could otherwise
    /// spend.
    pub async fn initiate_deposit(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction> {
        let account = self
            .load_active_account(account_id, TransactionType::Deposit, amount)
            .await?;

        let transaction = self
            .store
            .append(NewTransaction {
                account_id,
                kind: TransactionType::Deposit,
                amount: amount.value(),
                balance_after: account.balance + amount.value(),
                timestamp: Utc::now(),
                description: "Deposit initiated - awaiting cash verification".to_string(),
                status: TransactionStatus::Pending,
            })
            .await?;

        info!(
            account_id,
            transaction_id = transaction.id,
            amount = %amount,
            "deposit initiated, awaiting cash verification"
        );
        Ok(transaction)
    }

    /// Settles a deposit. SUCCESS adds the amount to both balances
    /// atomically with the journal update; FAILED or DECLINED records only
    /// the terminal status and reason.
    pub async fn complete_deposit(
        &self,
        transaction_id: TransactionId,
        outcome: Outcome,
        reason: Option<String>,
    ) -> Result<Transaction> {
        self.with_retry("complete_deposit", || {
            self.try_complete_deposit(transaction_id, outcome, reason.as_deref())
        })
        .await
    }

    async fn try_complete_deposit(
        &self,
        transaction_id: TransactionId,
        outcome: Outcome,
        reason: Option<&str>,
    ) -> Result<Transaction> {
        let mut transaction = self.load_transaction(transaction_id).await?;
        transaction.ensure_settleable(TransactionType::Deposit)?;

        let mut account = self
            .store
            .get(transaction.account_id)
            .await?
            .ok_or(AtmError::AccountNotFound(transaction.account_id))?;
        let amount = Amount::new(transaction.amount)?;

        match outcome {
            Outcome::Success => {
                account.settle_deposit(amount);
                transaction.settle(outcome, account.balance, "Cash deposit completed");
                let committed = self
                    .store
                    .commit(account, JournalWrite::Update(transaction))
                    .await?;
                let transaction = committed.transaction.ok_or_else(|| {
                    AtmError::Storage("commit returned no journal entry".to_string())
                })?;
                info!(
                    transaction_id,
                    balance = %committed.account.balance,
                    "deposit completed"
                );
                Ok(transaction)
            }
            Outcome::Failed | Outcome::Declined => {
                transaction.settle(
                    outcome,
                    account.balance,
                    reason.unwrap_or("Deposit declined"),
                );
                // No balance movement: only the journal entry settles. The
                // journal guards the PENDING-to-terminal transition itself.
                let transaction = self.store.settle_entry(transaction).await?;
                warn!(transaction_id, status = %transaction.status, "deposit not completed");
                Ok(transaction)
            }
        }
    }

    /// Balance inquiry. Applies (and persists) the lazy daily-window reset,
    /// then projects balances and the remaining daily allowance.
    pub async fn balance(&self, account_id: AccountId) -> Result<BalanceSummary> {
        self.with_retry("balance", || self.try_balance(account_id)).await
    }

    async fn try_balance(&self, account_id: AccountId) -> Result<BalanceSummary> {
        let today = Utc::now().date_naive();
        let mut account = self
            .store
            .get(account_id)
            .await?
            .ok_or(AtmError::AccountNotFound(account_id))?;

        if account.roll_daily_window(today) {
            account = self.store.commit(account, JournalWrite::None).await?.account;
        }

        Ok(BalanceSummary {
            masked_card_number: mask_card_number(&account.card_number),
            customer_name: account.customer_name.clone(),
            balance: account.balance,
            available_balance: account.available_balance,
            daily_withdrawal_limit: account.daily_withdrawal_limit,
            remaining_daily_limit: account.remaining_daily_limit(today),
        })
    }

    /// The account's journal, newest first. Read-only.
    pub async fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        if self.store.get(account_id).await?.is_none() {
            return Err(AtmError::AccountNotFound(account_id));
        }
        self.store.history(account_id).await
    }

    async fn load_transaction(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.store
            .get_entry(transaction_id)
            .await?
            .ok_or(AtmError::TransactionNotFound(transaction_id))
    }

    /// Loads the account for a mutating operation. Inactive accounts reject
    /// the operation and leave a FAILED audit entry behind.
    async fn load_active_account(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        amount: Amount,
    ) -> Result<Account> {
        let account = self
            .store
            .get(account_id)
            .await?
            .ok_or(AtmError::AccountNotFound(account_id))?;

        if !account.active {
            warn!(account_id, "operation rejected, account is not active");
            self.record_audit(
                &account,
                kind,
                amount,
                TransactionStatus::Failed,
                "Account is not active",
            )
            .await;
            return Err(AtmError::AccountInactive(account_id));
        }
        Ok(account)
    }

    async fn record_declined(
        &self,
        account: &Account,
        kind: TransactionType,
        amount: Amount,
        reason: &AtmError,
    ) {
        warn!(account_id = account.id, %reason, "operation declined");
        self.record_audit(
            account,
            kind,
            amount,
            TransactionStatus::Declined,
            &reason.to_string(),
        )
        .await;
    }

    /// Best-effort audit append; a journal hiccup must not mask the business
    /// outcome already decided.
    async fn record_audit(
        &self,
        account: &Account,
        kind: TransactionType,
        amount: Amount,
        status: TransactionStatus,
        reason: &str,
    ) {
        let entry = NewTransaction {
            account_id: account.id,
            kind,
            amount: amount.value(),
            balance_after: account.balance,
            timestamp: Utc::now(),
            description: reason.to_string(),
            status,
        };
        if let Err(e) = self.store.append(entry).await {
            error!(account_id = account.id, error = %e, "failed to record audit entry");
        }
    }

    /// Runs one attempt of a version-conditional operation, restarting the
    /// whole read-validate-write unit on conflict. Validation results never
    /// survive across attempts.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, attempt_fn: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Err(e) if e.is_transient() => {
                    if attempt >= MAX_ATTEMPTS {
                        warn!(op, attempt, "optimistic conflict, giving up");
                        return Err(AtmError::RetriesExhausted { attempts: attempt });
                    }
                    warn!(op, attempt, "optimistic conflict, restarting operation");
                    sleep(CONFLICT_BACKOFF).await;
                }
                other => return other,
            }
        }
    }
}
