use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::account::{Account, AccountId, NewAccount};
use crate::domain::ports::{AccountStore, AtmStore, Committed, JournalWrite, TransactionJournal};
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{AtmError, Result};

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    by_card: HashMap<String, AccountId>,
    transactions: HashMap<TransactionId, Transaction>,
    next_account_id: AccountId,
    next_transaction_id: TransactionId,
}

impl Inner {
    fn allocate_transaction_id(&mut self) -> TransactionId {
        self.next_transaction_id += 1;
        self.next_transaction_id
    }
}

/// Thread-safe in-memory store for accounts and the transaction journal.
///
/// A single `RwLock` guards both maps, so `commit` is atomic by
/// construction: the version check, the account write and the journal write
/// happen under one write guard. Ideal for tests and single-process runs
/// where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut inner = self.inner.write().await;
        if inner.by_card.contains_key(&account.card_number) {
            return Err(AtmError::DuplicateCard);
        }
        inner.next_account_id += 1;
        let id = inner.next_account_id;
        let record = Account {
            id,
            card_number: account.card_number.clone(),
            customer_name: account.customer_name,
            pin: account.pin,
            balance: account.opening_balance,
            available_balance: account.opening_balance,
            daily_withdrawal_limit: account.daily_withdrawal_limit,
            daily_withdrawn_amount: rust_decimal::Decimal::ZERO,
            last_activity_date: chrono::Utc::now().date_naive(),
            active: true,
            version: 0,
        };
        inner.by_card.insert(account.card_number, id);
        inner.accounts.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn find_by_card(&self, card_number: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_card
            .get(card_number)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<_> = inner.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn is_empty(&self) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.is_empty())
    }
}

#[async_trait]
impl TransactionJournal for InMemoryStore {
    async fn append(&self, entry: NewTransaction) -> Result<Transaction> {
        let mut inner = self.inner.write().await;
        let id = inner.allocate_transaction_id();
        let record = Transaction {
            id,
            account_id: entry.account_id,
            kind: entry.kind,
            amount: entry.amount,
            balance_after: entry.balance_after,
            timestamp: entry.timestamp,
            description: entry.description,
            status: entry.status,
        };
        inner.transactions.insert(id, record.clone());
        Ok(record)
    }

    async fn get_entry(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(&id).cloned())
    }

    async fn settle_entry(&self, entry: Transaction) -> Result<Transaction> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .transactions
            .get(&entry.id)
            .ok_or(AtmError::TransactionNotFound(entry.id))?;
        if stored.status != TransactionStatus::Pending {
            return Err(AtmError::NotPending {
                id: entry.id,
                status: stored.status,
            });
        }
        inner.transactions.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(entries)
    }
}

#[async_trait]
impl AtmStore for InMemoryStore {
    async fn commit(&self, account: Account, entry: JournalWrite) -> Result<Committed> {
        let mut inner = self.inner.write().await;

        let stored = inner
            .accounts
            .get(&account.id)
            .ok_or(AtmError::AccountNotFound(account.id))?;
        if stored.version != account.version {
            return Err(AtmError::VersionConflict(account.id));
        }

        let mut persisted = account;
        persisted.version += 1;

        let transaction = match entry {
            JournalWrite::None => None,
            JournalWrite::Append(new_entry) => {
                let id = inner.allocate_transaction_id();
                let record = Transaction {
                    id,
                    account_id: new_entry.account_id,
                    kind: new_entry.kind,
                    amount: new_entry.amount,
                    balance_after: new_entry.balance_after,
                    timestamp: new_entry.timestamp,
                    description: new_entry.description,
                    status: new_entry.status,
                };
                inner.transactions.insert(id, record.clone());
                Some(record)
            }
            JournalWrite::Update(updated) => {
                // The stored entry must still be PENDING: a settlement that
                // bypassed the account write (deposit failure) may already
                // have made it terminal, and terminal is final.
                let stored_status = inner
                    .transactions
                    .get(&updated.id)
                    .map(|t| t.status)
                    .ok_or(AtmError::TransactionNotFound(updated.id))?;
                if stored_status != TransactionStatus::Pending {
                    return Err(AtmError::NotPending {
                        id: updated.id,
                        status: stored_status,
                    });
                }
                inner.transactions.insert(updated.id, updated.clone());
                Some(updated)
            }
        };

        inner.accounts.insert(persisted.id, persisted.clone());
        Ok(Committed {
            account: persisted,
            transaction,
        })
    }
}
