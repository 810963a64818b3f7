use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::account::{Account, AccountId, NewAccount};
use crate::domain::ports::{AccountStore, AtmStore, Committed, JournalWrite, TransactionJournal};
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{AtmError, Result};

/// Column Family for account records, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for journal entries, keyed by transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family mapping card numbers to account ids (unique index).
pub const CF_CARDS: &str = "cards";
/// Column Family for id counters.
pub const CF_META: &str = "meta";

const KEY_NEXT_ACCOUNT_ID: &[u8] = b"next_account_id";
const KEY_NEXT_TRANSACTION_ID: &[u8] = b"next_transaction_id";

/// A persistent store implementation using RocksDB.
///
/// Accounts, journal entries, the card index and the id counters live in
/// separate column families; records are stored as JSON values. All writes
/// go through a single mutex so the version check of `commit` and the id
/// allocations are atomic with respect to each other; the batched puts make
/// the account+journal unit atomic on disk.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_CARDS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(storage)?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AtmError::Storage(format!("column family {name} not found")))
    }

    fn read_account(&self, id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, id.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Allocates the next id from a meta-CF counter. Callers must hold the
    /// write lock.
    fn allocate_id(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let next = match self.db.get_cf(cf, key).map_err(storage)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| AtmError::Storage("corrupt id counter".to_string()))?;
                u64::from_be_bytes(raw) + 1
            }
            None => 1,
        };
        self.db
            .put_cf(cf, key, next.to_be_bytes())
            .map_err(storage)?;
        Ok(next)
    }

}

fn materialize(id: TransactionId, entry: NewTransaction) -> Transaction {
    Transaction {
        id,
        account_id: entry.account_id,
        kind: entry.kind,
        amount: entry.amount,
        balance_after: entry.balance_after,
        timestamp: entry.timestamp,
        description: entry.description,
        status: entry.status,
    }
}

fn storage(e: rocksdb::Error) -> AtmError {
    AtmError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| AtmError::Storage(format!("serialization error: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| AtmError::Storage(format!("deserialization error: {e}")))
}

#[async_trait]
impl AccountStore for RocksDbStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let _guard = self.write_lock.lock().await;

        let cards = self.cf(CF_CARDS)?;
        if self
            .db
            .get_cf(cards, account.card_number.as_bytes())
            .map_err(storage)?
            .is_some()
        {
            return Err(AtmError::DuplicateCard);
        }

        let id = self.allocate_id(KEY_NEXT_ACCOUNT_ID)?;
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

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ACCOUNTS)?, id.to_be_bytes(), encode(&record)?);
        batch.put_cf(cards, account.card_number.as_bytes(), id.to_be_bytes());
        self.db.write(batch).map_err(storage)?;
        Ok(record)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.read_account(id)
    }

    async fn find_by_card(&self, card_number: &str) -> Result<Option<Account>> {
        let cards = self.cf(CF_CARDS)?;
        let Some(bytes) = self
            .db
            .get_cf(cards, card_number.as_bytes())
            .map_err(storage)?
        else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AtmError::Storage("corrupt card index".to_string()))?;
        self.read_account(u64::from_be_bytes(raw))
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(storage)?;
            accounts.push(decode(&value)?);
        }
        // Big-endian keys iterate in id order already; keep the sort as the
        // documented contract rather than an encoding detail.
        accounts.sort_by_key(|a: &Account| a.id);
        Ok(accounts)
    }

    async fn is_empty(&self) -> Result<bool> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut iter = self.db.iterator_cf(cf, rocksdb::IteratorMode::Start);
        match iter.next() {
            Some(item) => {
                item.map_err(storage)?;
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

#[async_trait]
impl TransactionJournal for RocksDbStore {
    async fn append(&self, entry: NewTransaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let id = self.allocate_id(KEY_NEXT_TRANSACTION_ID)?;
        let record = materialize(id, entry);
        self.db
            .put_cf(self.cf(CF_TRANSACTIONS)?, id.to_be_bytes(), encode(&record)?)
            .map_err(storage)?;
        Ok(record)
    }

    async fn get_entry(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.read_transaction(id)
    }

    async fn settle_entry(&self, entry: Transaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let stored = self
            .read_transaction(entry.id)?
            .ok_or(AtmError::TransactionNotFound(entry.id))?;
        if stored.status != TransactionStatus::Pending {
            return Err(AtmError::NotPending {
                id: entry.id,
                status: stored.status,
            });
        }
        self.db
            .put_cf(
                self.cf(CF_TRANSACTIONS)?,
                entry.id.to_be_bytes(),
                encode(&entry)?,
            )
            .map_err(storage)?;
        Ok(entry)
    }

    async fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut entries: Vec<Transaction> = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(storage)?;
            let entry: Transaction = decode(&value)?;
            if entry.account_id == account_id {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(entries)
    }
}

#[async_trait]
impl AtmStore for RocksDbStore {
    async fn commit(&self, account: Account, entry: JournalWrite) -> Result<Committed> {
        let _guard = self.write_lock.lock().await;

        let stored = self
            .read_account(account.id)?
            .ok_or(AtmError::AccountNotFound(account.id))?;
        if stored.version != account.version {
            return Err(AtmError::VersionConflict(account.id));
        }

        let mut persisted = account;
        persisted.version += 1;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            persisted.id.to_be_bytes(),
            encode(&persisted)?,
        );

        let transaction = match entry {
            JournalWrite::None => None,
            JournalWrite::Append(new_entry) => {
                let id = self.allocate_id(KEY_NEXT_TRANSACTION_ID)?;
                let record = materialize(id, new_entry);
                batch.put_cf(
                    self.cf(CF_TRANSACTIONS)?,
                    id.to_be_bytes(),
                    encode(&record)?,
                );
                Some(record)
            }
            JournalWrite::Update(updated) => {
                // Same PENDING guard as `settle_entry`: a journal-only
                // settlement does not bump the account version, so the
                // version check alone cannot catch a stale update.
                let stored = self
                    .read_transaction(updated.id)?
                    .ok_or(AtmError::TransactionNotFound(updated.id))?;
                if stored.status != TransactionStatus::Pending {
                    return Err(AtmError::NotPending {
                        id: updated.id,
                        status: stored.status,
                    });
                }
                batch.put_cf(
                    self.cf(CF_TRANSACTIONS)?,
                    updated.id.to_be_bytes(),
                    encode(&updated)?,
                );
                Some(updated)
            }
        };

        self.db.write(batch).map_err(storage)?;
        Ok(Committed {
            account: persisted,
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    use crate::domain::transaction::TransactionType;

    fn new_account(card: &str) -> NewAccount {
        NewAccount::new(card, "John Doe", "1234", dec!(100.00), dec!(50.00)).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        for name in [CF_ACCOUNTS, CF_TRANSACTIONS, CF_CARDS, CF_META] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_insert_and_card_index() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let a = store.insert(new_account("4532015112830366")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(a.version, 0);

        let found = store.find_by_card("4532015112830366").await.unwrap();
        assert_eq!(found.map(|acc| acc.id), Some(1));

        assert!(matches!(
            store.insert(new_account("4532015112830366")).await,
            Err(AtmError::DuplicateCard)
        ));
    }

    #[tokio::test]
    async fn test_commit_version_check_survives_reopen() {
        let dir = tempdir().unwrap();
        let account = {
            let store = RocksDbStore::open(dir.path()).unwrap();
            let account = store.insert(new_account("4532015112830366")).await.unwrap();
            store
                .commit(account.clone(), JournalWrite::None)
                .await
                .unwrap();
            account
        };

        // Same stale version after reopening the database.
        let store = RocksDbStore::open(dir.path()).unwrap();
        let err = store
            .commit(account, JournalWrite::None)
            .await
            .unwrap_err();
        assert!(matches!(err, AtmError::VersionConflict(1)));

        let reloaded = store.get(1).await.unwrap().unwrap();
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn test_commit_update_rejects_settled_entry() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let account = store.insert(new_account("4532015112830366")).await.unwrap();

        let mut entry = store
            .append(NewTransaction {
                account_id: account.id,
                kind: TransactionType::Deposit,
                amount: dec!(10.00),
                balance_after: dec!(110.00),
                timestamp: Utc::now(),
                description: "Deposit initiated - awaiting cash verification".to_string(),
                status: TransactionStatus::Pending,
            })
            .await
            .unwrap();

        let mut failed = entry.clone();
        failed.status = TransactionStatus::Failed;
        store.settle_entry(failed).await.unwrap();

        // The account version still matches, so only the PENDING guard can
        // stop this stale SUCCESS from flipping a terminal entry.
        entry.status = TransactionStatus::Success;
        let err = store
            .commit(account, JournalWrite::Update(entry.clone()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AtmError::NotPending {
                status: TransactionStatus::Failed,
                ..
            }
        ));
        let stored = store.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_journal_roundtrip_and_settle_guard() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let account = store.insert(new_account("4532015112830366")).await.unwrap();

        let mut tx = store
            .append(NewTransaction {
                account_id: account.id,
                kind: TransactionType::Deposit,
                amount: dec!(10.00),
                balance_after: dec!(110.00),
                timestamp: Utc::now(),
                description: "Deposit initiated - awaiting cash verification".to_string(),
                status: TransactionStatus::Pending,
            })
            .await
            .unwrap();
        assert_eq!(tx.id, 1);

        tx.status = TransactionStatus::Failed;
        store.settle_entry(tx.clone()).await.unwrap();

        // Terminal entries cannot settle twice.
        let err = store.settle_entry(tx).await.unwrap_err();
        assert!(matches!(
            err,
            AtmError::NotPending {
                id: 1,
                status: TransactionStatus::Failed
            }
        ));
    }
}
