use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::account::{Account, AccountId, NewAccount};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionId};
use crate::error::Result;

/// Shared handle to a concrete store implementing both ports.
pub type SharedStore = Arc<dyn AtmStore>;

/// Durable keyed storage of accounts with a unique card-number index.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Provisions a new account: assigns the id, sets the available balance
    /// equal to the opening balance and the version stamp to zero. Fails
    /// with `DuplicateCard` if the card number is already registered.
    async fn insert(&self, account: NewAccount) -> Result<Account>;

    async fn get(&self, id: AccountId) -> Result<Option<Account>>;

    async fn find_by_card(&self, card_number: &str) -> Result<Option<Account>>;

    /// All accounts, ordered by id. Used by the report writer.
    async fn all(&self) -> Result<Vec<Account>>;

    async fn is_empty(&self) -> Result<bool>;
}

/// Append-mostly journal of transactions: one append per entry plus at most
/// one terminal-state update, queryable per account.
#[async_trait]
pub trait TransactionJournal: Send + Sync {
    /// Appends an entry and assigns its id. Used for writes that carry no
    /// account mutation (deposit initiation, declined/failed audit records).
    async fn append(&self, entry: NewTransaction) -> Result<Transaction>;

    async fn get_entry(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Replaces a PENDING entry with its terminal form, without touching any
    /// account. Fails with `NotPending` if the stored entry already settled,
    /// so the PENDING-to-terminal transition happens exactly once even
    /// without an account write serializing it.
    async fn settle_entry(&self, entry: Transaction) -> Result<Transaction>;

    /// The account's entries ordered by timestamp descending, ties broken by
    /// id descending.
    async fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>>;
}

/// The journal half of an atomic commit.
#[derive(Debug, Clone)]
pub enum JournalWrite {
    /// Account-only write (persisting a lazy daily-window reset).
    None,
    /// New entry, id assigned by the journal.
    Append(NewTransaction),
    /// Terminal-state update of an existing entry.
    Update(Transaction),
}

/// Result of a successful atomic commit: the account as persisted (version
/// bumped) and the journal entry written alongside it, if any.
#[derive(Debug, Clone)]
pub struct Committed {
    pub account: Account,
    pub transaction: Option<Transaction>,
}

/// Couples the two stores so an account update and its journal write land as
/// one atomic unit, guarded by the account's version stamp.
#[async_trait]
pub trait AtmStore: AccountStore + TransactionJournal {
    /// Conditionally persists `account` together with `entry`.
    ///
    /// The write succeeds only if the stored version equals
    /// `account.version`; the persisted account carries `version + 1`. On a
    /// stale version nothing is written and `VersionConflict` is returned,
    /// signalling the caller to re-read, re-validate and retry. Either both
    /// the account and the journal write become visible, or neither does.
    ///
    /// A `JournalWrite::Update` additionally requires the stored entry to
    /// still be PENDING (the `settle_entry` guard): journal-only settlements
    /// leave the account version untouched, so the version check alone
    /// cannot reject an update that lost that race.
    async fn commit(&self, account: Account, entry: JournalWrite) -> Result<Committed>;
}
