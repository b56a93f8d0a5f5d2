use std::sync::Arc;

use thiserror::Error;

use lotstock_core::{LotId, TransactionId};
use lotstock_inventory::{Lot, LotChangeSet, StockBucket, Transaction, TransactionDraft};

/// Lot store / transaction log operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, insufficient stock).
///
/// - **Conflict**: a version guard failed at commit; the caller may retry
/// - **Poisoned**: a lock was poisoned by a panicking writer
/// - **Integrity**: the change set is inconsistent with stored state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Lots and transaction log as of the same commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub lots: Vec<Lot>,
    pub transactions: Vec<Transaction>,
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Durable per-lot state plus the atomic commit boundary.
///
/// ## Commit Semantics
///
/// `commit()` must:
/// - check every change's `ExpectedVersion` against stored state
///   (`Exact(v)` for updates, `Absent` for newly created lot keys)
/// - reject any change that would leave `qty_on_hand < 0`
/// - apply all lot writes and append the transaction as one unit: either
///   everything becomes visible or nothing does
/// - assign the next commit sequence to the transaction
///
/// Lot writes bump `version` by one; new lots start at version 1 and receive
/// the next store-wide insertion sequence.
pub trait LotStore: Send + Sync {
    /// Versioned snapshot of every lot (including empty ones) in `buckets`.
    fn load_lots(&self, buckets: &[StockBucket]) -> Result<Vec<Lot>, StoreError>;

    /// Snapshot of all lots.
    fn list_lots(&self) -> Result<Vec<Lot>, StoreError>;

    fn get_lot(&self, lot_id: LotId) -> Result<Option<Lot>, StoreError>;

    /// Every lot together with the log that produced it, read atomically.
    fn snapshot(&self) -> Result<StoreSnapshot, StoreError>;

    /// Atomically apply `changes` and append `draft` to the transaction log.
    fn commit(
        &self,
        changes: LotChangeSet,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError>;
}

/// Append-only log of committed transactions.
pub trait TransactionLog: Send + Sync {
    /// All transactions in commit order.
    fn transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Sequence of the last committed transaction (0 when empty).
    fn last_sequence(&self) -> Result<u64, StoreError>;
}

impl<S> LotStore for Arc<S>
where
    S: LotStore + ?Sized,
{
    fn load_lots(&self, buckets: &[StockBucket]) -> Result<Vec<Lot>, StoreError> {
        (**self).load_lots(buckets)
    }

    fn list_lots(&self) -> Result<Vec<Lot>, StoreError> {
        (**self).list_lots()
    }

    fn get_lot(&self, lot_id: LotId) -> Result<Option<Lot>, StoreError> {
        (**self).get_lot(lot_id)
    }

    fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        (**self).snapshot()
    }

    fn commit(
        &self,
        changes: LotChangeSet,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError> {
        (**self).commit(changes, draft)
    }
}

impl<S> TransactionLog for Arc<S>
where
    S: TransactionLog + ?Sized,
{
    fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        (**self).transactions()
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        (**self).get_transaction(id)
    }

    fn last_sequence(&self) -> Result<u64, StoreError> {
        (**self).last_sequence()
    }
}
