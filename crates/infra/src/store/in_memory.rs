use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use lotstock_core::{ExpectedVersion, LotId, TransactionId};
use lotstock_inventory::{
    Lot, LotChange, LotChangeSet, LotKey, StockBucket, Transaction, TransactionDraft,
};

use super::r#trait::{LotStore, StoreError, StoreSnapshot, TransactionLog};

#[derive(Debug, Default)]
struct StoreState {
    /// Insertion order; `lots[i].sequence == i + 1`.
    lots: Vec<Lot>,
    by_id: HashMap<LotId, usize>,
    by_key: HashMap<LotKey, usize>,
    by_bucket: HashMap<StockBucket, Vec<usize>>,
    log: Vec<Transaction>,
}

impl StoreState {
    fn verify(&self, changes: &LotChangeSet) -> Result<(), StoreError> {
        let mut created: HashSet<&LotKey> = HashSet::new();

        for change in &changes.changes {
            let lot = &change.lot;
            if lot.qty_on_hand < 0 {
                return Err(StoreError::Integrity(format!(
                    "lot {} would hold {} units",
                    lot.lot_id, lot.qty_on_hand
                )));
            }

            let actual = match change.expected {
                ExpectedVersion::Absent => {
                    if !created.insert(&lot.key) {
                        return Err(StoreError::Integrity(format!(
                            "change set creates lot '{}' twice",
                            lot.key.lot_no
                        )));
                    }
                    if self.by_id.contains_key(&lot.lot_id) {
                        return Err(StoreError::Integrity(format!(
                            "lot id {} already in use",
                            lot.lot_id
                        )));
                    }
                    self.by_key.get(&lot.key).map(|&idx| self.lots[idx].version)
                }
                ExpectedVersion::Exact(_) | ExpectedVersion::Any => {
                    let idx = *self.by_id.get(&lot.lot_id).ok_or_else(|| {
                        StoreError::Integrity(format!("unknown lot {}", lot.lot_id))
                    })?;
                    if self.lots[idx].key != lot.key {
                        return Err(StoreError::Integrity(format!(
                            "lot {} cannot change identity",
                            lot.lot_id
                        )));
                    }
                    Some(self.lots[idx].version)
                }
            };

            if !change.expected.matches(actual) {
                return Err(StoreError::Conflict(format!(
                    "lot '{}' at location {}: expected {}, found {}",
                    lot.key.lot_no,
                    lot.key.location_id,
                    change.expected,
                    actual.map_or_else(|| "absent".to_string(), |v| format!("v{v}")),
                )));
            }
        }

        Ok(())
    }

    fn apply(&mut self, change: LotChange) {
        let LotChange { mut lot, expected } = change;
        match expected {
            ExpectedVersion::Absent => {
                let idx = self.lots.len();
                lot.version = 1;
                lot.sequence = idx as u64 + 1;
                self.by_id.insert(lot.lot_id, idx);
                self.by_key.insert(lot.key.clone(), idx);
                self.by_bucket.entry(lot.bucket()).or_default().push(idx);
                self.lots.push(lot);
            }
            ExpectedVersion::Exact(_) | ExpectedVersion::Any => {
                // verify() guarantees the lot exists.
                if let Some(&idx) = self.by_id.get(&lot.lot_id) {
                    let stored = &mut self.lots[idx];
                    stored.qty_on_hand = lot.qty_on_hand;
                    stored.unit_cost = lot.unit_cost;
                    stored.vendor_id = lot.vendor_id;
                    stored.version += 1;
                }
            }
        }
    }
}

/// In-memory lot store and transaction log.
///
/// A single `RwLock` guards lots and log together, so a commit's lot writes
/// and its transaction append become visible at the same instant. Readers
/// hold the shared guard only while copying out their snapshot.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LotStore for InMemoryInventoryStore {
    fn load_lots(&self, buckets: &[StockBucket]) -> Result<Vec<Lot>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(buckets
            .iter()
            .filter_map(|b| state.by_bucket.get(b))
            .flatten()
            .map(|&idx| state.lots[idx].clone())
            .collect())
    }

    fn list_lots(&self) -> Result<Vec<Lot>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.lots.clone())
    }

    fn get_lot(&self, lot_id: LotId) -> Result<Option<Lot>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.by_id.get(&lot_id).map(|&idx| state.lots[idx].clone()))
    }

    fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(StoreSnapshot {
            lots: state.lots.clone(),
            transactions: state.log.clone(),
        })
    }

    fn commit(
        &self,
        changes: LotChangeSet,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Verify everything before the first write (all or nothing).
        state.verify(&changes)?;
        for change in changes.changes {
            state.apply(change);
        }

        let sequence = state.log.len() as u64 + 1;
        let txn = draft.commit(TransactionId::new(), sequence);
        state.log.push(txn.clone());
        Ok(txn)
    }
}

impl TransactionLog for InMemoryInventoryStore {
    fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.log.clone())
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.log.iter().find(|t| t.id == id).cloned())
    }

    fn last_sequence(&self) -> Result<u64, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.log.len() as u64)
    }
}
