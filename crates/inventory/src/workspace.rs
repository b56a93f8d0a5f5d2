//! Staged lot mutations (the Lot Store primitives, applied to a unit of work).
//!
//! A command never mutates committed lots directly. It loads a versioned
//! snapshot of the lots it touches into a [`LotWorkspace`], runs the lot
//! primitives against that overlay and, if every line succeeds, hands the
//! resulting [`LotChangeSet`] to the store for an atomic, version-checked
//! commit. Dropping the workspace is the rollback.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::trace;

use lotstock_core::{DomainError, DomainResult, ExpectedVersion, LotId, VendorId};

use crate::lot::{Lot, LotKey, StockBucket};

/// Input for [`LotWorkspace::upsert_receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotReceipt {
    pub key: LotKey,
    pub vendor_id: Option<VendorId>,
    /// Used only when the lot is created.
    pub received_at: DateTime<Utc>,
    pub unit_cost: Decimal,
    pub qty: i64,
}

/// One lot write, guarded by the version the workspace read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotChange {
    pub lot: Lot,
    /// `Exact(v)` for updates, `Absent` for lots created by this unit of work.
    pub expected: ExpectedVersion,
}

/// All lot writes produced by one command, in staging order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotChangeSet {
    pub changes: Vec<LotChange>,
}

impl LotChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

}

#[derive(Debug, Clone)]
struct StagedLot {
    lot: Lot,
    /// Version read from the store; `None` for lots created here.
    base_version: Option<u64>,
    dirty: bool,
}

/// Copy-on-write overlay over a snapshot of lots.
#[derive(Debug, Clone, Default)]
pub struct LotWorkspace {
    lots: Vec<StagedLot>,
    by_key: HashMap<LotKey, usize>,
    by_id: HashMap<LotId, usize>,
    next_sequence: u64,
}

impl LotWorkspace {
    /// Start a unit of work over committed lots.
    pub fn from_snapshot(lots: impl IntoIterator<Item = Lot>) -> Self {
        let mut ws = Self::default();
        for lot in lots {
            ws.next_sequence = ws.next_sequence.max(lot.sequence + 1);
            let base_version = Some(lot.version);
            ws.insert(StagedLot {
                lot,
                base_version,
                dirty: false,
            });
        }
        ws
    }

    fn insert(&mut self, staged: StagedLot) -> usize {
        let idx = self.lots.len();
        self.by_key.insert(staged.lot.key.clone(), idx);
        self.by_id.insert(staged.lot.lot_id, idx);
        self.lots.push(staged);
        idx
    }

    pub fn lot(&self, lot_id: LotId) -> Option<&Lot> {
        self.by_id.get(&lot_id).map(|&idx| &self.lots[idx].lot)
    }

    pub fn find_by_key(&self, key: &LotKey) -> Option<&Lot> {
        self.by_key.get(key).map(|&idx| &self.lots[idx].lot)
    }

    /// Lots with stock in `bucket`, oldest receipt first (ties: creation order).
    pub fn find_consumable_lots(&self, bucket: StockBucket) -> Vec<&Lot> {
        let mut lots: Vec<&Lot> = self
            .lots
            .iter()
            .map(|s| &s.lot)
            .filter(|l| l.bucket() == bucket && l.is_consumable())
            .collect();
        lots.sort_by_key(|l| l.fifo_key());
        lots
    }

    /// Total on hand in `bucket` as currently staged.
    pub fn on_hand(&self, bucket: StockBucket) -> DomainResult<i64> {
        self.lots
            .iter()
            .filter(|s| s.lot.bucket() == bucket)
            .try_fold(0i64, |total, s| checked_add(total, s.lot.qty_on_hand))
    }

    /// Create the lot at zero if absent, add `qty`, take the receipt's cost.
    pub fn upsert_receive(&mut self, receipt: LotReceipt) -> DomainResult<Lot> {
        if receipt.qty <= 0 {
            return Err(DomainError::validation(format!(
                "received qty must be positive (got {})",
                receipt.qty
            )));
        }

        // A bucket's total must stay representable, not just each lot.
        checked_add(self.on_hand(receipt.key.bucket())?, receipt.qty)?;

        let existing = self.by_key.get(&receipt.key).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => self.create(&receipt.key, receipt.vendor_id, receipt.received_at),
        };

        let staged = &mut self.lots[idx];
        staged.lot.qty_on_hand = checked_add(staged.lot.qty_on_hand, receipt.qty)?;
        staged.lot.unit_cost = receipt.unit_cost;
        if staged.lot.vendor_id.is_none() {
            staged.lot.vendor_id = receipt.vendor_id;
        }
        staged.dirty = true;

        trace!(lot_id = %staged.lot.lot_id, qty = receipt.qty, "staged receipt");
        Ok(staged.lot.clone())
    }

    /// Remove `qty` from a specific lot.
    pub fn decrement(&mut self, lot_id: LotId, qty: i64) -> DomainResult<Lot> {
        if qty <= 0 {
            return Err(DomainError::validation(format!(
                "decrement qty must be positive (got {qty})"
            )));
        }
        let idx = *self
            .by_id
            .get(&lot_id)
            .ok_or_else(|| DomainError::validation(format!("lot {lot_id} is not loaded")))?;

        let staged = &mut self.lots[idx];
        if qty > staged.lot.qty_on_hand {
            return Err(DomainError::insufficient_stock(
                staged.lot.item_id(),
                staged.lot.location_id(),
                qty - staged.lot.qty_on_hand,
            ));
        }
        staged.lot.qty_on_hand -= qty;
        staged.dirty = true;

        trace!(lot_id = %lot_id, qty, "staged decrement");
        Ok(staged.lot.clone())
    }

    /// Found/corrected stock on an explicit lot (no FIFO selection).
    ///
    /// A missing `unit_cost` keeps the lot's current cost (zero for a new lot).
    pub fn adjust_positive(
        &mut self,
        key: &LotKey,
        qty: i64,
        unit_cost: Option<Decimal>,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Lot> {
        let unit_cost = match (unit_cost, self.find_by_key(key)) {
            (Some(cost), _) => cost,
            (None, Some(existing)) => existing.unit_cost,
            (None, None) => Decimal::ZERO,
        };
        self.upsert_receive(LotReceipt {
            key: key.clone(),
            vendor_id: None,
            received_at,
            unit_cost,
            qty,
        })
    }

    /// Write-off on an explicit lot. `qty` is the (positive) amount removed.
    pub fn adjust_negative(&mut self, key: &LotKey, qty: i64) -> DomainResult<Lot> {
        let lot = self.find_by_key(key).ok_or_else(|| DomainError::LotNotFound {
            item_id: key.item_id,
            location_id: key.location_id,
            lot_no: key.lot_no.clone(),
            expiry_date: key.expiry_date,
        })?;

        if qty > lot.qty_on_hand {
            return Err(DomainError::NegativeResult {
                lot_id: lot.lot_id,
                on_hand: lot.qty_on_hand,
                delta: -qty,
            });
        }

        let lot_id = lot.lot_id;
        self.decrement(lot_id, qty)
    }

    fn create(&mut self, key: &LotKey, vendor_id: Option<VendorId>, received_at: DateTime<Utc>) -> usize {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.insert(StagedLot {
            lot: Lot {
                lot_id: LotId::new(),
                key: key.clone(),
                vendor_id,
                received_at,
                unit_cost: Decimal::ZERO,
                qty_on_hand: 0,
                version: 0,
                sequence,
            },
            base_version: None,
            dirty: true,
        })
    }

    /// Finish the unit of work: every touched lot with its version guard.
    pub fn into_change_set(self) -> LotChangeSet {
        let changes = self
            .lots
            .into_iter()
            .filter(|s| s.dirty)
            .map(|s| LotChange {
                expected: match s.base_version {
                    Some(v) => ExpectedVersion::Exact(v),
                    None => ExpectedVersion::Absent,
                },
                lot: s.lot,
            })
            .collect();
        LotChangeSet { changes }
    }
}

fn checked_add(on_hand: i64, qty: i64) -> DomainResult<i64> {
    on_hand
        .checked_add(qty)
        .ok_or_else(|| DomainError::overflow(format!("{on_hand} + {qty} exceeds i64")))
}
