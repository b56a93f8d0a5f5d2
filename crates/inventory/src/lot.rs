use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{ItemId, LocationId, LotId, VendorId};

/// Identity of a lot: at most one lot exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotKey {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub lot_no: String,
    /// `None` for non-expiring stock.
    pub expiry_date: Option<NaiveDate>,
}

impl LotKey {
    pub fn new(
        item_id: ItemId,
        location_id: LocationId,
        lot_no: impl Into<String>,
        expiry_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            item_id,
            location_id,
            lot_no: lot_no.into(),
            expiry_date,
        }
    }

    /// The (item, location) bucket this lot belongs to.
    pub fn bucket(&self) -> StockBucket {
        StockBucket::new(self.item_id, self.location_id)
    }

    /// Same lot identity, relocated.
    pub fn at(&self, location_id: LocationId) -> Self {
        Self {
            location_id,
            ..self.clone()
        }
    }
}

/// An (item, location) pair: the granularity of balances and FIFO selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockBucket {
    pub item_id: ItemId,
    pub location_id: LocationId,
}

impl StockBucket {
    pub fn new(item_id: ItemId, location_id: LocationId) -> Self {
        Self {
            item_id,
            location_id,
        }
    }
}

/// A receipt-identified batch of an item at a location.
///
/// Lots are never deleted; a lot at zero stays around as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_id: LotId,
    pub key: LotKey,
    pub vendor_id: Option<VendorId>,
    pub received_at: DateTime<Utc>,
    /// Last received cost (last-cost policy).
    pub unit_cost: Decimal,
    pub qty_on_hand: i64,
    /// Bumped by the store on every committed mutation.
    pub version: u64,
    /// Store-wide insertion order; breaks FIFO ties between equal `received_at`.
    pub sequence: u64,
}

impl Lot {
    pub fn item_id(&self) -> ItemId {
        self.key.item_id
    }

    pub fn location_id(&self) -> LocationId {
        self.key.location_id
    }

    pub fn bucket(&self) -> StockBucket {
        self.key.bucket()
    }

    pub fn is_consumable(&self) -> bool {
        self.qty_on_hand > 0
    }

    /// `qty_on_hand × unit_cost`. Commands cap unit cost at
    /// [`MAX_UNIT_COST`](crate::command::MAX_UNIT_COST), so this never overflows.
    pub fn worth(&self) -> Decimal {
        Decimal::from(self.qty_on_hand) * self.unit_cost
    }

    /// FIFO sort key: oldest receipt first, then creation order.
    pub fn fifo_key(&self) -> (DateTime<Utc>, u64) {
        (self.received_at, self.sequence)
    }
}
