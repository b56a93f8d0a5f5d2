//! Report filters and row shapes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{DomainError, ItemId, LocationId, LotId};
use lotstock_inventory::{Lot, StockBucket};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockFilter {
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
    /// Keep (item, location) groups whose lots are all at zero.
    pub include_empty: bool,
}

impl StockFilter {
    pub(crate) fn matches(&self, bucket: StockBucket) -> bool {
        self.item_id.is_none_or(|id| id == bucket.item_id)
            && self.location_id.is_none_or(|id| id == bucket.location_id)
    }
}

/// On-hand position of one item at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryRow {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub qty_on_hand: i64,
    pub worth: Decimal,
    /// Lots with stock remaining.
    pub lot_count: usize,
}

impl StockSummaryRow {
    pub(crate) fn empty(bucket: StockBucket) -> Self {
        Self {
            item_id: bucket.item_id,
            location_id: bucket.location_id,
            qty_on_hand: 0,
            worth: Decimal::ZERO,
            lot_count: 0,
        }
    }

    pub(crate) fn add(&mut self, lot: &Lot) -> Result<(), DomainError> {
        let (item_id, location_id) = (self.item_id, self.location_id);
        let what = move || format!("item {item_id} at location {location_id}");
        self.qty_on_hand = super::add_qty(self.qty_on_hand, lot.qty_on_hand, what)?;
        self.worth = self
            .worth
            .checked_add(lot.worth())
            .ok_or_else(|| DomainError::overflow(what()))?;
        if lot.is_consumable() {
            self.lot_count += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationFilter {
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
    /// Only lots received at or before this instant.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationReport {
    pub rows: Vec<StockSummaryRow>,
    pub total_qty: i64,
    pub total_worth: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockFilter {
    /// Restrict on-hand to one location (default: all locations).
    pub location_id: Option<LocationId>,
    pub only_low: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockRow {
    pub item_id: ItemId,
    /// `None` for stocked items missing from the catalog.
    pub name: Option<String>,
    pub unit: Option<String>,
    pub on_hand: i64,
    pub threshold: Option<i64>,
    pub max_stock: Option<i64>,
    pub is_low: bool,
    pub is_overstocked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
}

impl ExpiringFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            item_id: None,
            location_id: None,
        }
    }

    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringRow {
    pub lot_id: LotId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub lot_no: String,
    pub expiry_date: NaiveDate,
    pub received_at: DateTime<Utc>,
    pub qty_on_hand: i64,
    pub unit_cost: Decimal,
    pub worth: Decimal,
}

/// A (item, location) where lot state and ledger disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub lot_qty: i64,
    pub ledger_qty: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Number of (item, location) pairs compared.
    pub checked: usize,
    /// Sequence of the last transaction included.
    pub as_of_sequence: u64,
    pub mismatches: Vec<BalanceMismatch>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}
