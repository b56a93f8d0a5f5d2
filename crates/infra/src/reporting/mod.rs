//! Read-only reports over committed lot state and the transaction log.
//!
//! Every report copies a snapshot out of the store under a shared read guard
//! and aggregates outside of it, so reports never block one another and see
//! only committed transactions.

mod rows;

pub use rows::{
    BalanceMismatch, ExpiringFilter, ExpiringRow, LowStockFilter, LowStockRow,
    ReconciliationReport, StockFilter, StockSummaryRow, ValuationFilter, ValuationReport,
};

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use lotstock_core::{DomainError, ItemId, LotId, TransactionId};
use lotstock_inventory::{Lot, StockBucket, Transaction};

use crate::catalog::ItemCatalog;
use crate::ledger::{self, LedgerEntry, LedgerFilter};
use crate::store::{LotStore, StoreError, TransactionLog};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Rejected filter, or a total that does not fit its type.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct ReportingEngine<S, C> {
    store: S,
    catalog: C,
}

impl<S, C> ReportingEngine<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self { store, catalog }
    }
}

impl<S, C> ReportingEngine<S, C>
where
    S: LotStore + TransactionLog,
    C: ItemCatalog,
{
    /// Σqty and Σ(qty × unit_cost) per (item, location).
    pub fn stock_summary(&self, filter: &StockFilter) -> Result<Vec<StockSummaryRow>, ReportError> {
        let lots = self.store.list_lots()?;
        let rows = aggregate(lots.iter().filter(|l| filter.matches(l.bucket())))?;
        Ok(rows
            .into_iter()
            .filter(|r| filter.include_empty || r.qty_on_hand != 0)
            .collect())
    }

    /// Stock summary restricted to lots received by `as_of`, with grand totals.
    pub fn valuation(&self, filter: &ValuationFilter) -> Result<ValuationReport, ReportError> {
        let lots = self.store.list_lots()?;
        let scope = StockFilter {
            item_id: filter.item_id,
            location_id: filter.location_id,
            include_empty: false,
        };
        let rows: Vec<StockSummaryRow> = aggregate(lots.iter().filter(|l| {
            scope.matches(l.bucket()) && filter.as_of.is_none_or(|cutoff| l.received_at <= cutoff)
        }))?
        .into_iter()
        .filter(|r| r.qty_on_hand != 0)
        .collect();

        let mut total_qty = 0i64;
        let mut total_worth = Decimal::ZERO;
        for row in &rows {
            total_qty = add_qty(total_qty, row.qty_on_hand, || "valuation quantity".into())?;
            total_worth = total_worth
                .checked_add(row.worth)
                .ok_or_else(|| DomainError::overflow("valuation worth"))?;
        }
        Ok(ValuationReport {
            rows,
            total_qty,
            total_worth,
        })
    }

    /// On-hand per item against catalog thresholds.
    ///
    /// Covers every active catalog item plus any stocked item the catalog
    /// does not know (those have no threshold and are never low).
    pub fn low_stock(&self, filter: &LowStockFilter) -> Result<Vec<LowStockRow>, ReportError> {
        let lots = self.store.list_lots()?;
        let mut on_hand: BTreeMap<ItemId, i64> = BTreeMap::new();
        for lot in lots
            .iter()
            .filter(|l| filter.location_id.is_none_or(|id| id == l.location_id()))
        {
            let qty = on_hand.entry(lot.item_id()).or_insert(0);
            *qty = add_qty(*qty, lot.qty_on_hand, || format!("on hand of item {}", lot.item_id()))?;
        }

        let mut rows = Vec::new();
        let mut seen: BTreeSet<ItemId> = BTreeSet::new();
        for item in self.catalog.list() {
            seen.insert(item.item_id);
            if !item.active {
                continue;
            }
            let qty = on_hand.get(&item.item_id).copied().unwrap_or(0);
            let threshold = item.threshold();
            rows.push(LowStockRow {
                item_id: item.item_id,
                name: Some(item.name),
                unit: Some(item.unit),
                on_hand: qty,
                threshold,
                max_stock: item.max_stock,
                is_low: threshold.is_some_and(|t| qty <= t),
                is_overstocked: item.max_stock.is_some_and(|max| qty > max),
            });
        }
        for (&item_id, &qty) in &on_hand {
            if seen.contains(&item_id) || qty == 0 {
                continue;
            }
            debug!(%item_id, qty, "stocked item missing from catalog");
            rows.push(LowStockRow {
                item_id,
                name: None,
                unit: None,
                on_hand: qty,
                threshold: None,
                max_stock: None,
                is_low: false,
                is_overstocked: false,
            });
        }

        rows.sort_by_key(|r| r.item_id);
        if filter.only_low {
            rows.retain(|r| r.is_low);
        }
        Ok(rows)
    }

    /// Lots with stock whose expiry falls in `[from, to]`, soonest first.
    pub fn expiring(&self, filter: &ExpiringFilter) -> Result<Vec<ExpiringRow>, ReportError> {
        if filter.from > filter.to {
            return Err(DomainError::validation(format!(
                "expiry window is inverted ({} > {})",
                filter.from, filter.to
            ))
            .into());
        }

        let lots = self.store.list_lots()?;
        let mut rows: Vec<ExpiringRow> = lots
            .into_iter()
            .filter(|l| l.is_consumable())
            .filter(|l| filter.item_id.is_none_or(|id| id == l.item_id()))
            .filter(|l| filter.location_id.is_none_or(|id| id == l.location_id()))
            .filter_map(|l| {
                let expiry = l.key.expiry_date?;
                if expiry < filter.from || expiry > filter.to {
                    return None;
                }
                Some(ExpiringRow {
                    lot_id: l.lot_id,
                    item_id: l.item_id(),
                    location_id: l.location_id(),
                    worth: l.worth(),
                    lot_no: l.key.lot_no,
                    expiry_date: expiry,
                    received_at: l.received_at,
                    qty_on_hand: l.qty_on_hand,
                    unit_cost: l.unit_cost,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            (a.expiry_date, a.received_at, a.lot_id).cmp(&(b.expiry_date, b.received_at, b.lot_id))
        });
        Ok(rows)
    }

    pub fn lot(&self, lot_id: LotId) -> Result<Option<Lot>, ReportError> {
        Ok(self.store.get_lot(lot_id)?)
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, ReportError> {
        Ok(self.store.get_transaction(id)?)
    }

    /// Running-balance ledger replayed from the transaction log.
    pub fn ledger(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, ReportError> {
        filter.validate()?;
        let transactions = self.store.transactions()?;
        Ok(ledger::reconstruct(&transactions, filter)?)
    }

    /// Compare Σ lot quantities with ledger balances for every (item, location).
    pub fn reconcile(&self) -> Result<ReconciliationReport, ReportError> {
        let snapshot = self.store.snapshot()?;
        let ledger_balances = ledger::balances(&snapshot.transactions, &LedgerFilter::default())?;

        let mut lot_balances: BTreeMap<StockBucket, i64> = BTreeMap::new();
        for lot in &snapshot.lots {
            let qty = lot_balances.entry(lot.bucket()).or_insert(0);
            *qty = add_qty(*qty, lot.qty_on_hand, || format!("lot total of item {}", lot.item_id()))?;
        }

        let buckets: BTreeSet<StockBucket> = lot_balances
            .keys()
            .chain(ledger_balances.keys())
            .copied()
            .collect();

        let mut report = ReconciliationReport {
            checked: buckets.len(),
            as_of_sequence: snapshot.transactions.iter().map(|t| t.sequence).max().unwrap_or(0),
            mismatches: Vec::new(),
        };
        for bucket in buckets {
            let lot_qty = lot_balances.get(&bucket).copied().unwrap_or(0);
            let ledger_qty = ledger_balances.get(&bucket).copied().unwrap_or(0);
            if lot_qty != ledger_qty {
                warn!(
                    item_id = %bucket.item_id,
                    location_id = %bucket.location_id,
                    lot_qty,
                    ledger_qty,
                    "lot state diverges from ledger"
                );
                report.mismatches.push(BalanceMismatch {
                    item_id: bucket.item_id,
                    location_id: bucket.location_id,
                    lot_qty,
                    ledger_qty,
                });
            }
        }
        Ok(report)
    }
}

fn aggregate<'a>(lots: impl Iterator<Item = &'a Lot>) -> Result<Vec<StockSummaryRow>, DomainError> {
    let mut groups: BTreeMap<StockBucket, StockSummaryRow> = BTreeMap::new();
    for lot in lots {
        groups
            .entry(lot.bucket())
            .or_insert_with(|| StockSummaryRow::empty(lot.bucket()))
            .add(lot)?;
    }
    Ok(groups.into_values().collect())
}

pub(crate) fn add_qty(
    total: i64,
    qty: i64,
    what: impl FnOnce() -> String,
) -> Result<i64, DomainError> {
    total
        .checked_add(qty)
        .ok_or_else(|| DomainError::overflow(what()))
}
