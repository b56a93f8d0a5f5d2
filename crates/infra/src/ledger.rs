//! Ledger reconstruction: running balances re-derived from the transaction log.
//!
//! Nothing here is persisted. Every call replays the committed transactions
//! ordered by `(date, sequence)`, explodes their lines into signed per-location
//! movements and accumulates a balance per (item, location).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{DomainError, DomainResult, ItemId, LocationId, LotId, TransactionId};
use lotstock_inventory::{StockBucket, Transaction, TransactionLine, TransactionType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
    /// Earlier transactions feed the balance but emit no rows.
    pub from: Option<DateTime<Utc>>,
    /// Later transactions are not replayed.
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn for_bucket(bucket: StockBucket) -> Self {
        Self {
            item_id: Some(bucket.item_id),
            location_id: Some(bucket.location_id),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(DomainError::validation(format!(
                "ledger range is inverted ({from} > {to})"
            ))),
            _ => Ok(()),
        }
    }

    fn matches(&self, bucket: StockBucket) -> bool {
        self.item_id.is_none_or(|id| id == bucket.item_id)
            && self.location_id.is_none_or(|id| id == bucket.location_id)
    }
}

/// One signed movement with the balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: DateTime<Utc>,
    pub txn_type: TransactionType,
    pub txn_id: TransactionId,
    pub sequence: u64,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub lot_id: Option<LotId>,
    pub lot_no: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    pub unit_cost: Decimal,
    pub balance: i64,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
}

struct Movement<'a> {
    line: &'a TransactionLine,
    bucket: StockBucket,
    lot_id: LotId,
    qty: i64,
}

/// Signed movements of one transaction. TRANSFER lines yield two.
fn explode(txn: &Transaction) -> Vec<Movement<'_>> {
    let mut out = Vec::with_capacity(txn.lines.len());
    for line in &txn.lines {
        let at = |location: Option<LocationId>, lot_id: LotId, qty: i64| {
            location.map(|location_id| Movement {
                line,
                bucket: StockBucket::new(line.item_id, location_id),
                lot_id,
                qty,
            })
        };
        match txn.txn_type {
            TransactionType::Receive => out.extend(at(txn.refs.to_location_id, line.lot_id, line.qty)),
            TransactionType::Issue => out.extend(at(txn.refs.from_location_id, line.lot_id, -line.qty)),
            TransactionType::Transfer => {
                out.extend(at(txn.refs.from_location_id, line.lot_id, -line.qty));
                let dest = line.dest_lot_id.unwrap_or(line.lot_id);
                out.extend(at(txn.refs.to_location_id, dest, line.qty));
            }
            TransactionType::Adjustment => {
                out.extend(at(txn.refs.to_location_id, line.lot_id, line.qty))
            }
        }
    }
    out
}

fn replay<'a>(
    transactions: &'a [Transaction],
    filter: &LedgerFilter,
    mut emit: impl FnMut(&'a Transaction, &Movement<'a>, i64),
) -> DomainResult<BTreeMap<StockBucket, i64>> {
    filter.validate()?;

    let mut ordered: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| filter.to.is_none_or(|to| t.date <= to))
        .collect();
    ordered.sort_by_key(|t| t.replay_key());

    let mut running: BTreeMap<StockBucket, i64> = BTreeMap::new();
    for txn in ordered {
        for movement in explode(txn) {
            if !filter.matches(movement.bucket) {
                continue;
            }
            let balance = running.entry(movement.bucket).or_insert(0);
            *balance = balance.checked_add(movement.qty).ok_or_else(|| {
                DomainError::overflow(format!(
                    "ledger balance of item {} at location {}",
                    movement.bucket.item_id, movement.bucket.location_id
                ))
            })?;
            if filter.from.is_none_or(|from| txn.date >= from) {
                emit(txn, &movement, *balance);
            }
        }
    }
    Ok(running)
}

/// Ledger rows for `filter`, in replay order.
pub fn reconstruct(
    transactions: &[Transaction],
    filter: &LedgerFilter,
) -> DomainResult<Vec<LedgerEntry>> {
    let mut entries = Vec::new();
    replay(transactions, filter, |txn, movement, balance| {
        entries.push(LedgerEntry {
            date: txn.date,
            txn_type: txn.txn_type,
            txn_id: txn.id,
            sequence: txn.sequence,
            item_id: movement.bucket.item_id,
            location_id: movement.bucket.location_id,
            lot_id: Some(movement.lot_id),
            lot_no: Some(movement.line.lot_no.clone()),
            expiry_date: movement.line.expiry_date,
            qty: movement.qty,
            unit_cost: movement.line.unit_cost,
            balance,
            reference_no: txn.refs.reference_no.clone(),
            notes: txn.refs.notes.clone(),
        });
    })?;
    Ok(entries)
}

/// Final replayed balance per (item, location) matching `filter`.
pub fn balances(
    transactions: &[Transaction],
    filter: &LedgerFilter,
) -> DomainResult<BTreeMap<StockBucket, i64>> {
    replay(transactions, filter, |_, _, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lotstock_inventory::TransactionRefs;

    fn day(d: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(d)
    }

    fn line(item: ItemId, lot: LotId, qty: i64) -> TransactionLine {
        TransactionLine {
            item_id: item,
            lot_id: lot,
            dest_lot_id: None,
            qty,
            unit_cost: Decimal::TWO,
            lot_no: "L1".to_string(),
            expiry_date: None,
        }
    }

    fn txn(
        sequence: u64,
        txn_type: TransactionType,
        date: DateTime<Utc>,
        refs: TransactionRefs,
        lines: Vec<TransactionLine>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            sequence,
            txn_type,
            date,
            refs,
            lines,
        }
    }

    fn to(loc: LocationId) -> TransactionRefs {
        TransactionRefs {
            to_location_id: Some(loc),
            ..TransactionRefs::default()
        }
    }

    fn from(loc: LocationId) -> TransactionRefs {
        TransactionRefs {
            from_location_id: Some(loc),
            ..TransactionRefs::default()
        }
    }

    #[test]
    fn transfer_explodes_into_both_locations() {
        let (a, b, item, lot, dest) = (
            LocationId::new(),
            LocationId::new(),
            ItemId::new(),
            LotId::new(),
            LotId::new(),
        );
        let mut transfer_line = line(item, lot, 4);
        transfer_line.dest_lot_id = Some(dest);
        let log = vec![
            txn(1, TransactionType::Receive, day(1), to(a), vec![line(item, lot, 10)]),
            txn(
                2,
                TransactionType::Transfer,
                day(2),
                TransactionRefs {
                    from_location_id: Some(a),
                    to_location_id: Some(b),
                    ..TransactionRefs::default()
                },
                vec![transfer_line],
            ),
        ];

        let rows = reconstruct(&log, &LedgerFilter::default()).unwrap();
        let summary: Vec<(LocationId, i64, i64)> =
            rows.iter().map(|r| (r.location_id, r.qty, r.balance)).collect();
        assert_eq!(summary, vec![(a, 10, 10), (a, -4, 6), (b, 4, 4)]);
        assert_eq!(rows[2].lot_id, Some(dest));

        let totals = balances(&log, &LedgerFilter::default()).unwrap();
        assert_eq!(totals.values().sum::<i64>(), 10);
    }

    #[test]
    fn replay_orders_by_date_then_sequence() {
        let (loc, item, lot) = (LocationId::new(), ItemId::new(), LotId::new());
        // Back-dated issue committed after a later-dated receipt.
        let log = vec![
            txn(1, TransactionType::Receive, day(1), to(loc), vec![line(item, lot, 5)]),
            txn(2, TransactionType::Receive, day(5), to(loc), vec![line(item, lot, 5)]),
            txn(3, TransactionType::Issue, day(3), from(loc), vec![line(item, lot, 2)]),
        ];

        let rows = reconstruct(&log, &LedgerFilter::default()).unwrap();
        let seqs: Vec<u64> = rows.iter().map(|r| r.sequence).collect();
        let bals: Vec<i64> = rows.iter().map(|r| r.balance).collect();
        assert_eq!(seqs, vec![1, 3, 2]);
        assert_eq!(bals, vec![5, 3, 8]);
    }

    #[test]
    fn range_start_carries_opening_balance() {
        let (loc, item, lot) = (LocationId::new(), ItemId::new(), LotId::new());
        let log = vec![
            txn(1, TransactionType::Receive, day(1), to(loc), vec![line(item, lot, 7)]),
            txn(2, TransactionType::Adjustment, day(4), to(loc), vec![line(item, lot, -1)]),
            txn(3, TransactionType::Issue, day(9), from(loc), vec![line(item, lot, 3)]),
        ];

        let filter = LedgerFilter {
            from: Some(day(2)),
            to: Some(day(5)),
            ..LedgerFilter::default()
        };
        let rows = reconstruct(&log, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].qty, rows[0].balance), (-1, 6));
    }

    #[test]
    fn filter_applies_after_exploding() {
        let (a, b, item, other) = (LocationId::new(), LocationId::new(), ItemId::new(), ItemId::new());
        let log = vec![
            txn(1, TransactionType::Receive, day(1), to(a), vec![line(item, LotId::new(), 3), line(other, LotId::new(), 9)]),
            txn(
                2,
                TransactionType::Transfer,
                day(2),
                TransactionRefs {
                    from_location_id: Some(a),
                    to_location_id: Some(b),
                    ..TransactionRefs::default()
                },
                vec![line(item, LotId::new(), 1)],
            ),
        ];

        let rows = reconstruct(&log, &LedgerFilter::for_bucket(StockBucket::new(item, b))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance, 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let filter = LedgerFilter {
            from: Some(day(3)),
            to: Some(day(1)),
            ..LedgerFilter::default()
        };
        assert!(reconstruct(&[], &filter).unwrap_err().is_validation());
    }

    #[test]
    fn balance_overflow_is_an_error_not_a_wrap() {
        let (loc, item) = (LocationId::new(), ItemId::new());
        let log = vec![
            txn(1, TransactionType::Receive, day(1), to(loc), vec![line(item, LotId::new(), i64::MAX)]),
            txn(2, TransactionType::Receive, day(2), to(loc), vec![line(item, LotId::new(), 1)]),
        ];
        assert!(matches!(
            balances(&log, &LedgerFilter::default()),
            Err(DomainError::Overflow(_))
        ));
    }
}
