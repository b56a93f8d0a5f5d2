//! FIFO consumption engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lotstock_core::{DomainError, DomainResult, LotId, VendorId};

use crate::lot::StockBucket;
use crate::workspace::LotWorkspace;

/// The part of one lot consumed by a FIFO request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedFragment {
    pub lot_id: LotId,
    pub qty: i64,
    pub unit_cost: Decimal,
    pub lot_no: String,
    pub expiry_date: Option<NaiveDate>,
    pub vendor_id: Option<VendorId>,
}

/// Deplete `qty` units from `bucket`, oldest-received lots first.
///
/// Availability is checked up front: on `InsufficientStock` nothing has been
/// staged. Fragments are returned in consumption order.
pub fn consume_fifo(
    ws: &mut LotWorkspace,
    bucket: StockBucket,
    qty: i64,
) -> DomainResult<Vec<ConsumedFragment>> {
    if qty <= 0 {
        return Err(DomainError::validation(format!(
            "consumption qty must be positive (got {qty})"
        )));
    }

    let available = ws.on_hand(bucket)?;
    if available < qty {
        return Err(DomainError::insufficient_stock(
            bucket.item_id,
            bucket.location_id,
            qty - available,
        ));
    }

    let plan: Vec<(LotId, i64)> = {
        let mut remaining = qty;
        let mut plan = Vec::new();
        for lot in ws.find_consumable_lots(bucket) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.qty_on_hand);
            plan.push((lot.lot_id, take));
            remaining -= take;
        }
        plan
    };

    let mut fragments = Vec::with_capacity(plan.len());
    for (lot_id, take) in plan {
        let lot = ws.decrement(lot_id, take)?;
        debug!(
            item_id = %bucket.item_id,
            location_id = %bucket.location_id,
            lot_no = %lot.key.lot_no,
            take,
            left = lot.qty_on_hand,
            "fifo consumed"
        );
        fragments.push(ConsumedFragment {
            lot_id,
            qty: take,
            unit_cost: lot.unit_cost,
            lot_no: lot.key.lot_no,
            expiry_date: lot.key.expiry_date,
            vendor_id: lot.vendor_id,
        });
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::{Lot, LotKey};
    use chrono::{DateTime, Duration, Utc};
    use lotstock_core::{ItemId, LocationId};
    use proptest::prelude::*;

    fn lot(bucket: StockBucket, lot_no: &str, day: i64, qty: i64, cost: i64, sequence: u64) -> Lot {
        Lot {
            lot_id: LotId::new(),
            key: LotKey::new(bucket.item_id, bucket.location_id, lot_no, None),
            vendor_id: None,
            received_at: DateTime::<Utc>::UNIX_EPOCH + Duration::days(day),
            unit_cost: Decimal::from(cost),
            qty_on_hand: qty,
            version: 1,
            sequence,
        }
    }

    fn bucket() -> StockBucket {
        StockBucket::new(ItemId::new(), LocationId::new())
    }

    #[test]
    fn issue_spans_lots_oldest_first() {
        let b = bucket();
        let l1 = lot(b, "L1", 1, 5, 2, 1);
        let l2 = lot(b, "L2", 2, 5, 3, 2);
        let (id1, id2) = (l1.lot_id, l2.lot_id);
        // Snapshot order deliberately newest-first.
        let mut ws = LotWorkspace::from_snapshot([l2, l1]);

        let fragments = consume_fifo(&mut ws, b, 7).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!((fragments[0].lot_id, fragments[0].qty), (id1, 5));
        assert_eq!((fragments[1].lot_id, fragments[1].qty), (id2, 2));
        assert_eq!(ws.lot(id1).unwrap().qty_on_hand, 0);
        assert_eq!(ws.lot(id2).unwrap().qty_on_hand, 3);

        // Each fragment is costed at its own lot's cost.
        assert_eq!(fragments[0].unit_cost, Decimal::from(2));
        assert_eq!(fragments[1].unit_cost, Decimal::from(3));
    }

    #[test]
    fn shortfall_leaves_workspace_untouched() {
        let b = bucket();
        let l1 = lot(b, "L1", 1, 4, 1, 1);
        let id = l1.lot_id;
        let mut ws = LotWorkspace::from_snapshot([l1]);

        let err = consume_fifo(&mut ws, b, 10).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(b.item_id, b.location_id, 6));
        assert_eq!(ws.lot(id).unwrap().qty_on_hand, 4);
        assert!(ws.into_change_set().is_empty());
    }

    #[test]
    fn other_buckets_are_never_consumed() {
        let b = bucket();
        let other = StockBucket::new(b.item_id, LocationId::new());
        let mut ws = LotWorkspace::from_snapshot([lot(other, "X", 0, 50, 1, 1)]);
        assert!(matches!(
            consume_fifo(&mut ws, b, 1),
            Err(DomainError::InsufficientStock { shortfall: 1, .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: FIFO either fully satisfies the request from the oldest lots
        /// or fails without touching anything; no lot ever goes negative.
        #[test]
        fn fifo_conserves_quantity(
            lots in prop::collection::vec((0i64..30, 0i64..20), 1..8),
            request in 1i64..120,
        ) {
            let b = bucket();
            let snapshot: Vec<Lot> = lots
                .iter()
                .enumerate()
                .map(|(i, (day, qty))| lot(b, &format!("L{i}"), *day, *qty, 1, i as u64 + 1))
                .collect();
            let before: i64 = snapshot.iter().map(|l| l.qty_on_hand).sum();
            let mut ws = LotWorkspace::from_snapshot(snapshot);

            match consume_fifo(&mut ws, b, request) {
                Ok(fragments) => {
                    let taken: i64 = fragments.iter().map(|f| f.qty).sum();
                    prop_assert_eq!(taken, request);
                    prop_assert_eq!(ws.on_hand(b).unwrap(), before - request);
                    // Every lot older than the last one touched must be empty.
                    let last = fragments.last().map(|f| f.lot_id);
                    let last_key = last.and_then(|id| ws.lot(id)).map(|l| l.fifo_key());
                    if let Some(last_key) = last_key {
                        for l in ws.find_consumable_lots(b) {
                            prop_assert!(l.fifo_key() >= last_key);
                        }
                    }
                }
                Err(DomainError::InsufficientStock { shortfall, .. }) => {
                    prop_assert_eq!(shortfall, request - before);
                    prop_assert_eq!(ws.on_hand(b).unwrap(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
            for l in ws.find_consumable_lots(b) {
                prop_assert!(l.qty_on_hand >= 0);
            }
        }
    }
}
