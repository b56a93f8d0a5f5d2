//! Command handling: command + staged lot state → transaction draft.
//!
//! Handlers are deterministic apart from minting ids for new lots. They only
//! touch the workspace they are given; the caller decides whether the staged
//! changes are committed or discarded.

use lotstock_core::DomainResult;

use crate::command::{AdjustStock, IssueStock, ReceiveStock, StockCommand, TransferStock};
use crate::fifo::consume_fifo;
use crate::lot::{LotKey, StockBucket};
use crate::transaction::{TransactionDraft, TransactionLine, TransactionRefs, TransactionType};
use crate::workspace::{LotReceipt, LotWorkspace};

/// Apply a command to `ws` and materialize the transaction it produces.
///
/// On error the workspace may hold partially staged lines and must be
/// discarded.
pub fn handle(command: &StockCommand, ws: &mut LotWorkspace) -> DomainResult<TransactionDraft> {
    command.validate()?;
    match command {
        StockCommand::Receive(cmd) => handle_receive(cmd, ws),
        StockCommand::Issue(cmd) => handle_issue(cmd, ws),
        StockCommand::Transfer(cmd) => handle_transfer(cmd, ws),
        StockCommand::Adjust(cmd) => handle_adjust(cmd, ws),
    }
}

fn handle_receive(cmd: &ReceiveStock, ws: &mut LotWorkspace) -> DomainResult<TransactionDraft> {
    let mut lines = Vec::with_capacity(cmd.lines.len());
    for line in &cmd.lines {
        let key = LotKey::new(line.item_id, cmd.to_location_id, line.lot_no.clone(), line.expiry_date);
        let lot = ws.upsert_receive(LotReceipt {
            key,
            vendor_id: cmd.vendor_id,
            received_at: cmd.date,
            unit_cost: line.unit_cost,
            qty: line.qty,
        })?;
        lines.push(TransactionLine {
            item_id: line.item_id,
            lot_id: lot.lot_id,
            dest_lot_id: None,
            qty: line.qty,
            unit_cost: line.unit_cost,
            lot_no: lot.key.lot_no,
            expiry_date: lot.key.expiry_date,
        });
    }

    Ok(TransactionDraft {
        txn_type: TransactionType::Receive,
        date: cmd.date,
        refs: TransactionRefs {
            reference_no: cmd.reference_no.clone(),
            notes: cmd.notes.clone(),
            to_location_id: Some(cmd.to_location_id),
            vendor_id: cmd.vendor_id,
            ..TransactionRefs::default()
        },
        lines,
    })
}

fn handle_issue(cmd: &IssueStock, ws: &mut LotWorkspace) -> DomainResult<TransactionDraft> {
    let mut lines = Vec::new();
    for line in &cmd.lines {
        let bucket = StockBucket::new(line.item_id, cmd.from_location_id);
        for fragment in consume_fifo(ws, bucket, line.qty)? {
            lines.push(TransactionLine {
                item_id: line.item_id,
                lot_id: fragment.lot_id,
                dest_lot_id: None,
                qty: fragment.qty,
                unit_cost: fragment.unit_cost,
                lot_no: fragment.lot_no,
                expiry_date: fragment.expiry_date,
            });
        }
    }

    Ok(TransactionDraft {
        txn_type: TransactionType::Issue,
        date: cmd.date,
        refs: TransactionRefs {
            reference_no: cmd.reference_no.clone(),
            notes: cmd.notes.clone(),
            from_location_id: Some(cmd.from_location_id),
            department_id: Some(cmd.department_id),
            encounter_id: cmd.encounter_id,
            ..TransactionRefs::default()
        },
        lines,
    })
}

fn handle_transfer(cmd: &TransferStock, ws: &mut LotWorkspace) -> DomainResult<TransactionDraft> {
    let mut lines = Vec::new();
    for line in &cmd.lines {
        let source = StockBucket::new(line.item_id, cmd.from_location_id);
        for fragment in consume_fifo(ws, source, line.qty)? {
            // Lot number, expiry and cost travel with the stock.
            let key = LotKey::new(
                line.item_id,
                cmd.to_location_id,
                fragment.lot_no.clone(),
                fragment.expiry_date,
            );
            let dest = ws.upsert_receive(LotReceipt {
                key,
                vendor_id: fragment.vendor_id,
                received_at: cmd.date,
                unit_cost: fragment.unit_cost,
                qty: fragment.qty,
            })?;
            lines.push(TransactionLine {
                item_id: line.item_id,
                lot_id: fragment.lot_id,
                dest_lot_id: Some(dest.lot_id),
                qty: fragment.qty,
                unit_cost: fragment.unit_cost,
                lot_no: fragment.lot_no,
                expiry_date: fragment.expiry_date,
            });
        }
    }

    Ok(TransactionDraft {
        txn_type: TransactionType::Transfer,
        date: cmd.date,
        refs: TransactionRefs {
            reference_no: cmd.reference_no.clone(),
            notes: cmd.notes.clone(),
            from_location_id: Some(cmd.from_location_id),
            to_location_id: Some(cmd.to_location_id),
            ..TransactionRefs::default()
        },
        lines,
    })
}

fn handle_adjust(cmd: &AdjustStock, ws: &mut LotWorkspace) -> DomainResult<TransactionDraft> {
    let mut lines = Vec::with_capacity(cmd.lines.len());
    for line in &cmd.lines {
        let key = LotKey::new(line.item_id, cmd.location_id, line.lot_no.clone(), line.expiry_date);
        let lot = match line.qty {
            0 => continue,
            q if q > 0 => ws.adjust_positive(&key, q, line.unit_cost, cmd.date)?,
            q => ws.adjust_negative(&key, -q)?,
        };
        lines.push(TransactionLine {
            item_id: line.item_id,
            lot_id: lot.lot_id,
            dest_lot_id: None,
            qty: line.qty,
            unit_cost: lot.unit_cost,
            lot_no: lot.key.lot_no,
            expiry_date: lot.key.expiry_date,
        });
    }

    Ok(TransactionDraft {
        txn_type: TransactionType::Adjustment,
        date: cmd.date,
        refs: TransactionRefs {
            reference_no: cmd.reference_no.clone(),
            notes: cmd.notes.clone(),
            to_location_id: Some(cmd.location_id),
            ..TransactionRefs::default()
        },
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AdjustmentLine, QuantityLine, ReceiveLine};
    use chrono::{NaiveDate, Utc};
    use lotstock_core::{DepartmentId, DomainError, ItemId, LocationId};
    use rust_decimal::Decimal;

    fn receive(location: LocationId, item: ItemId, lot_no: &str, qty: i64) -> StockCommand {
        StockCommand::Receive(ReceiveStock {
            date: Utc::now(),
            to_location_id: location,
            vendor_id: None,
            reference_no: Some("GRN-1".to_string()),
            notes: None,
            lines: vec![ReceiveLine {
                item_id: item,
                lot_no: lot_no.to_string(),
                expiry_date: NaiveDate::from_ymd_opt(2026, 1, 1),
                qty,
                unit_cost: Decimal::new(20, 1),
            }],
        })
    }

    #[test]
    fn receive_materializes_one_line_per_received_lot() {
        let (loc, item) = (LocationId::new(), ItemId::new());
        let mut ws = LotWorkspace::default();

        let draft = handle(&receive(loc, item, "L100", 100), &mut ws).unwrap();
        assert_eq!(draft.txn_type, TransactionType::Receive);
        assert_eq!(draft.refs.to_location_id, Some(loc));
        assert_eq!(draft.refs.reference_no.as_deref(), Some("GRN-1"));
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].qty, 100);
        assert_eq!(ws.on_hand(StockBucket::new(item, loc)).unwrap(), 100);
    }

    #[test]
    fn transfer_recreates_lot_identity_at_destination() {
        let (a, b, item) = (LocationId::new(), LocationId::new(), ItemId::new());
        let mut ws = LotWorkspace::default();
        handle(&receive(a, item, "L100", 10), &mut ws).unwrap();

        let cmd = StockCommand::Transfer(TransferStock {
            date: Utc::now(),
            from_location_id: a,
            to_location_id: b,
            reference_no: None,
            notes: None,
            lines: vec![QuantityLine { item_id: item, qty: 4 }],
        });
        let draft = handle(&cmd, &mut ws).unwrap();

        assert_eq!(ws.on_hand(StockBucket::new(item, a)).unwrap(), 6);
        assert_eq!(ws.on_hand(StockBucket::new(item, b)).unwrap(), 4);
        let line = &draft.lines[0];
        let dest = ws.lot(line.dest_lot_id.unwrap()).unwrap();
        assert_eq!(dest.key.lot_no, "L100");
        assert_eq!(dest.key.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(dest.unit_cost, Decimal::new(20, 1));
        assert_ne!(dest.lot_id, line.lot_id);
    }

    #[test]
    fn issue_with_short_second_line_fails_whole_command() {
        let (loc, item, other) = (LocationId::new(), ItemId::new(), ItemId::new());
        let mut ws = LotWorkspace::default();
        handle(&receive(loc, item, "L1", 5), &mut ws).unwrap();

        let cmd = StockCommand::Issue(IssueStock {
            date: Utc::now(),
            from_location_id: loc,
            department_id: DepartmentId::new(),
            encounter_id: None,
            reference_no: None,
            notes: None,
            lines: vec![
                QuantityLine { item_id: item, qty: 2 },
                QuantityLine { item_id: other, qty: 1 },
            ],
        });
        let err = handle(&cmd, &mut ws).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(other, loc, 1));
    }

    #[test]
    fn adjustment_skips_zero_lines_and_records_signed_quantities() {
        let (loc, item) = (LocationId::new(), ItemId::new());
        let mut ws = LotWorkspace::default();
        handle(&receive(loc, item, "L1", 5), &mut ws).unwrap();

        let line = |qty| AdjustmentLine {
            item_id: item,
            lot_no: "L1".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            qty,
            unit_cost: None,
        };
        let cmd = StockCommand::Adjust(AdjustStock {
            date: Utc::now(),
            location_id: loc,
            reference_no: None,
            notes: Some("cycle count".to_string()),
            lines: vec![line(0), line(-2), line(1)],
        });
        let draft = handle(&cmd, &mut ws).unwrap();

        let qtys: Vec<i64> = draft.lines.iter().map(|l| l.qty).collect();
        assert_eq!(qtys, vec![-2, 1]);
        assert_eq!(ws.on_hand(StockBucket::new(item, loc)).unwrap(), 4);
        assert_eq!(draft.refs.to_location_id, Some(loc));
    }
}
