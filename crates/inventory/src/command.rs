//! Stock commands and their pre-mutation validation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{DepartmentId, DomainError, DomainResult, EncounterId, ItemId, LocationId, VendorId};

use crate::lot::StockBucket;
use crate::transaction::TransactionType;

/// A received lot line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub item_id: ItemId,
    pub lot_no: String,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    pub unit_cost: Decimal,
}

/// Command: ReceiveStock (goods received into a location).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub date: DateTime<Utc>,
    pub to_location_id: LocationId,
    pub vendor_id: Option<VendorId>,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<ReceiveLine>,
}

/// An (item, quantity) request satisfied by FIFO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityLine {
    pub item_id: ItemId,
    pub qty: i64,
}

/// Command: IssueStock (consumption by a department, optionally for an encounter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub date: DateTime<Utc>,
    pub from_location_id: LocationId,
    pub department_id: DepartmentId,
    pub encounter_id: Option<EncounterId>,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<QuantityLine>,
}

/// Command: TransferStock (move stock between two locations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub date: DateTime<Utc>,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<QuantityLine>,
}

/// A manual correction against an explicit lot. `qty` is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub item_id: ItemId,
    pub lot_no: String,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    /// Overwrites the lot's cost on positive adjustments when present.
    pub unit_cost: Option<Decimal>,
}

/// Command: AdjustStock (stock count corrections, found/lost stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub date: DateTime<Utc>,
    pub location_id: LocationId,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<AdjustmentLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Receive(ReceiveStock),
    Issue(IssueStock),
    Transfer(TransferStock),
    Adjust(AdjustStock),
}

impl StockCommand {
    pub fn txn_type(&self) -> TransactionType {
        match self {
            StockCommand::Receive(_) => TransactionType::Receive,
            StockCommand::Issue(_) => TransactionType::Issue,
            StockCommand::Transfer(_) => TransactionType::Transfer,
            StockCommand::Adjust(_) => TransactionType::Adjustment,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            StockCommand::Receive(c) => c.date,
            StockCommand::Issue(c) => c.date,
            StockCommand::Transfer(c) => c.date,
            StockCommand::Adjust(c) => c.date,
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            StockCommand::Receive(c) => c.lines.len(),
            StockCommand::Issue(c) => c.lines.len(),
            StockCommand::Transfer(c) => c.lines.len(),
            StockCommand::Adjust(c) => c.lines.len(),
        }
    }

    /// Every (item, location) whose lots the command may read or write.
    ///
    /// Sorted and de-duplicated so callers get a stable snapshot order.
    pub fn touched_buckets(&self) -> Vec<StockBucket> {
        let mut buckets: Vec<StockBucket> = match self {
            StockCommand::Receive(c) => c
                .lines
                .iter()
                .map(|l| StockBucket::new(l.item_id, c.to_location_id))
                .collect(),
            StockCommand::Issue(c) => c
                .lines
                .iter()
                .map(|l| StockBucket::new(l.item_id, c.from_location_id))
                .collect(),
            StockCommand::Transfer(c) => c
                .lines
                .iter()
                .flat_map(|l| {
                    [
                        StockBucket::new(l.item_id, c.from_location_id),
                        StockBucket::new(l.item_id, c.to_location_id),
                    ]
                })
                .collect(),
            StockCommand::Adjust(c) => c
                .lines
                .iter()
                .map(|l| StockBucket::new(l.item_id, c.location_id))
                .collect(),
        };
        buckets.sort();
        buckets.dedup();
        buckets
    }

    /// Shape/range validation. Runs before any lot is read or staged.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            StockCommand::Receive(c) => validate_receive(c),
            StockCommand::Issue(c) => validate_issue(c),
            StockCommand::Transfer(c) => validate_transfer(c),
            StockCommand::Adjust(c) => validate_adjust(c),
        }
    }
}

fn validate_receive(cmd: &ReceiveStock) -> DomainResult<()> {
    ensure_lines(cmd.lines.len())?;
    ensure_location(cmd.to_location_id, "to_location_id")?;
    for (idx, line) in cmd.lines.iter().enumerate() {
        ensure_item(line.item_id, idx)?;
        ensure_lot_no(&line.lot_no, idx)?;
        ensure_positive(line.qty, idx)?;
        ensure_cost(line.unit_cost, idx)?;
    }
    Ok(())
}

fn validate_issue(cmd: &IssueStock) -> DomainResult<()> {
    ensure_lines(cmd.lines.len())?;
    ensure_location(cmd.from_location_id, "from_location_id")?;
    if cmd.department_id.as_uuid().is_nil() {
        return Err(DomainError::validation("department_id is required"));
    }
    validate_quantity_lines(&cmd.lines)
}

fn validate_transfer(cmd: &TransferStock) -> DomainResult<()> {
    ensure_lines(cmd.lines.len())?;
    ensure_location(cmd.from_location_id, "from_location_id")?;
    ensure_location(cmd.to_location_id, "to_location_id")?;
    if cmd.from_location_id == cmd.to_location_id {
        return Err(DomainError::SameLocation(cmd.from_location_id));
    }
    validate_quantity_lines(&cmd.lines)
}

fn validate_adjust(cmd: &AdjustStock) -> DomainResult<()> {
    ensure_lines(cmd.lines.len())?;
    ensure_location(cmd.location_id, "location_id")?;
    for (idx, line) in cmd.lines.iter().enumerate() {
        ensure_item(line.item_id, idx)?;
        ensure_lot_no(&line.lot_no, idx)?;
        if let Some(cost) = line.unit_cost {
            ensure_cost(cost, idx)?;
        }
    }
    Ok(())
}

fn validate_quantity_lines(lines: &[QuantityLine]) -> DomainResult<()> {
    for (idx, line) in lines.iter().enumerate() {
        ensure_item(line.item_id, idx)?;
        ensure_positive(line.qty, idx)?;
    }
    Ok(())
}

fn ensure_lines(count: usize) -> DomainResult<()> {
    if count == 0 {
        return Err(DomainError::validation("command has no lines"));
    }
    Ok(())
}

fn ensure_location(location_id: LocationId, field: &str) -> DomainResult<()> {
    if location_id.as_uuid().is_nil() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn ensure_item(item_id: ItemId, idx: usize) -> DomainResult<()> {
    if item_id.as_uuid().is_nil() {
        return Err(DomainError::validation(format!("line {idx}: item_id is required")));
    }
    Ok(())
}

fn ensure_lot_no(lot_no: &str, idx: usize) -> DomainResult<()> {
    if lot_no.trim().is_empty() {
        return Err(DomainError::validation(format!("line {idx}: lot_no cannot be empty")));
    }
    Ok(())
}

/// Largest accepted unit cost. Keeps `i64::MAX × unit_cost` inside `Decimal`.
pub const MAX_UNIT_COST: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn ensure_cost(cost: Decimal, idx: usize) -> DomainResult<()> {
    if cost < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "line {idx}: unit_cost cannot be negative"
        )));
    }
    if cost > MAX_UNIT_COST {
        return Err(DomainError::validation(format!(
            "line {idx}: unit_cost {cost} exceeds {MAX_UNIT_COST}"
        )));
    }
    Ok(())
}

fn ensure_positive(qty: i64, idx: usize) -> DomainResult<()> {
    if qty <= 0 {
        return Err(DomainError::validation(format!(
            "line {idx}: qty must be positive (got {qty})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nil_location() -> LocationId {
        LocationId::from_uuid(Default::default())
    }

    fn issue(lines: Vec<QuantityLine>) -> StockCommand {
        StockCommand::Issue(IssueStock {
            date: Utc::now(),
            from_location_id: LocationId::new(),
            department_id: DepartmentId::new(),
            encounter_id: None,
            reference_no: None,
            notes: None,
            lines,
        })
    }

    #[test]
    fn empty_commands_are_rejected() {
        let err = issue(vec![]).validate().unwrap_err();
        assert_eq!(err, DomainError::validation("command has no lines"));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        for qty in [0, -4] {
            let cmd = issue(vec![QuantityLine {
                item_id: ItemId::new(),
                qty,
            }]);
            assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn transfer_to_same_location_is_rejected() {
        let loc = LocationId::new();
        let cmd = StockCommand::Transfer(TransferStock {
            date: Utc::now(),
            from_location_id: loc,
            to_location_id: loc,
            reference_no: None,
            notes: None,
            lines: vec![QuantityLine {
                item_id: ItemId::new(),
                qty: 1,
            }],
        });
        assert_eq!(cmd.validate(), Err(DomainError::SameLocation(loc)));
    }

    #[test]
    fn receive_rejects_negative_cost_and_missing_location() {
        let line = ReceiveLine {
            item_id: ItemId::new(),
            lot_no: "L1".to_string(),
            expiry_date: None,
            qty: 1,
            unit_cost: Decimal::new(-1, 0),
        };
        let mut cmd = ReceiveStock {
            date: Utc::now(),
            to_location_id: LocationId::new(),
            vendor_id: None,
            reference_no: None,
            notes: None,
            lines: vec![line],
        };
        assert!(StockCommand::Receive(cmd.clone()).validate().is_err());

        cmd.lines[0].unit_cost = Decimal::ZERO;
        assert!(StockCommand::Receive(cmd.clone()).validate().is_ok());

        cmd.lines[0].unit_cost = MAX_UNIT_COST;
        assert!(StockCommand::Receive(cmd.clone()).validate().is_ok());
        cmd.lines[0].unit_cost = MAX_UNIT_COST + Decimal::ONE;
        assert!(matches!(
            StockCommand::Receive(cmd.clone()).validate(),
            Err(DomainError::Validation(_))
        ));
        cmd.lines[0].unit_cost = Decimal::ZERO;

        cmd.to_location_id = nil_location();
        assert!(StockCommand::Receive(cmd).validate().is_err());
    }

    #[test]
    fn adjustment_allows_signed_and_zero_quantities() {
        let lines = [-3, 0, 5]
            .into_iter()
            .map(|qty| AdjustmentLine {
                item_id: ItemId::new(),
                lot_no: "L9".to_string(),
                expiry_date: None,
                qty,
                unit_cost: None,
            })
            .collect();
        let cmd = StockCommand::Adjust(AdjustStock {
            date: Utc::now(),
            location_id: LocationId::new(),
            reference_no: None,
            notes: None,
            lines,
        });
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn transfer_touches_both_sides() {
        let item = ItemId::new();
        let (a, b) = (LocationId::new(), LocationId::new());
        let cmd = StockCommand::Transfer(TransferStock {
            date: Utc::now(),
            from_location_id: a,
            to_location_id: b,
            reference_no: None,
            notes: None,
            lines: vec![
                QuantityLine { item_id: item, qty: 1 },
                QuantityLine { item_id: item, qty: 2 },
            ],
        });
        let buckets = cmd.touched_buckets();
        assert_eq!(buckets.len(), 2);
        assert!(buckets.contains(&StockBucket::new(item, a)));
        assert!(buckets.contains(&StockBucket::new(item, b)));
    }
}
