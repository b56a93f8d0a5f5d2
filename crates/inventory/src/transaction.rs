//! Immutable transaction records (the append-only stock log).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotstock_core::{
    DepartmentId, DomainError, DomainResult, EncounterId, ItemId, LocationId, LotId, TransactionId,
    VendorId,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Receive,
    Issue,
    Transfer,
    Adjustment,
}

impl TransactionType {
    /// Stable type name (e.g. for logs and exports).
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receive => "RECEIVE",
            TransactionType::Issue => "ISSUE",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lot-level movement inside a transaction.
///
/// `qty` is positive for RECEIVE/ISSUE/TRANSFER (the sign follows from the
/// transaction type) and signed for ADJUSTMENT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub item_id: ItemId,
    pub lot_id: LotId,
    /// Destination lot of a TRANSFER line.
    pub dest_lot_id: Option<LotId>,
    pub qty: i64,
    pub unit_cost: Decimal,
    pub lot_no: String,
    pub expiry_date: Option<NaiveDate>,
}

impl TransactionLine {
    /// Bounded by `i64::MAX × MAX_UNIT_COST`, well inside `Decimal`.
    pub fn value(&self) -> Decimal {
        Decimal::from(self.qty) * self.unit_cost
    }
}

/// Header fields shared by the draft and the committed record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionRefs {
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub department_id: Option<DepartmentId>,
    pub encounter_id: Option<EncounterId>,
    pub vendor_id: Option<VendorId>,
}

/// A transaction that has been materialized but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub txn_type: TransactionType,
    pub date: DateTime<Utc>,
    pub refs: TransactionRefs,
    pub lines: Vec<TransactionLine>,
}

impl TransactionDraft {
    /// Assign identity and commit position.
    pub fn commit(self, id: TransactionId, sequence: u64) -> Transaction {
        Transaction {
            id,
            sequence,
            txn_type: self.txn_type,
            date: self.date,
            refs: self.refs,
            lines: self.lines,
        }
    }
}

/// A committed stock transaction. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Commit order assigned by the transaction log (1-based, gap-free).
    pub sequence: u64,
    pub txn_type: TransactionType,
    pub date: DateTime<Utc>,
    pub refs: TransactionRefs,
    pub lines: Vec<TransactionLine>,
}

impl Transaction {
    /// Sum of line values (`qty × unit_cost`), signed as recorded. For an
    /// ISSUE this is the FIFO cost of the goods issued.
    pub fn total_value(&self) -> DomainResult<Decimal> {
        self.lines.iter().try_fold(Decimal::ZERO, |total, line| {
            total
                .checked_add(line.value())
                .ok_or_else(|| DomainError::overflow(format!("value of transaction {}", self.id)))
        })
    }

    pub fn total_qty(&self) -> DomainResult<i64> {
        self.lines.iter().try_fold(0i64, |total, line| {
            total
                .checked_add(line.qty)
                .ok_or_else(|| DomainError::overflow(format!("quantity of transaction {}", self.id)))
        })
    }

    /// Replay ordering: business date first, then commit order.
    pub fn replay_key(&self) -> (DateTime<Utc>, u64) {
        (self.date, self.sequence)
    }
}
