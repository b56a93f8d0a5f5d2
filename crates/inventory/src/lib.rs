//! Inventory domain module (lot-tracked, FIFO).
//!
//! This crate contains the business rules for stock movements, implemented
//! purely as deterministic domain logic (no IO, no storage). Infrastructure
//! loads lot snapshots into a [`LotWorkspace`], runs [`handle`] and commits
//! the resulting change set together with the transaction draft.

pub mod command;
pub mod fifo;
pub mod handler;
pub mod lot;
pub mod transaction;
pub mod workspace;

pub use command::{
    AdjustStock, AdjustmentLine, IssueStock, MAX_UNIT_COST, QuantityLine, ReceiveLine,
    ReceiveStock, StockCommand, TransferStock,
};
pub use fifo::{ConsumedFragment, consume_fifo};
pub use handler::handle;
pub use lot::{Lot, LotKey, StockBucket};
pub use transaction::{
    Transaction, TransactionDraft, TransactionLine, TransactionRefs, TransactionType,
};
pub use workspace::{LotChange, LotChangeSet, LotReceipt, LotWorkspace};
