//! Infrastructure layer: lot storage, command processing, ledger, reports.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod processor;
pub mod reporting;
pub mod store;


pub use catalog::{InMemoryItemCatalog, ItemCatalog, ItemThresholds};
pub use config::{ProcessorConfig, RetryPolicy};
pub use engine::InventoryEngine;
pub use ledger::{LedgerEntry, LedgerFilter};
pub use processor::{ProcessError, TransactionProcessor};
pub use reporting::{ReportError, ReportingEngine};
pub use store::{InMemoryInventoryStore, LotStore, StoreError, StoreSnapshot, TransactionLog};
