//! Lot store and append-only transaction log boundary.
//!
//! This module defines the infrastructure-facing abstractions for lot state
//! and the transaction log without making any storage assumptions, plus an
//! in-memory implementation used by tests and embedded callers.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use r#trait::{LotStore, StoreError, StoreSnapshot, TransactionLog};
