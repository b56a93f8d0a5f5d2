//! `lotstock-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error taxonomy and optimistic-concurrency
//! version expectations.

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{DepartmentId, EncounterId, ItemId, LocationId, LotId, TransactionId, VendorId};
pub use version::ExpectedVersion;
