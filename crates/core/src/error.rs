//! Domain error model.

use chrono::NaiveDate;
use thiserror::Error;

use crate::id::{ItemId, LocationId, LotId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are deterministic business failures: retrying the same command
/// against the same stock will fail the same way. Storage conflicts and other
/// infrastructure concerns are modelled in the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A command or filter failed shape/range validation. Raised before any
    /// stock is touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// FIFO consumption ran out of lots before the requested quantity was met.
    #[error("insufficient stock for item {item_id} at location {location_id} (short by {shortfall})")]
    InsufficientStock {
        item_id: ItemId,
        location_id: LocationId,
        shortfall: i64,
    },

    /// A negative adjustment targeted a lot that does not exist.
    #[error("lot '{lot_no}' (expiry {expiry_date:?}) not found for item {item_id} at location {location_id}")]
    LotNotFound {
        item_id: ItemId,
        location_id: LocationId,
        lot_no: String,
        expiry_date: Option<NaiveDate>,
    },

    /// An adjustment would drive a lot's on-hand quantity below zero.
    #[error("adjusting lot {lot_id} by {delta} would leave {} on hand", .on_hand + .delta)]
    NegativeResult {
        lot_id: LotId,
        on_hand: i64,
        delta: i64,
    },

    /// A transfer named the same location as source and destination.
    #[error("transfer source and destination are both location {0}")]
    SameLocation(LocationId),

    /// A quantity or money total left the representable range. Raised while
    /// staging or aggregating, after validation has passed.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn insufficient_stock(item_id: ItemId, location_id: LocationId, shortfall: i64) -> Self {
        Self::InsufficientStock {
            item_id,
            location_id,
            shortfall,
        }
    }

    /// True for failures that were detected before any stock was consulted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::SameLocation(_) | Self::InvalidId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_result_message_reports_resulting_quantity() {
        let err = DomainError::NegativeResult {
            lot_id: LotId::new(),
            on_hand: 2,
            delta: -5,
        };
        assert!(err.to_string().ends_with("would leave -3 on hand"));
    }

    #[test]
    fn validation_classification() {
        assert!(DomainError::validation("qty must be positive").is_validation());
        assert!(DomainError::SameLocation(LocationId::new()).is_validation());
        assert!(
            !DomainError::insufficient_stock(ItemId::new(), LocationId::new(), 3).is_validation()
        );
        assert!(!DomainError::overflow("bucket total").is_validation());
    }
}
