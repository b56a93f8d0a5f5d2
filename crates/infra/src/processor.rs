//! Transaction processor (application-level orchestration of stock commands).
//!
//! ```text
//! Command
//!   ↓
//! 1. Validate shape (no IO)
//!   ↓
//! 2. Snapshot the lots of every touched (item, location), with versions
//!   ↓
//! 3. Handle command against a LotWorkspace (pure, produces change set + draft)
//!   ↓
//! 4. Commit change set and append transaction atomically (version-checked)
//!   ↓
//! 5. On version conflict: back off and start over from 2
//! ```
//!
//! A failed attempt leaves nothing behind: the workspace is simply dropped.
//! Only store conflicts are retried; domain errors surface immediately.

use std::thread;

use thiserror::Error;
use tracing::{info, instrument, warn};

use lotstock_core::DomainError;
use lotstock_inventory::{
    AdjustStock, IssueStock, LotWorkspace, ReceiveStock, StockCommand, Transaction, TransferStock,
    handle,
};

use crate::config::ProcessorConfig;
use crate::store::{LotStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Validation or business-rule failure (deterministic, never retried).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Every attempt lost a version race.
    #[error("commit conflicted on all {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl ProcessError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ProcessError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// Executes stock commands against a [`LotStore`].
#[derive(Debug)]
pub struct TransactionProcessor<S> {
    store: S,
    config: ProcessorConfig,
}

impl<S> TransactionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ProcessorConfig::default())
    }

    pub fn with_config(store: S, config: ProcessorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> TransactionProcessor<S>
where
    S: LotStore,
{
    pub fn receive(&self, cmd: ReceiveStock) -> Result<Transaction, ProcessError> {
        self.execute(StockCommand::Receive(cmd))
    }

    pub fn issue(&self, cmd: IssueStock) -> Result<Transaction, ProcessError> {
        self.execute(StockCommand::Issue(cmd))
    }

    pub fn transfer(&self, cmd: TransferStock) -> Result<Transaction, ProcessError> {
        self.execute(StockCommand::Transfer(cmd))
    }

    pub fn adjust(&self, cmd: AdjustStock) -> Result<Transaction, ProcessError> {
        self.execute(StockCommand::Adjust(cmd))
    }

    /// Run one command to completion: exactly one transaction on success,
    /// no observable change on error.
    #[instrument(
        skip(self, command),
        fields(txn_type = %command.txn_type(), lines = command.line_count()),
        err
    )]
    pub fn execute(&self, command: StockCommand) -> Result<Transaction, ProcessError> {
        if let Err(err) = command.validate() {
            warn!(error = %err, "command rejected");
            return Err(err.into());
        }

        let buckets = command.touched_buckets();
        let retry = self.config.retry;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let snapshot = self.store.load_lots(&buckets)?;
            let mut ws = LotWorkspace::from_snapshot(snapshot);
            let draft = handle(&command, &mut ws).inspect_err(|err| {
                warn!(error = %err, attempts, "command rejected");
            })?;

            match self.store.commit(ws.into_change_set(), draft) {
                Ok(txn) => {
                    info!(
                        txn_id = %txn.id,
                        sequence = txn.sequence,
                        txn_type = %txn.txn_type,
                        lines = txn.lines.len(),
                        attempts,
                        "transaction committed"
                    );
                    return Ok(txn);
                }
                Err(StoreError::Conflict(reason)) => {
                    if !retry.should_retry(attempts) {
                        warn!(attempts, %reason, "giving up after repeated commit conflicts");
                        return Err(ProcessError::ConcurrencyConflict { attempts });
                    }
                    let delay = retry.delay_for_attempt(attempts);
                    warn!(
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "commit conflict, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryInventoryStore;
    use chrono::Utc;
    use lotstock_core::{ItemId, LocationId};
    use lotstock_inventory::{QuantityLine, ReceiveLine};
    use rust_decimal::Decimal;

    fn receive_cmd(location: LocationId, item: ItemId, qty: i64) -> ReceiveStock {
        ReceiveStock {
            date: Utc::now(),
            to_location_id: location,
            vendor_id: None,
            reference_no: None,
            notes: None,
            lines: vec![ReceiveLine {
                item_id: item,
                lot_no: "B1".to_string(),
                expiry_date: None,
                qty,
                unit_cost: Decimal::ONE,
            }],
        }
    }

    #[test]
    fn validation_failure_never_touches_the_store() {
        let processor = TransactionProcessor::new(InMemoryInventoryStore::new());
        let loc = LocationId::new();

        let err = processor
            .transfer(TransferStock {
                date: Utc::now(),
                from_location_id: loc,
                to_location_id: loc,
                reference_no: None,
                notes: None,
                lines: vec![QuantityLine { item_id: ItemId::new(), qty: 1 }],
            })
            .unwrap_err();

        assert_eq!(err, ProcessError::Domain(DomainError::SameLocation(loc)));
        assert!(processor.store().list_lots().unwrap().is_empty());
    }

    #[test]
    fn committed_transactions_get_sequential_positions() {
        let processor = TransactionProcessor::new(InMemoryInventoryStore::new());
        let (loc, item) = (LocationId::new(), ItemId::new());

        let first = processor.receive(receive_cmd(loc, item, 3)).unwrap();
        let second = processor.receive(receive_cmd(loc, item, 4)).unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));

        let lots = processor.store().list_lots().unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].qty_on_hand, 7);
    }

    #[test]
    fn domain_accessor_exposes_inner_error() {
        let err = ProcessError::ConcurrencyConflict { attempts: 3 };
        assert!(err.domain().is_none());
        assert_eq!(err.to_string(), "commit conflicted on all 3 attempts");
    }
}
