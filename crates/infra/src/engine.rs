//! Inventory engine facade: command processing and reporting over one store.

use std::sync::Arc;

use lotstock_core::{LotId, TransactionId};
use lotstock_inventory::{AdjustStock, IssueStock, Lot, ReceiveStock, Transaction, TransferStock};

use crate::catalog::{InMemoryItemCatalog, ItemCatalog};
use crate::config::ProcessorConfig;
use crate::ledger::{LedgerEntry, LedgerFilter};
use crate::processor::{ProcessError, TransactionProcessor};
use crate::reporting::{
    ExpiringFilter, ExpiringRow, LowStockFilter, LowStockRow, ReconciliationReport, ReportError,
    ReportingEngine, StockFilter, StockSummaryRow, ValuationFilter, ValuationReport,
};
use crate::store::{InMemoryInventoryStore, LotStore, TransactionLog};

/// The engine's external interface.
///
/// Store and catalog are shared (`Arc`) between the writer side and the
/// read-only reports, and may be shared with other engines or callers.
#[derive(Debug)]
pub struct InventoryEngine<S, C> {
    processor: TransactionProcessor<Arc<S>>,
    reports: ReportingEngine<Arc<S>, Arc<C>>,
}

impl InventoryEngine<InMemoryInventoryStore, InMemoryItemCatalog> {
    /// Empty in-memory engine with settings from the environment.
    pub fn in_memory(catalog: Arc<InMemoryItemCatalog>) -> Self {
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            catalog,
            ProcessorConfig::from_env(),
        )
    }
}

impl<S, C> InventoryEngine<S, C>
where
    S: LotStore + TransactionLog,
    C: ItemCatalog,
{
    pub fn new(store: Arc<S>, catalog: Arc<C>, config: ProcessorConfig) -> Self {
        Self {
            processor: TransactionProcessor::with_config(store.clone(), config),
            reports: ReportingEngine::new(store, catalog),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.processor.store()
    }

    pub fn receive(&self, cmd: ReceiveStock) -> Result<Transaction, ProcessError> {
        self.processor.receive(cmd)
    }

    pub fn issue(&self, cmd: IssueStock) -> Result<Transaction, ProcessError> {
        self.processor.issue(cmd)
    }

    pub fn transfer(&self, cmd: TransferStock) -> Result<Transaction, ProcessError> {
        self.processor.transfer(cmd)
    }

    pub fn adjust(&self, cmd: AdjustStock) -> Result<Transaction, ProcessError> {
        self.processor.adjust(cmd)
    }

    pub fn stock_summary(&self, filter: &StockFilter) -> Result<Vec<StockSummaryRow>, ReportError> {
        self.reports.stock_summary(filter)
    }

    pub fn valuation(&self, filter: &ValuationFilter) -> Result<ValuationReport, ReportError> {
        self.reports.valuation(filter)
    }

    pub fn low_stock(&self, filter: &LowStockFilter) -> Result<Vec<LowStockRow>, ReportError> {
        self.reports.low_stock(filter)
    }

    pub fn expiring(&self, filter: &ExpiringFilter) -> Result<Vec<ExpiringRow>, ReportError> {
        self.reports.expiring(filter)
    }

    pub fn ledger(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, ReportError> {
        self.reports.ledger(filter)
    }

    /// A committed transaction by id.
    pub fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, ReportError> {
        self.reports.transaction(id)
    }

    pub fn lot(&self, lot_id: LotId) -> Result<Option<Lot>, ReportError> {
        self.reports.lot(lot_id)
    }

    pub fn reconcile(&self) -> Result<ReconciliationReport, ReportError> {
        self.reports.reconcile()
    }
}
