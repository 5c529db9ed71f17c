//! Interfaces callers with the instrument directory.

use std::sync::Arc;

use tickvault_core::{run_batches, BatchPolicy, InstrumentListing, Symbol};
use tickvault_warehouse::{InstrumentRow, Warehouse, WarehouseError, WriteBatch};
use tracing::debug;

use crate::reconcile::{self, InstrumentWriter};
use crate::{BulkLoadOutcome, CacheError};

/// Directory refresh never consults the vendor: the listings arrive from the
/// caller and are reconciled against the stored directory.
pub struct InstrumentCache {
    warehouse: Arc<Warehouse>,
    policy: BatchPolicy,
}

impl InstrumentWriter for WriteBatch<'_> {
    fn insert(&self, symbol: &str, name: Option<&str>) -> Result<InstrumentRow, WarehouseError> {
        self.insert_instrument(symbol, name)
    }

    fn update(&self, row: &InstrumentRow) -> Result<(), WarehouseError> {
        self.update_instrument(row)
    }
}

impl InstrumentCache {
    pub fn new(warehouse: Arc<Warehouse>, policy: BatchPolicy) -> Self {
        Self { warehouse, policy }
    }

    /// Reconcile the given directory listings into the instrument table.
    pub fn bulk_load(&self, listings: &[InstrumentListing]) -> Result<BulkLoadOutcome, CacheError> {
        debug!("instrument bulk load begin");
        let mut persisted = 0;

        let run = run_batches(listings, &self.policy, |batch| {
            let symbols: Vec<String> = batch
                .iter()
                .map(|listing| listing.symbol.as_str().to_owned())
                .collect();
            let baseline = self.warehouse.instruments_for_symbols(&symbols)?;

            let saved = self.warehouse.with_transaction(|tx| {
                let mut baseline = baseline;
                let mut saved = 0;
                for listing in batch {
                    saved += reconcile::merge_instrument(&mut baseline, listing, tx);
                }
                Ok(saved)
            })?;
            debug!(saved, "instrument rows updated");
            persisted += saved;
            Ok::<(), CacheError>(())
        })?;

        debug!(
            received = run.received,
            processed = run.processed,
            persisted,
            "instrument bulk load end"
        );
        Ok(BulkLoadOutcome {
            received: run.received,
            processed: run.processed,
            persisted,
        })
    }

    /// Directory rows for the given symbols.
    pub fn instruments(&self, symbols: &[Symbol]) -> Result<Vec<InstrumentRow>, CacheError> {
        let names: Vec<String> = symbols.iter().map(|s| s.as_str().to_owned()).collect();
        Ok(self.warehouse.instruments_for_symbols(&names)?)
    }
}
