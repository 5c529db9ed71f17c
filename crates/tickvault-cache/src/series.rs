//! Interfaces callers with the stored series history.

use std::sync::Arc;

use tickvault_core::{run_batches, BatchPolicy, FeedGateway, Symbol};
use tickvault_warehouse::{InstrumentRow, SeriesRow, Warehouse, WarehouseError, WriteBatch};
use tracing::{debug, warn};

use crate::reconcile::{self, SeriesWriter};
use crate::{instrument_id_for, parse_symbols, symbol_strings, BulkLoadOutcome, CacheError};

pub struct SeriesCache {
    warehouse: Arc<Warehouse>,
    gateway: Arc<dyn FeedGateway>,
    policy: BatchPolicy,
}

impl SeriesCache {
    pub fn new(warehouse: Arc<Warehouse>, gateway: Arc<dyn FeedGateway>, policy: BatchPolicy) -> Self {
        Self {
            warehouse,
            gateway,
            policy,
        }
    }

    /// Refresh stored series for the given instruments, batch by batch.
    ///
    /// Per-symbol feed failures are logged and contribute nothing; only an
    /// infrastructure fault aborts the run.
    pub fn bulk_load(&self, instruments: &[InstrumentRow]) -> Result<BulkLoadOutcome, CacheError> {
        debug!("series bulk load begin");
        let mut persisted = 0;

        let run = run_batches(instruments, &self.policy, |batch| {
            let baseline = self.warehouse.series_baseline(&symbol_strings(batch))?;
            let live = self.gateway.fetch_series(&parse_symbols(batch));

            let saved = self.warehouse.with_transaction(|tx| {
                let mut baseline = baseline;
                let mut saved = 0;
                for (symbol, outcome) in &live {
                    match outcome {
                        Ok(series) => {
                            let Some(instrument_id) = instrument_id_for(batch, symbol) else {
                                continue;
                            };
                            saved += reconcile::merge_series(
                                &mut baseline,
                                instrument_id,
                                &series.elements,
                                tx,
                            );
                        }
                        Err(error) => warn!(symbol = %symbol, %error, "series fetch failed"),
                    }
                }
                Ok(saved)
            })?;
            debug!(saved, "series rows updated");
            persisted += saved;
            Ok::<(), CacheError>(())
        })?;

        debug!(
            received = run.received,
            processed = run.processed,
            persisted,
            "series bulk load end"
        );
        Ok(BulkLoadOutcome {
            received: run.received,
            processed: run.processed,
            persisted,
        })
    }

    /// Latest stored values for the given symbols; never touches the vendor.
    pub fn series(&self, symbols: &[Symbol]) -> Result<Vec<SeriesRow>, CacheError> {
        let names: Vec<String> = symbols.iter().map(|s| s.as_str().to_owned()).collect();
        Ok(self.warehouse.series_baseline(&names)?)
    }
}

impl SeriesWriter for WriteBatch<'_> {
    fn insert(&self, row: &SeriesRow) -> Result<i64, WarehouseError> {
        self.insert_series(row)
    }

    fn update(&self, row: &SeriesRow) -> Result<(), WarehouseError> {
        self.update_series(row)
    }
}
