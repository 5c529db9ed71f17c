//! Interfaces callers with the latest index levels.

use std::sync::Arc;

use tickvault_core::{run_batches, BatchPolicy, FeedGateway, LiveQuote, Symbol};
use tickvault_warehouse::{InstrumentRow, SnapshotRow, Warehouse, WarehouseError, WriteBatch};
use tracing::{debug, warn};

use crate::reconcile::{self, SnapshotWriter};
use crate::trade::quote_from_row;
use crate::{instrument_id_for, parse_symbols, symbol_strings, BulkLoadOutcome, CacheError};

pub struct IndexCache {
    warehouse: Arc<Warehouse>,
    gateway: Arc<dyn FeedGateway>,
    policy: BatchPolicy,
}

/// Routes snapshot writes to the index_values table.
struct IndexValueWriter<'a, 'b>(&'a WriteBatch<'b>);

impl SnapshotWriter for IndexValueWriter<'_, '_> {
    fn insert(&self, row: &SnapshotRow) -> Result<i64, WarehouseError> {
        self.0.insert_index_value(row)
    }

    fn update(&self, row: &SnapshotRow) -> Result<(), WarehouseError> {
        self.0.update_index_value(row)
    }
}

impl IndexCache {
    pub fn new(warehouse: Arc<Warehouse>, gateway: Arc<dyn FeedGateway>, policy: BatchPolicy) -> Self {
        Self {
            warehouse,
            gateway,
            policy,
        }
    }

    /// Refresh stored index levels for the given instruments.
    pub fn bulk_load(&self, instruments: &[InstrumentRow]) -> Result<BulkLoadOutcome, CacheError> {
        debug!("index bulk load begin");
        let mut persisted = 0;

        let run = run_batches(instruments, &self.policy, |batch| {
            let baseline = self.warehouse.index_baseline(&symbol_strings(batch))?;
            let live = self.gateway.fetch_index_values(&parse_symbols(batch));

            let saved = self.warehouse.with_transaction(|tx| {
                let mut baseline = baseline;
                let writer = IndexValueWriter(tx);
                let mut saved = 0;
                for (symbol, outcome) in &live {
                    let level = match outcome {
                        Ok(level) => level.clone(),
                        Err(error) => {
                            warn!(symbol = %symbol, %error, "index fetch failed");
                            LiveQuote::error_placeholder(symbol.clone())
                        }
                    };
                    let Some(instrument_id) = instrument_id_for(batch, symbol) else {
                        continue;
                    };
                    saved += reconcile::merge_snapshot(&mut baseline, instrument_id, &level, &writer);
                }
                Ok(saved)
            })?;
            debug!(saved, "index rows updated");
            persisted += saved;
            Ok::<(), CacheError>(())
        })?;

        debug!(
            received = run.received,
            processed = run.processed,
            persisted,
            "index bulk load end"
        );
        Ok(BulkLoadOutcome {
            received: run.received,
            processed: run.processed,
            persisted,
        })
    }

    /// Latest stored values for the given index symbols.
    pub fn last_indexes(&self, symbols: &[Symbol]) -> Result<Vec<LiveQuote>, CacheError> {
        let names: Vec<String> = symbols.iter().map(|s| s.as_str().to_owned()).collect();
        let rows = self.warehouse.index_baseline(&names)?;
        Ok(rows.iter().filter_map(quote_from_row).collect())
    }
}
