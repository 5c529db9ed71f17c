//! Batched feed synchronization between the vendor gateway and the market
//! store.
//!
//! All access to cached market data goes through the typed caches in this
//! crate. Each cache shares one discipline: partition the requested symbols
//! into throttle-sized batches, load the stored baseline for the batch,
//! fetch live values, and reconcile them into the store with one transaction
//! per batch.

pub mod instrument;
pub mod index;
pub mod reconcile;
pub mod series;
pub mod trade;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tickvault_core::{BatchPolicy, FeedGateway};
use tickvault_warehouse::{Warehouse, WarehouseError};

pub use instrument::InstrumentCache;
pub use index::IndexCache;
pub use series::SeriesCache;
pub use trade::TradeCache;

/// Aggregate counts reported by a bulk load: identities received, identities
/// scheduled through batches, and records actually written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkLoadOutcome {
    pub received: usize,
    pub processed: usize,
    pub persisted: usize,
}

/// Failures surfaced by cache operations. Partial data problems never land
/// here; only infrastructure faults do.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// One handle over all four typed caches, sharing a store and a gateway.
pub struct DataCache {
    pub instruments: InstrumentCache,
    pub indexes: IndexCache,
    pub series: SeriesCache,
    pub trades: TradeCache,
}

impl DataCache {
    pub fn new(warehouse: Arc<Warehouse>, gateway: Arc<dyn FeedGateway>) -> Self {
        Self {
            instruments: InstrumentCache::new(
                Arc::clone(&warehouse),
                BatchPolicy::instrument_default(),
            ),
            indexes: IndexCache::new(
                Arc::clone(&warehouse),
                Arc::clone(&gateway),
                BatchPolicy::index_default(),
            ),
            series: SeriesCache::new(
                Arc::clone(&warehouse),
                Arc::clone(&gateway),
                BatchPolicy::series_default(),
            ),
            trades: TradeCache::new(warehouse, gateway, BatchPolicy::trade_default()),
        }
    }
}

pub(crate) fn symbol_strings(rows: &[tickvault_warehouse::InstrumentRow]) -> Vec<String> {
    rows.iter().map(|row| row.symbol.clone()).collect()
}

pub(crate) fn parse_symbols(
    rows: &[tickvault_warehouse::InstrumentRow],
) -> Vec<tickvault_core::Symbol> {
    rows.iter()
        .filter_map(|row| match tickvault_core::Symbol::parse(&row.symbol) {
            Ok(symbol) => Some(symbol),
            Err(error) => {
                tracing::warn!(symbol = %row.symbol, %error, "skipping unparseable stored symbol");
                None
            }
        })
        .collect()
}

pub(crate) fn instrument_id_for(
    rows: &[tickvault_warehouse::InstrumentRow],
    symbol: &tickvault_core::Symbol,
) -> Option<i64> {
    rows.iter()
        .find(|row| row.symbol == symbol.as_str())
        .map(|row| row.id)
}
