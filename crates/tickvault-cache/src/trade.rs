//! Interfaces callers with the latest trade prices.

use std::sync::Arc;

use tickvault_core::{run_batches, BatchPolicy, FeedGateway, LiveQuote, MarketDate, Symbol};
use tickvault_warehouse::{InstrumentRow, SnapshotRow, Warehouse, WarehouseError, WriteBatch};
use tracing::{debug, warn};

use crate::reconcile::{self, SnapshotWriter};
use crate::{instrument_id_for, parse_symbols, symbol_strings, BulkLoadOutcome, CacheError};

pub struct TradeCache {
    warehouse: Arc<Warehouse>,
    gateway: Arc<dyn FeedGateway>,
    policy: BatchPolicy,
}

/// Routes snapshot writes to the trades table.
struct TradeWriter<'a, 'b>(&'a WriteBatch<'b>);

impl SnapshotWriter for TradeWriter<'_, '_> {
    fn insert(&self, row: &SnapshotRow) -> Result<i64, WarehouseError> {
        self.0.insert_trade(row)
    }

    fn update(&self, row: &SnapshotRow) -> Result<(), WarehouseError> {
        self.0.update_trade(row)
    }
}

impl TradeCache {
    pub fn new(warehouse: Arc<Warehouse>, gateway: Arc<dyn FeedGateway>, policy: BatchPolicy) -> Self {
        Self {
            warehouse,
            gateway,
            policy,
        }
    }

    /// Refresh stored trade snapshots for the given instruments.
    ///
    /// Failed symbols degrade to placeholders; placeholders reach readers
    /// but are never stored.
    pub fn bulk_load(&self, instruments: &[InstrumentRow]) -> Result<BulkLoadOutcome, CacheError> {
        debug!("trade bulk load begin");
        let mut persisted = 0;

        let run = run_batches(instruments, &self.policy, |batch| {
            let baseline = self.warehouse.trades_baseline(&symbol_strings(batch))?;
            let live = self.gateway.fetch_quotes(&parse_symbols(batch));

            let saved = self.warehouse.with_transaction(|tx| {
                let mut baseline = baseline;
                let writer = TradeWriter(tx);
                let mut saved = 0;
                for (symbol, outcome) in &live {
                    let quote = match outcome {
                        Ok(quote) => quote.clone(),
                        Err(error) => {
                            warn!(symbol = %symbol, %error, "price fetch failed");
                            LiveQuote::error_placeholder(symbol.clone())
                        }
                    };
                    let Some(instrument_id) = instrument_id_for(batch, symbol) else {
                        continue;
                    };
                    saved += reconcile::merge_snapshot(&mut baseline, instrument_id, &quote, &writer);
                }
                Ok(saved)
            })?;
            debug!(saved, "trade rows updated");
            persisted += saved;
            Ok::<(), CacheError>(())
        })?;

        debug!(
            received = run.received,
            processed = run.processed,
            persisted,
            "trade bulk load end"
        );
        Ok(BulkLoadOutcome {
            received: run.received,
            processed: run.processed,
            persisted,
        })
    }

    /// Latest prices for the given instruments.
    ///
    /// With `live` set, values come straight from the vendor (error
    /// placeholders included) without touching the store; otherwise the
    /// stored baseline is returned.
    pub fn last_prices(
        &self,
        instruments: &[InstrumentRow],
        live: bool,
    ) -> Result<Vec<LiveQuote>, CacheError> {
        if !live {
            let rows = self.warehouse.trades_baseline(&symbol_strings(instruments))?;
            return Ok(rows.iter().filter_map(quote_from_row).collect());
        }

        let mut quotes = Vec::new();
        run_batches(instruments, &self.policy, |batch| {
            for (symbol, outcome) in self.gateway.fetch_quotes(&parse_symbols(batch)) {
                quotes.push(match outcome {
                    Ok(quote) => quote,
                    Err(error) => {
                        warn!(symbol = %symbol, %error, "live price fetch failed");
                        LiveQuote::error_placeholder(symbol)
                    }
                });
            }
            Ok::<(), CacheError>(())
        })?;
        Ok(quotes)
    }
}

pub(crate) fn quote_from_row(row: &SnapshotRow) -> Option<LiveQuote> {
    let symbol = Symbol::parse(&row.symbol).ok()?;
    Some(LiveQuote {
        symbol,
        date: row
            .date
            .as_deref()
            .and_then(|raw| MarketDate::parse(raw).ok()),
        open: row.open_price,
        high: row.high_price,
        low: row.low_price,
        close: row.close_price,
        volume: row.volume,
    })
}
