//! Baseline-vs-live record matching and persistence.
//!
//! Each merge assigns live values onto a matched (or fresh) row, persists
//! only when something actually changed, and treats a failed write as that
//! record's problem alone.

use tickvault_core::{InstrumentListing, LiveQuote, LiveSeriesPoint, MarketDate, SeriesElement};
use tickvault_warehouse::{InstrumentRow, SeriesRow, SnapshotRow, WarehouseError};
use tracing::{error, warn};

/// Where a live record landed in the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaselineMatch {
    Exact(usize),
    SameMonth(usize),
    Miss,
}

/// Write surface needed to persist series rows. Implemented by the store's
/// batch writer and by test stubs.
pub trait SeriesWriter {
    fn insert(&self, row: &SeriesRow) -> Result<i64, WarehouseError>;
    fn update(&self, row: &SeriesRow) -> Result<(), WarehouseError>;
}

/// Write surface for dated OHLCV snapshots (trades and index values).
pub trait SnapshotWriter {
    fn insert(&self, row: &SnapshotRow) -> Result<i64, WarehouseError>;
    fn update(&self, row: &SnapshotRow) -> Result<(), WarehouseError>;
}

/// Write surface for the instrument directory.
pub trait InstrumentWriter {
    fn insert(&self, symbol: &str, name: Option<&str>) -> Result<InstrumentRow, WarehouseError>;
    fn update(&self, row: &InstrumentRow) -> Result<(), WarehouseError>;
}

/// Merge one symbol's live series sequence into the batch baseline.
///
/// Returns the number of rows persisted. Processing stops at the cutoff
/// marker; per-row persistence failures are logged and skipped. Matched
/// baseline rows keep their assigned live values even when the write fails,
/// and freshly created rows are never added back into the baseline, so a
/// later live record in the same batch cannot match them.
pub fn merge_series(
    baseline: &mut [SeriesRow],
    instrument_id: i64,
    elements: &[SeriesElement],
    writer: &dyn SeriesWriter,
) -> usize {
    let mut persisted = 0;

    for element in elements {
        let point = match element {
            SeriesElement::Point(point) => point,
            // The cutoff marks the oldest-year truncation; nothing after it applies.
            SeriesElement::Cutoff => break,
        };
        if point.interval.is_none() {
            error!(symbol = %point.symbol, date = %point.date, "series data point is missing its interval");
        }

        let incoming = series_fields(instrument_id, point);
        match find_series_slot(baseline, &incoming) {
            BaselineMatch::Exact(index) | BaselineMatch::SameMonth(index) => {
                let row = &mut baseline[index];
                if series_changed(row, &incoming) {
                    assign_series(row, &incoming);
                    match writer.update(row) {
                        Ok(()) => persisted += 1,
                        Err(error) => {
                            error!(symbol = %row.symbol, %error, "failed to update series row");
                        }
                    }
                }
            }
            BaselineMatch::Miss => {
                let mut row = SeriesRow::draft(instrument_id, point.symbol.as_str());
                if series_changed(&row, &incoming) {
                    assign_series(&mut row, &incoming);
                    match writer.insert(&row) {
                        Ok(_) => persisted += 1,
                        Err(error) => {
                            error!(symbol = %row.symbol, %error, "failed to insert series row");
                        }
                    }
                }
            }
        }
    }

    persisted
}

/// Merge one live snapshot into the batch baseline: exact date match or
/// create, no month fallback. Returns the number of rows persisted (0 or 1).
pub fn merge_snapshot(
    baseline: &mut [SnapshotRow],
    instrument_id: i64,
    live: &LiveQuote,
    writer: &dyn SnapshotWriter,
) -> usize {
    let Some(date) = live.date else {
        // Placeholders carry no date to key on; they reach readers but are
        // never stored.
        warn!(symbol = %live.symbol, "skipping live snapshot without a date");
        return 0;
    };

    let incoming = SnapshotRow {
        id: None,
        instrument_id,
        symbol: live.symbol.as_str().to_owned(),
        date: Some(date.format_iso()),
        open_price: live.open,
        high_price: live.high,
        low_price: live.low,
        close_price: live.close,
        volume: live.volume,
    };

    let slot = baseline
        .iter()
        .position(|row| row.instrument_id == instrument_id && row.date == incoming.date);

    match slot {
        Some(index) => {
            let row = &mut baseline[index];
            if snapshot_changed(row, &incoming) {
                assign_snapshot(row, &incoming);
                match writer.update(row) {
                    Ok(()) => 1,
                    Err(error) => {
                        error!(symbol = %row.symbol, %error, "failed to update snapshot row");
                        0
                    }
                }
            } else {
                0
            }
        }
        None => {
            let mut row = SnapshotRow::draft(instrument_id, live.symbol.as_str());
            if !snapshot_changed(&row, &incoming) {
                return 0;
            }
            assign_snapshot(&mut row, &incoming);
            match writer.insert(&row) {
                Ok(_) => 1,
                Err(error) => {
                    error!(symbol = %row.symbol, %error, "failed to insert snapshot row");
                    0
                }
            }
        }
    }
}

/// Merge one directory listing: match by symbol, update the name when it
/// changed, create otherwise. Returns the number of rows persisted (0 or 1).
pub fn merge_instrument(
    baseline: &mut [InstrumentRow],
    listing: &InstrumentListing,
    writer: &dyn InstrumentWriter,
) -> usize {
    match baseline
        .iter_mut()
        .find(|row| row.symbol == listing.symbol.as_str())
    {
        Some(row) => {
            if row.name == listing.name {
                return 0;
            }
            row.name = listing.name.clone();
            match writer.update(row) {
                Ok(()) => 1,
                Err(error) => {
                    error!(symbol = %row.symbol, %error, "failed to update instrument");
                    0
                }
            }
        }
        None => match writer.insert(listing.symbol.as_str(), listing.name.as_deref()) {
            Ok(_) => 1,
            Err(error) => {
                error!(symbol = %listing.symbol, %error, "failed to insert instrument");
                0
            }
        },
    }
}

/// The live point expressed as the row it would persist to.
fn series_fields(instrument_id: i64, point: &LiveSeriesPoint) -> SeriesRow {
    SeriesRow {
        id: None,
        instrument_id,
        symbol: point.symbol.as_str().to_owned(),
        time_interval: point.interval.map(|interval| interval.as_str().to_owned()),
        series_date: Some(point.date.format_iso()),
        open_price: point.open,
        high_price: point.high,
        low_price: point.low,
        close_price: point.close,
        adjusted_close_price: point.adjusted_close,
        volume: point.volume,
        dividend_amount: point.dividend_amount,
    }
}

/// Exact `(instrument, interval, date)` match first; failing that, reuse a
/// row from the same instrument/interval and calendar month. First match by
/// baseline order wins in both passes.
fn find_series_slot(baseline: &[SeriesRow], incoming: &SeriesRow) -> BaselineMatch {
    let exact = baseline.iter().position(|row| {
        row.instrument_id == incoming.instrument_id
            && row.time_interval == incoming.time_interval
            && row.series_date == incoming.series_date
    });
    if let Some(index) = exact {
        return BaselineMatch::Exact(index);
    }

    let Some(incoming_date) = parse_row_date(incoming.series_date.as_deref()) else {
        return BaselineMatch::Miss;
    };
    let same_month = baseline.iter().position(|row| {
        row.instrument_id == incoming.instrument_id
            && row.time_interval == incoming.time_interval
            && parse_row_date(row.series_date.as_deref())
                .is_some_and(|row_date| row_date.same_month(incoming_date))
    });
    match same_month {
        Some(index) => BaselineMatch::SameMonth(index),
        None => BaselineMatch::Miss,
    }
}

fn parse_row_date(value: Option<&str>) -> Option<MarketDate> {
    value.and_then(|raw| MarketDate::parse(raw).ok())
}

/// Whole-record change detection: any differing persisted field makes the
/// record dirty. The joined symbol is presentation data, not a stored field.
fn series_changed(row: &SeriesRow, incoming: &SeriesRow) -> bool {
    row.time_interval != incoming.time_interval
        || row.series_date != incoming.series_date
        || row.open_price != incoming.open_price
        || row.high_price != incoming.high_price
        || row.low_price != incoming.low_price
        || row.close_price != incoming.close_price
        || row.adjusted_close_price != incoming.adjusted_close_price
        || row.volume != incoming.volume
        || row.dividend_amount != incoming.dividend_amount
}

fn assign_series(row: &mut SeriesRow, incoming: &SeriesRow) {
    row.time_interval = incoming.time_interval.clone();
    row.series_date = incoming.series_date.clone();
    row.open_price = incoming.open_price;
    row.high_price = incoming.high_price;
    row.low_price = incoming.low_price;
    row.close_price = incoming.close_price;
    row.adjusted_close_price = incoming.adjusted_close_price;
    row.volume = incoming.volume;
    row.dividend_amount = incoming.dividend_amount;
}

fn snapshot_changed(row: &SnapshotRow, incoming: &SnapshotRow) -> bool {
    row.date != incoming.date
        || row.open_price != incoming.open_price
        || row.high_price != incoming.high_price
        || row.low_price != incoming.low_price
        || row.close_price != incoming.close_price
        || row.volume != incoming.volume
}

fn assign_snapshot(row: &mut SnapshotRow, incoming: &SnapshotRow) {
    row.date = incoming.date.clone();
    row.open_price = incoming.open_price;
    row.high_price = incoming.high_price;
    row.low_price = incoming.low_price;
    row.close_price = incoming.close_price;
    row.volume = incoming.volume;
}
