use serde::Serialize;

/// Identity row for a tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentRow {
    pub id: i64,
    pub symbol: String,
    pub name: Option<String>,
}

/// Stored series observation. Baseline reads populate `symbol` from the
/// owning instrument so consumers never re-fetch it; `id` is `None` until
/// the row has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub id: Option<i64>,
    pub instrument_id: i64,
    pub symbol: String,
    pub time_interval: Option<String>,
    pub series_date: Option<String>,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
    pub adjusted_close_price: Option<f64>,
    pub volume: Option<f64>,
    pub dividend_amount: Option<f64>,
}

impl SeriesRow {
    /// Fresh, unsaved row for an instrument; fields are assigned during the
    /// merge step.
    pub fn draft(instrument_id: i64, symbol: impl Into<String>) -> Self {
        Self {
            id: None,
            instrument_id,
            symbol: symbol.into(),
            time_interval: None,
            series_date: None,
            open_price: None,
            high_price: None,
            low_price: None,
            close_price: None,
            adjusted_close_price: None,
            volume: None,
            dividend_amount: None,
        }
    }
}

/// Shared shape of the `trades` and `index_values` rows: one dated OHLCV
/// snapshot per instrument per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub id: Option<i64>,
    pub instrument_id: i64,
    pub symbol: String,
    pub date: Option<String>,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
    pub volume: Option<f64>,
}

impl SnapshotRow {
    /// Fresh, unsaved row for an instrument; fields are assigned during the
    /// merge step.
    pub fn draft(instrument_id: i64, symbol: impl Into<String>) -> Self {
        Self {
            id: None,
            instrument_id,
            symbol: symbol.into(),
            date: None,
            open_price: None,
            high_price: None,
            low_price: None,
            close_price: None,
            volume: None,
        }
    }
}
