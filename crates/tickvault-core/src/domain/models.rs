use serde::{Deserialize, Serialize};

use crate::{MarketDate, Symbol, TimeInterval, ValidationError};

/// Directory entry fed into an instrument bulk refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentListing {
    pub symbol: Symbol,
    pub name: Option<String>,
}

impl InstrumentListing {
    pub fn new(symbol: Symbol, name: Option<String>) -> Self {
        Self { symbol, name }
    }
}

/// Latest vendor snapshot for one symbol (a trade tick or an index level).
///
/// Every data field is optional: an unrecoverable fetch yields a placeholder
/// with only the symbol set, so consumers can tell "no data" apart from a
/// zero price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub symbol: Symbol,
    pub date: Option<MarketDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl LiveQuote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        date: MarketDate,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
        volume: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("open", open)?;
        validate_optional_non_negative("high", high)?;
        validate_optional_non_negative("low", low)?;
        validate_optional_non_negative("close", close)?;
        validate_optional_non_negative("volume", volume)?;

        Ok(Self {
            symbol,
            date: Some(date),
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Placeholder for a symbol whose fetch failed unrecoverably.
    pub fn error_placeholder(symbol: Symbol) -> Self {
        Self {
            symbol,
            date: None,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    pub fn is_error_placeholder(&self) -> bool {
        self.close.is_none()
    }
}

/// One dated observation in a vendor series response.
///
/// The interval is optional because the vendor occasionally omits it; such
/// points are logged as malformed and fail per-record persistence rather
/// than aborting their batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSeriesPoint {
    pub symbol: Symbol,
    pub interval: Option<TimeInterval>,
    pub date: MarketDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: Option<f64>,
    pub dividend_amount: Option<f64>,
}

/// Element of a vendor series sequence.
///
/// `Cutoff` is the explicit end-of-data marker emitted when the sequence is
/// truncated at the oldest-year limit; consumers stop reading there without
/// treating it as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeriesElement {
    Point(LiveSeriesPoint),
    Cutoff,
}

/// Ordered vendor series for one symbol, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSeries {
    pub symbol: Symbol,
    pub elements: Vec<SeriesElement>,
}

impl LiveSeries {
    pub fn new(symbol: Symbol, elements: Vec<SeriesElement>) -> Self {
        Self { symbol, elements }
    }

    /// Points before the cutoff marker, in sequence order.
    pub fn points(&self) -> impl Iterator<Item = &LiveSeriesPoint> {
        self.elements
            .iter()
            .map_while(|element| match element {
                SeriesElement::Point(point) => Some(point),
                SeriesElement::Cutoff => None,
            })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_no_data_fields() {
        let placeholder = LiveQuote::error_placeholder(Symbol::parse("ZZZ").expect("symbol"));
        assert!(placeholder.is_error_placeholder());
        assert_eq!(placeholder.date, None);
        assert_eq!(placeholder.close, None);
    }

    #[test]
    fn rejects_negative_price() {
        let err = LiveQuote::new(
            Symbol::parse("AAPL").expect("symbol"),
            MarketDate::parse("2024-03-25").expect("date"),
            Some(-1.0),
            None,
            None,
            None,
            None,
        )
        .expect_err("must fail");
        assert!(matches!(err, ValidationError::NegativeValue { field: "open" }));
    }

    #[test]
    fn series_points_stop_at_cutoff() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let point = LiveSeriesPoint {
            symbol: symbol.clone(),
            interval: Some(TimeInterval::Monthly),
            date: MarketDate::parse("2024-01-31").expect("date"),
            open: Some(1.0),
            high: Some(2.0),
            low: Some(0.5),
            close: Some(1.5),
            adjusted_close: Some(1.5),
            volume: Some(100.0),
            dividend_amount: Some(0.0),
        };
        let series = LiveSeries::new(
            symbol,
            vec![
                SeriesElement::Point(point.clone()),
                SeriesElement::Cutoff,
                SeriesElement::Point(point),
            ],
        );
        assert_eq!(series.points().count(), 1);
    }
}
