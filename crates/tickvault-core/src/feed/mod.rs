//! External market-data vendor boundary.

mod alphavantage;

pub use alphavantage::AlphaVantageFeed;

use thiserror::Error;

use crate::{LiveQuote, LiveSeries, Symbol};

/// Typed failure for one feed lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The vendor could not be reached; affected symbols degrade to error
    /// placeholders and are not retried.
    #[error("vendor connection failure: {0}")]
    Connection(String),
    /// The payload came back but could not be interpreted.
    #[error("vendor payload could not be parsed: {0}")]
    Parse(String),
    /// The vendor answered with its own error message field.
    #[error("vendor reported an error: {0}")]
    Vendor(String),
    /// An empty payload; treated identically to a vendor-reported error.
    #[error("vendor returned an empty response")]
    Empty,
}

/// Per-symbol lookup outcome, returned in request order.
pub type SymbolResult<T> = (Symbol, Result<T, FeedError>);

/// Gateway to the external feed vendor. One entry is returned per requested
/// symbol; a failing symbol never poisons its batch siblings.
pub trait FeedGateway: Send + Sync {
    /// Latest trade snapshot per symbol.
    fn fetch_quotes(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveQuote>>;

    /// Latest level per index symbol.
    fn fetch_index_values(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveQuote>>;

    /// Historical series per symbol, newest first, terminated by an explicit
    /// cutoff marker at the oldest-year limit.
    fn fetch_series(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveSeries>>;
}
