pub mod date;
pub mod interval;
pub mod models;
pub mod symbol;

pub use date::MarketDate;
pub use interval::TimeInterval;
pub use models::{InstrumentListing, LiveQuote, LiveSeries, LiveSeriesPoint, SeriesElement};
pub use symbol::Symbol;
