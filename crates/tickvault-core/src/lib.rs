//! Core contracts for tickvault.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - The feed gateway contract and the Alpha Vantage adapter
//! - Batch scheduling and per-cache throttle policies
//! - Response envelope and structured errors

pub mod domain;
pub mod envelope;
pub mod error;
pub mod feed;
pub mod http_client;
pub mod scheduler;

pub use domain::{
    InstrumentListing, LiveQuote, LiveSeries, LiveSeriesPoint, MarketDate, SeriesElement, Symbol,
    TimeInterval,
};
pub use envelope::{Envelope, EnvelopeMeta};
pub use error::{CoreError, ValidationError};
pub use feed::{AlphaVantageFeed, FeedError, FeedGateway, SymbolResult};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use scheduler::{run_batches, BatchPolicy, BatchRun};
