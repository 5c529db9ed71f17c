//! CLI argument definitions for tickvault.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync instruments` | Refresh the instrument directory |
//! | `sync series` | Pull historical series through the batched feed loader |
//! | `sync trades` | Pull trade snapshots through the batched feed loader |
//! | `sync indexes` | Pull index levels through the batched feed loader |
//! | `prices` | Read latest prices, cached or live |
//! | `series` | Read stored series history |
//! | `indexes` | Read stored index levels |
//!
//! # Examples
//!
//! ```bash
//! # Track two instruments, then pull their monthly history
//! tickvault sync instruments "AAPL=Apple Inc." MSFT
//! tickvault sync series AAPL MSFT
//!
//! # Live prices without touching the store
//! tickvault prices AAPL MSFT --live --pretty
//!
//! # Zero-delay refresh against a scratch store
//! tickvault sync trades AAPL --delay-secs 0 --db-path /tmp/market.duckdb
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Batched market-data synchronization against a local DuckDB store.
#[derive(Debug, Parser)]
#[command(
    name = "tickvault",
    author,
    version,
    about = "Batched market-data synchronization against a local DuckDB store"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Store file override; defaults to `$TICKVAULT_HOME/cache/market.duckdb`.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synchronize vendor data into the local store.
    Sync(SyncArgs),

    /// Latest prices for tracked instruments, cached or live.
    ///
    /// Cached reads never touch the vendor. With `--live`, values come
    /// straight from the feed and failed symbols appear as explicit error
    /// placeholders (null prices) rather than failing the command.
    Prices(PricesArgs),

    /// Stored series history for the given symbols, ordered by instrument,
    /// interval, then date.
    Series(ReadArgs),

    /// Stored index levels for the given symbols.
    Indexes(ReadArgs),
}

/// Arguments for the `sync` command group.
#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub target: SyncTarget,
}

/// Synchronization targets.
#[derive(Debug, Subcommand)]
pub enum SyncTarget {
    /// Refresh the instrument directory from listings.
    Instruments(SyncInstrumentsArgs),

    /// Refresh stored series history for tracked symbols.
    Series(SyncFeedArgs),

    /// Refresh stored trade snapshots for tracked symbols.
    Trades(SyncFeedArgs),

    /// Refresh stored index levels for tracked symbols.
    Indexes(SyncFeedArgs),
}

/// Arguments for `sync instruments`.
#[derive(Debug, Args)]
pub struct SyncInstrumentsArgs {
    /// Directory listings, either `SYMBOL` or `SYMBOL=Display Name`.
    #[arg(required = true, num_args = 1..)]
    pub listings: Vec<String>,

    #[command(flatten)]
    pub throttle: ThrottleArgs,
}

/// Arguments for the feed-backed sync targets.
#[derive(Debug, Args)]
pub struct SyncFeedArgs {
    /// Symbols to refresh; they must already be in the instrument directory.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    #[command(flatten)]
    pub throttle: ThrottleArgs,
}

/// Vendor throttle overrides. Defaults come from each cache type's policy.
#[derive(Debug, Args)]
pub struct ThrottleArgs {
    /// Symbols per batch (one transaction per batch).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pause between batches, in seconds.
    #[arg(long)]
    pub delay_secs: Option<u64>,
}

/// Arguments for the `prices` command.
#[derive(Debug, Args)]
pub struct PricesArgs {
    /// One or more tracked symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Fetch live vendor prices instead of stored values.
    #[arg(long, default_value_t = false)]
    pub live: bool,
}

/// Arguments for the read-only `series` and `indexes` commands.
#[derive(Debug, Args)]
pub struct ReadArgs {
    /// One or more symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}
