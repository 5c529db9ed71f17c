use std::sync::Arc;
use std::time::Duration;

use tickvault_cache::{IndexCache, InstrumentCache, SeriesCache, TradeCache};
use tickvault_core::{BatchPolicy, InstrumentListing, Symbol};

use crate::cli::{SyncArgs, SyncFeedArgs, SyncInstrumentsArgs, SyncTarget, ThrottleArgs};
use crate::error::CliError;

use super::{CommandContext, CommandResult};

pub fn run(args: &SyncArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    match &args.target {
        SyncTarget::Instruments(args) => instruments(args, context),
        SyncTarget::Series(args) => series(args, context),
        SyncTarget::Trades(args) => trades(args, context),
        SyncTarget::Indexes(args) => indexes(args, context),
    }
}

fn instruments(
    args: &SyncInstrumentsArgs,
    context: &CommandContext,
) -> Result<CommandResult, CliError> {
    let listings = args
        .listings
        .iter()
        .map(|raw| parse_listing(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let cache = InstrumentCache::new(
        Arc::clone(&context.warehouse),
        apply_throttle(BatchPolicy::instrument_default(), &args.throttle)?,
    );
    let outcome = cache.bulk_load(&listings)?;
    Ok(CommandResult::ok(serde_json::to_value(outcome)?))
}

fn series(args: &SyncFeedArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let (instruments, warnings) = context.resolve_instruments(&args.symbols)?;
    let cache = SeriesCache::new(
        Arc::clone(&context.warehouse),
        Arc::clone(&context.gateway),
        apply_throttle(BatchPolicy::series_default(), &args.throttle)?,
    );
    let outcome = cache.bulk_load(&instruments)?;
    Ok(CommandResult::ok(serde_json::to_value(outcome)?).with_warnings(warnings))
}

fn trades(args: &SyncFeedArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let (instruments, warnings) = context.resolve_instruments(&args.symbols)?;
    let cache = TradeCache::new(
        Arc::clone(&context.warehouse),
        Arc::clone(&context.gateway),
        apply_throttle(BatchPolicy::trade_default(), &args.throttle)?,
    );
    let outcome = cache.bulk_load(&instruments)?;
    Ok(CommandResult::ok(serde_json::to_value(outcome)?).with_warnings(warnings))
}

fn indexes(args: &SyncFeedArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let (instruments, warnings) = context.resolve_instruments(&args.symbols)?;
    let cache = IndexCache::new(
        Arc::clone(&context.warehouse),
        Arc::clone(&context.gateway),
        apply_throttle(BatchPolicy::index_default(), &args.throttle)?,
    );
    let outcome = cache.bulk_load(&instruments)?;
    Ok(CommandResult::ok(serde_json::to_value(outcome)?).with_warnings(warnings))
}

fn apply_throttle(policy: BatchPolicy, throttle: &ThrottleArgs) -> Result<BatchPolicy, CliError> {
    let mut policy = policy;
    if let Some(batch_size) = throttle.batch_size {
        policy = policy.with_batch_size(batch_size)?;
    }
    if let Some(delay_secs) = throttle.delay_secs {
        policy = policy.with_delay(Duration::from_secs(delay_secs));
    }
    Ok(policy)
}

/// Listings arrive as `SYMBOL` or `SYMBOL=Display Name`.
fn parse_listing(raw: &str) -> Result<InstrumentListing, CliError> {
    let (symbol, name) = match raw.split_once('=') {
        Some((symbol, name)) => (symbol, Some(name.trim().to_owned())),
        None => (raw, None),
    };
    Ok(InstrumentListing::new(
        Symbol::parse(symbol)?,
        name.filter(|name| !name.is_empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_symbol_listing() {
        let listing = parse_listing("aapl").expect("must parse");
        assert_eq!(listing.symbol.as_str(), "AAPL");
        assert_eq!(listing.name, None);
    }

    #[test]
    fn parses_named_listing() {
        let listing = parse_listing("AAPL=Apple Inc.").expect("must parse");
        assert_eq!(listing.symbol.as_str(), "AAPL");
        assert_eq!(listing.name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn empty_name_collapses_to_none() {
        let listing = parse_listing("AAPL=").expect("must parse");
        assert_eq!(listing.name, None);
    }
}
