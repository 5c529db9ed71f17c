use crate::cli::{PricesArgs, ReadArgs};
use crate::error::CliError;

use super::{parse_symbols, CommandContext, CommandResult};

pub fn prices(args: &PricesArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let (instruments, warnings) = context.resolve_instruments(&args.symbols)?;
    let quotes = context
        .data_cache()
        .trades
        .last_prices(&instruments, args.live)?;
    Ok(CommandResult::ok(serde_json::to_value(quotes)?).with_warnings(warnings))
}

pub fn series(args: &ReadArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let symbols = parse_symbols(&args.symbols)?;
    let rows = context.data_cache().series.series(&symbols)?;
    Ok(CommandResult::ok(serde_json::to_value(rows)?))
}

pub fn indexes(args: &ReadArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let symbols = parse_symbols(&args.symbols)?;
    let levels = context.data_cache().indexes.last_indexes(&symbols)?;
    Ok(CommandResult::ok(serde_json::to_value(levels)?))
}
