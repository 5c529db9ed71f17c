mod read;
mod sync;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tickvault_cache::DataCache;
use tickvault_core::{AlphaVantageFeed, Envelope, EnvelopeMeta, FeedGateway, Symbol};
use tickvault_warehouse::{InstrumentRow, Warehouse, WarehouseConfig};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Shared handles opened once per invocation.
pub struct CommandContext {
    pub warehouse: Arc<Warehouse>,
    pub gateway: Arc<dyn FeedGateway>,
}

impl CommandContext {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let mut config = WarehouseConfig::default();
        if let Some(db_path) = &cli.db_path {
            config.db_path = db_path.clone();
        }

        let warehouse =
            Warehouse::open(config).map_err(|error| CliError::Command(error.to_string()))?;
        Ok(Self {
            warehouse: Arc::new(warehouse),
            gateway: Arc::new(AlphaVantageFeed::default()),
        })
    }

    pub fn data_cache(&self) -> DataCache {
        DataCache::new(Arc::clone(&self.warehouse), Arc::clone(&self.gateway))
    }

    /// Resolve symbols against the instrument directory, warning about any
    /// that are not tracked yet.
    pub fn resolve_instruments(
        &self,
        raw_symbols: &[String],
    ) -> Result<(Vec<InstrumentRow>, Vec<String>), CliError> {
        let symbols = parse_symbols(raw_symbols)?;
        let names: Vec<String> = symbols.iter().map(|s| s.as_str().to_owned()).collect();
        let rows = self
            .warehouse
            .instruments_for_symbols(&names)
            .map_err(|error| CliError::Command(error.to_string()))?;

        let warnings = symbols
            .iter()
            .filter(|symbol| !rows.iter().any(|row| row.symbol == symbol.as_str()))
            .map(|symbol| {
                format!("symbol '{symbol}' is not in the instrument directory; run `tickvault sync instruments` first")
            })
            .collect();
        Ok((rows, warnings))
    }
}

pub fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>, CliError> {
    raw.iter()
        .map(|value| Symbol::parse(value).map_err(CliError::from))
        .collect()
}

pub fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let context = CommandContext::open(cli)?;

    let command_result = match &cli.command {
        Command::Sync(args) => sync::run(args, &context)?,
        Command::Prices(args) => read::prices(args, &context)?,
        Command::Series(args) => read::series(args, &context)?,
        Command::Indexes(args) => read::indexes(args, &context)?,
    };

    let CommandResult { data, warnings } = command_result;

    let generated_at = time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("UTC timestamps are RFC3339 formattable");
    let mut meta = EnvelopeMeta::new(
        Uuid::new_v4().to_string(),
        generated_at,
        started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
    );
    for warning in warnings {
        meta.push_warning(warning);
    }

    Ok(Envelope::success(meta, data))
}
