//! DuckDB-backed market store for tickvault.
//!
//! Holds the instrument directory plus the series, trade, and index-value
//! caches. Reads hand back baselines with the owning instrument pre-joined;
//! writes happen through a per-batch transaction scope.

pub mod duckdb;
pub mod migrations;
pub mod records;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::Connection;
use thiserror::Error;

pub use crate::duckdb::ConnectionManager;
pub use records::{InstrumentRow, SeriesRow, SnapshotRow};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot update a row that was never persisted")]
    UnsavedRow,

    #[error("required field '{field}' is missing")]
    MissingField { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_home();
        let db_path = home.join("cache").join("market.duckdb");
        Self { home, db_path }
    }
}

#[derive(Clone)]
pub struct Warehouse {
    manager: ConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        fs::create_dir_all(&config.home)?;
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = ConnectionManager::open(config.db_path)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        tracing::debug!(db_path = %warehouse.db_path().display(), "market store ready");
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Directory rows for the given symbols, ordered by symbol.
    pub fn instruments_for_symbols(
        &self,
        symbols: &[String],
    ) -> Result<Vec<InstrumentRow>, WarehouseError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT id, symbol, name FROM instruments WHERE symbol IN ({}) ORDER BY symbol",
            sql_string_list(symbols)
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement
            .query_map([], |row| {
                Ok(InstrumentRow {
                    id: row.get(0)?,
                    symbol: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stored series for the given symbols: joined to their instruments,
    /// deduplicated, ordered by instrument, interval, then date. This is the
    /// baseline contract the reconciliation engine relies on.
    pub fn series_baseline(&self, symbols: &[String]) -> Result<Vec<SeriesRow>, WarehouseError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.manager.acquire()?;
        let sql = format!(
            r#"
SELECT DISTINCT s.id, s.instrument_id, i.symbol, s.time_interval,
       CAST(s.series_date AS VARCHAR),
       s.open_price, s.high_price, s.low_price, s.close_price,
       s.adjusted_close_price, s.volume, s.dividend_amount
FROM series s
JOIN instruments i ON i.id = s.instrument_id
WHERE i.symbol IN ({})
ORDER BY s.instrument_id, s.time_interval, s.series_date
"#,
            sql_string_list(symbols)
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement
            .query_map([], |row| {
                Ok(SeriesRow {
                    id: row.get(0)?,
                    instrument_id: row.get(1)?,
                    symbol: row.get(2)?,
                    time_interval: row.get(3)?,
                    series_date: row.get(4)?,
                    open_price: row.get(5)?,
                    high_price: row.get(6)?,
                    low_price: row.get(7)?,
                    close_price: row.get(8)?,
                    adjusted_close_price: row.get(9)?,
                    volume: row.get(10)?,
                    dividend_amount: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stored trade snapshots for the given symbols, instrument pre-joined,
    /// ordered by instrument then date.
    pub fn trades_baseline(&self, symbols: &[String]) -> Result<Vec<SnapshotRow>, WarehouseError> {
        self.snapshot_baseline("trades", "trade_date", symbols)
    }

    /// Stored index levels for the given symbols, instrument pre-joined,
    /// ordered by instrument then date.
    pub fn index_baseline(&self, symbols: &[String]) -> Result<Vec<SnapshotRow>, WarehouseError> {
        self.snapshot_baseline("index_values", "value_date", symbols)
    }

    fn snapshot_baseline(
        &self,
        table: &str,
        date_column: &str,
        symbols: &[String],
    ) -> Result<Vec<SnapshotRow>, WarehouseError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.manager.acquire()?;
        let sql = format!(
            r#"
SELECT DISTINCT t.id, t.instrument_id, i.symbol, CAST(t.{date_column} AS VARCHAR),
       t.open_price, t.high_price, t.low_price, t.close_price, t.volume
FROM {table} t
JOIN instruments i ON i.id = t.instrument_id
WHERE i.symbol IN ({symbols})
ORDER BY t.instrument_id, t.{date_column}
"#,
            table = table,
            date_column = date_column,
            symbols = sql_string_list(symbols),
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement
            .query_map([], |row| {
                Ok(SnapshotRow {
                    id: row.get(0)?,
                    instrument_id: row.get(1)?,
                    symbol: row.get(2)?,
                    date: row.get(3)?,
                    open_price: row.get(4)?,
                    high_price: row.get(5)?,
                    low_price: row.get(6)?,
                    close_price: row.get(7)?,
                    volume: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Run `work` inside one store transaction.
    ///
    /// Per-record application failures must be handled inside `work`; an
    /// `Err` returned here rolls the whole batch back, and a COMMIT/ROLLBACK
    /// failure propagates as an infrastructure error.
    pub fn with_transaction<T>(
        &self,
        work: impl FnOnce(&WriteBatch<'_>) -> Result<T, WarehouseError>,
    ) -> Result<T, WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let batch = WriteBatch {
            connection: &connection,
        };
        let result = work(&batch);
        finalize_transaction(&connection, result)
    }
}

/// Write surface available inside one batch transaction.
pub struct WriteBatch<'a> {
    connection: &'a Connection,
}

impl WriteBatch<'_> {
    pub fn insert_instrument(
        &self,
        symbol: &str,
        name: Option<&str>,
    ) -> Result<InstrumentRow, WarehouseError> {
        let sql = format!(
            "INSERT INTO instruments (symbol, name) VALUES ('{}', {}) RETURNING id",
            escape_sql_string(symbol),
            sql_option_text(name),
        );
        let id: i64 = self.connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        Ok(InstrumentRow {
            id,
            symbol: symbol.to_owned(),
            name: name.map(str::to_owned),
        })
    }

    pub fn update_instrument(&self, row: &InstrumentRow) -> Result<(), WarehouseError> {
        let sql = format!(
            "UPDATE instruments SET name = {}, updated_at = CURRENT_TIMESTAMP WHERE id = {}",
            sql_option_text(row.name.as_deref()),
            row.id,
        );
        self.connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    pub fn insert_series(&self, row: &SeriesRow) -> Result<i64, WarehouseError> {
        validate_series_key(row)?;
        let sql = format!(
            r#"
INSERT INTO series (
    instrument_id, time_interval, series_date, open_price, high_price,
    low_price, close_price, adjusted_close_price, volume, dividend_amount
) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {})
RETURNING id
"#,
            row.instrument_id,
            sql_option_text(row.time_interval.as_deref()),
            sql_option_date(row.series_date.as_deref()),
            sql_option_f64(row.open_price),
            sql_option_f64(row.high_price),
            sql_option_f64(row.low_price),
            sql_option_f64(row.close_price),
            sql_option_f64(row.adjusted_close_price),
            sql_option_f64(row.volume),
            sql_option_f64(row.dividend_amount),
        );
        let id: i64 = self.connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        Ok(id)
    }

    pub fn update_series(&self, row: &SeriesRow) -> Result<(), WarehouseError> {
        let id = row.id.ok_or(WarehouseError::UnsavedRow)?;
        validate_series_key(row)?;
        let sql = format!(
            r#"
UPDATE series SET
    time_interval = {},
    series_date = {},
    open_price = {},
    high_price = {},
    low_price = {},
    close_price = {},
    adjusted_close_price = {},
    volume = {},
    dividend_amount = {},
    updated_at = CURRENT_TIMESTAMP
WHERE id = {}
"#,
            sql_option_text(row.time_interval.as_deref()),
            sql_option_date(row.series_date.as_deref()),
            sql_option_f64(row.open_price),
            sql_option_f64(row.high_price),
            sql_option_f64(row.low_price),
            sql_option_f64(row.close_price),
            sql_option_f64(row.adjusted_close_price),
            sql_option_f64(row.volume),
            sql_option_f64(row.dividend_amount),
            id,
        );
        self.connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    pub fn insert_trade(&self, row: &SnapshotRow) -> Result<i64, WarehouseError> {
        self.insert_snapshot("trades", "trade_date", row)
    }

    pub fn update_trade(&self, row: &SnapshotRow) -> Result<(), WarehouseError> {
        self.update_snapshot("trades", "trade_date", row)
    }

    pub fn insert_index_value(&self, row: &SnapshotRow) -> Result<i64, WarehouseError> {
        self.insert_snapshot("index_values", "value_date", row)
    }

    pub fn update_index_value(&self, row: &SnapshotRow) -> Result<(), WarehouseError> {
        self.update_snapshot("index_values", "value_date", row)
    }

    fn insert_snapshot(
        &self,
        table: &str,
        date_column: &str,
        row: &SnapshotRow,
    ) -> Result<i64, WarehouseError> {
        validate_snapshot_key(row)?;
        let sql = format!(
            r#"
INSERT INTO {table} (
    instrument_id, {date_column}, open_price, high_price, low_price, close_price, volume
) VALUES ({}, {}, {}, {}, {}, {}, {})
RETURNING id
"#,
            row.instrument_id,
            sql_option_date(row.date.as_deref()),
            sql_option_f64(row.open_price),
            sql_option_f64(row.high_price),
            sql_option_f64(row.low_price),
            sql_option_f64(row.close_price),
            sql_option_f64(row.volume),
            table = table,
            date_column = date_column,
        );
        let id: i64 = self.connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        Ok(id)
    }

    fn update_snapshot(
        &self,
        table: &str,
        date_column: &str,
        row: &SnapshotRow,
    ) -> Result<(), WarehouseError> {
        let id = row.id.ok_or(WarehouseError::UnsavedRow)?;
        validate_snapshot_key(row)?;
        let sql = format!(
            r#"
UPDATE {table} SET
    {date_column} = {},
    open_price = {},
    high_price = {},
    low_price = {},
    close_price = {},
    volume = {},
    updated_at = CURRENT_TIMESTAMP
WHERE id = {}
"#,
            sql_option_date(row.date.as_deref()),
            sql_option_f64(row.open_price),
            sql_option_f64(row.high_price),
            sql_option_f64(row.low_price),
            sql_option_f64(row.close_price),
            sql_option_f64(row.volume),
            id,
            table = table,
            date_column = date_column,
        );
        self.connection.execute_batch(sql.as_str())?;
        Ok(())
    }
}

// Row keys are validated before any SQL runs so that a malformed record
// fails on its own without invalidating the surrounding transaction.
fn validate_series_key(row: &SeriesRow) -> Result<(), WarehouseError> {
    if row.time_interval.is_none() {
        return Err(WarehouseError::MissingField {
            field: "time_interval",
        });
    }
    if row.series_date.is_none() {
        return Err(WarehouseError::MissingField {
            field: "series_date",
        });
    }
    Ok(())
}

fn validate_snapshot_key(row: &SnapshotRow) -> Result<(), WarehouseError> {
    if row.date.is_none() {
        return Err(WarehouseError::MissingField { field: "date" });
    }
    Ok(())
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKVAULT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickvault");
    }

    PathBuf::from(".tickvault")
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

fn sql_string_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("'{}'", escape_sql_string(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sql_option_text(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("'{}'", escape_sql_string(value)),
        None => String::from("NULL"),
    }
}

fn sql_option_date(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("TRY_CAST('{}' AS DATE)", escape_sql_string(value)),
        None => String::from("NULL"),
    }
}

fn sql_option_f64(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => String::from("NULL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_warehouse(dir: &Path) -> Warehouse {
        let home = dir.join("tickvault-home");
        let db_path = home.join("cache").join("market.duckdb");
        Warehouse::open(WarehouseConfig { home, db_path }).expect("warehouse open")
    }

    fn seed_instrument(warehouse: &Warehouse, symbol: &str) -> InstrumentRow {
        warehouse
            .with_transaction(|tx| tx.insert_instrument(symbol, None))
            .expect("insert instrument")
    }

    #[test]
    fn migrations_are_idempotent_across_reopens() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());
        warehouse.initialize().expect("second initialize");

        let rows = warehouse
            .instruments_for_symbols(&[String::from("AAPL")])
            .expect("query");
        assert!(rows.is_empty());
    }

    #[test]
    fn inserted_instruments_are_queryable_by_symbol() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());

        let inserted = warehouse
            .with_transaction(|tx| tx.insert_instrument("AAPL", Some("Apple Inc.")))
            .expect("insert");
        assert!(inserted.id > 0);

        let rows = warehouse
            .instruments_for_symbols(&[String::from("AAPL"), String::from("MSFT")])
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[0].name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn instrument_names_with_quotes_round_trip() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());

        warehouse
            .with_transaction(|tx| tx.insert_instrument("ORLY", Some("O'Reilly Automotive")))
            .expect("insert");

        let rows = warehouse
            .instruments_for_symbols(&[String::from("ORLY")])
            .expect("query");
        assert_eq!(rows[0].name.as_deref(), Some("O'Reilly Automotive"));
    }

    #[test]
    fn series_baseline_is_ordered_by_instrument_interval_date() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());
        let aapl = seed_instrument(&warehouse, "AAPL");
        let msft = seed_instrument(&warehouse, "MSFT");

        let mut row = SeriesRow::draft(msft.id, "MSFT");
        row.time_interval = Some(String::from("monthly"));
        row.series_date = Some(String::from("2024-02-29"));
        row.close_price = Some(404.0);
        warehouse
            .with_transaction(|tx| {
                tx.insert_series(&row)?;

                let mut late = SeriesRow::draft(aapl.id, "AAPL");
                late.time_interval = Some(String::from("monthly"));
                late.series_date = Some(String::from("2024-03-28"));
                late.close_price = Some(188.5);
                tx.insert_series(&late)?;

                let mut early = SeriesRow::draft(aapl.id, "AAPL");
                early.time_interval = Some(String::from("monthly"));
                early.series_date = Some(String::from("2024-01-31"));
                early.close_price = Some(184.0);
                tx.insert_series(&early)?;
                Ok(())
            })
            .expect("seed series");

        let baseline = warehouse
            .series_baseline(&[String::from("AAPL"), String::from("MSFT")])
            .expect("baseline");
        assert_eq!(baseline.len(), 3);
        assert_eq!(baseline[0].symbol, "AAPL");
        assert_eq!(baseline[0].series_date.as_deref(), Some("2024-01-31"));
        assert_eq!(baseline[1].series_date.as_deref(), Some("2024-03-28"));
        assert_eq!(baseline[2].symbol, "MSFT");
    }

    #[test]
    fn series_baseline_excludes_other_symbols() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());
        let aapl = seed_instrument(&warehouse, "AAPL");
        seed_instrument(&warehouse, "MSFT");

        warehouse
            .with_transaction(|tx| {
                let mut row = SeriesRow::draft(aapl.id, "AAPL");
                row.time_interval = Some(String::from("monthly"));
                row.series_date = Some(String::from("2024-03-28"));
                tx.insert_series(&row)?;
                Ok(())
            })
            .expect("seed");

        let baseline = warehouse
            .series_baseline(&[String::from("MSFT")])
            .expect("baseline");
        assert!(baseline.is_empty());
    }

    #[test]
    fn transaction_error_rolls_back_all_writes() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());

        let result: Result<(), WarehouseError> = warehouse.with_transaction(|tx| {
            tx.insert_instrument("AAPL", None)?;
            Err(WarehouseError::UnsavedRow)
        });
        assert!(result.is_err());

        let rows = warehouse
            .instruments_for_symbols(&[String::from("AAPL")])
            .expect("query");
        assert!(rows.is_empty(), "rolled-back insert must not be visible");
    }

    #[test]
    fn series_insert_without_interval_fails_per_record() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());
        let aapl = seed_instrument(&warehouse, "AAPL");

        let outcome = warehouse.with_transaction(|tx| {
            let mut missing_interval = SeriesRow::draft(aapl.id, "AAPL");
            missing_interval.series_date = Some(String::from("2024-03-28"));
            let error = tx
                .insert_series(&missing_interval)
                .expect_err("row without an interval must be rejected");
            assert!(matches!(
                error,
                WarehouseError::MissingField {
                    field: "time_interval"
                }
            ));

            let mut healthy = SeriesRow::draft(aapl.id, "AAPL");
            healthy.time_interval = Some(String::from("monthly"));
            healthy.series_date = Some(String::from("2024-03-28"));
            tx.insert_series(&healthy)?;
            Ok(())
        });

        outcome.expect("transaction should commit");
        let baseline = warehouse
            .series_baseline(&[String::from("AAPL")])
            .expect("baseline");
        assert_eq!(baseline.len(), 1);
    }

    #[test]
    fn snapshot_update_replaces_all_fields() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(temp.path());
        let aapl = seed_instrument(&warehouse, "AAPL");

        let id = warehouse
            .with_transaction(|tx| {
                let mut row = SnapshotRow::draft(aapl.id, "AAPL");
                row.date = Some(String::from("2024-03-25"));
                row.close_price = Some(188.5);
                tx.insert_trade(&row)
            })
            .expect("insert trade");

        warehouse
            .with_transaction(|tx| {
                let mut row = SnapshotRow::draft(aapl.id, "AAPL");
                row.id = Some(id);
                row.date = Some(String::from("2024-03-26"));
                row.close_price = Some(190.25);
                row.volume = Some(1_000.0);
                tx.update_trade(&row)
            })
            .expect("update trade");

        let baseline = warehouse
            .trades_baseline(&[String::from("AAPL")])
            .expect("baseline");
        assert_eq!(baseline.len(), 1);
        assert_eq!(baseline[0].date.as_deref(), Some("2024-03-26"));
        assert_eq!(baseline[0].close_price, Some(190.25));
        assert_eq!(baseline[0].volume, Some(1_000.0));
    }
}
