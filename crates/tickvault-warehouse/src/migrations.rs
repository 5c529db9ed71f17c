use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_market_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS instruments_id_seq;
CREATE TABLE IF NOT EXISTS instruments (
    id BIGINT PRIMARY KEY DEFAULT nextval('instruments_id_seq'),
    symbol TEXT NOT NULL UNIQUE,
    name TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE SEQUENCE IF NOT EXISTS series_id_seq;
CREATE TABLE IF NOT EXISTS series (
    id BIGINT PRIMARY KEY DEFAULT nextval('series_id_seq'),
    instrument_id BIGINT NOT NULL,
    time_interval TEXT NOT NULL,
    series_date DATE NOT NULL,
    open_price DOUBLE,
    high_price DOUBLE,
    low_price DOUBLE,
    close_price DOUBLE,
    adjusted_close_price DOUBLE,
    volume DOUBLE,
    dividend_amount DOUBLE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE SEQUENCE IF NOT EXISTS trades_id_seq;
CREATE TABLE IF NOT EXISTS trades (
    id BIGINT PRIMARY KEY DEFAULT nextval('trades_id_seq'),
    instrument_id BIGINT NOT NULL,
    trade_date DATE NOT NULL,
    open_price DOUBLE,
    high_price DOUBLE,
    low_price DOUBLE,
    close_price DOUBLE,
    volume DOUBLE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE SEQUENCE IF NOT EXISTS index_values_id_seq;
CREATE TABLE IF NOT EXISTS index_values (
    id BIGINT PRIMARY KEY DEFAULT nextval('index_values_id_seq'),
    instrument_id BIGINT NOT NULL,
    value_date DATE NOT NULL,
    open_price DOUBLE,
    high_price DOUBLE,
    low_price DOUBLE,
    close_price DOUBLE,
    volume DOUBLE,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_lookup_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_series_key ON series(instrument_id, time_interval, series_date);
CREATE INDEX IF NOT EXISTS idx_trades_key ON trades(instrument_id, trade_date);
CREATE INDEX IF NOT EXISTS idx_index_values_key ON index_values(instrument_id, value_date);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let query = format!(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = '{}'",
            escape_sql_string(migration.version)
        );
        let applied_count: i64 = connection.query_row(query.as_str(), [], |row| row.get(0))?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            let insert = format!(
                "INSERT INTO schema_migrations (version) VALUES ('{}')",
                escape_sql_string(migration.version)
            );
            connection.execute_batch(insert.as_str())?;
        }
    }

    Ok(())
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
