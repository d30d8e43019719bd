//! SQLite data adapter.
//!
//! Pool and schema failures are `Database` errors; failures while serving a
//! `DataPort` query are `DataUnavailable` for the symbol asked about.

use crate::domain::constituent::ConstituentRecord;
use crate::domain::error::RotatorError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::valuation::ValuationPoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn parse_row_date(raw: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(raw.len(), rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RotatorError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| RotatorError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| RotatorError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, RotatorError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| RotatorError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, RotatorError> {
        self.pool.get().map_err(|e: r2d2::Error| RotatorError::Database {
            reason: e.to_string(),
        })
    }

    fn query_connection(
        &self,
        symbol: &str,
    ) -> Result<PooledConnection<SqliteConnectionManager>, RotatorError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| RotatorError::unavailable(symbol, e.to_string()))
    }

    pub fn initialize_schema(&self) -> Result<(), RotatorError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS constituents (
                index_symbol TEXT NOT NULL,
                stock_symbol TEXT NOT NULL,
                stock_name TEXT NOT NULL DEFAULT '',
                as_of_date TEXT NOT NULL,
                PRIMARY KEY (index_symbol, stock_symbol, as_of_date)
            );
            CREATE TABLE IF NOT EXISTS valuations (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);
            CREATE INDEX IF NOT EXISTS idx_constituents_as_of ON constituents(index_symbol, as_of_date);",
        )
        .map_err(|e: rusqlite::Error| RotatorError::Database {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<(), RotatorError> {
        let mut conn = self.connection()?;
        let db_err = |e: rusqlite::Error| RotatorError::Database {
            reason: e.to_string(),
        };

        let tx = conn.transaction().map_err(db_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;

        Ok(())
    }

    pub fn insert_constituents(&self, records: &[ConstituentRecord]) -> Result<(), RotatorError> {
        let mut conn = self.connection()?;
        let db_err = |e: rusqlite::Error| RotatorError::Database {
            reason: e.to_string(),
        };

        let tx = conn.transaction().map_err(db_err)?;
        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO constituents (index_symbol, stock_symbol, stock_name, as_of_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.index_symbol,
                    record.stock_symbol,
                    record.stock_name,
                    record.as_of_date.format(DATE_FORMAT).to_string()
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;

        Ok(())
    }

    pub fn insert_valuations(&self, points: &[ValuationPoint]) -> Result<(), RotatorError> {
        let mut conn = self.connection()?;
        let db_err = |e: rusqlite::Error| RotatorError::Database {
            reason: e.to_string(),
        };

        let tx = conn.transaction().map_err(db_err)?;
        for point in points {
            tx.execute(
                "INSERT OR REPLACE INTO valuations (symbol, date, value) VALUES (?1, ?2, ?3)",
                params![point.symbol, point.date.format(DATE_FORMAT).to_string(), point.value],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;

        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn get_price_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RotatorError> {
        let conn = self.query_connection(symbol)?;
        let query_err = |e: rusqlite::Error| RotatorError::unavailable(symbol, e.to_string());

        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(PriceBar {
                        symbol: row.get(0)?,
                        date: parse_row_date(row.get(1)?)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn get_constituents(
        &self,
        index_symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, RotatorError> {
        let conn = self.query_connection(index_symbol)?;
        let query_err = |e: rusqlite::Error| RotatorError::unavailable(index_symbol, e.to_string());

        let mut stmt = conn
            .prepare(
                "SELECT index_symbol, stock_symbol, stock_name, as_of_date
                 FROM constituents
                 WHERE index_symbol = ?1 AND as_of_date <= ?2
                 ORDER BY as_of_date ASC, stock_symbol ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![index_symbol, as_of.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(ConstituentRecord {
                        index_symbol: row.get(0)?,
                        stock_symbol: row.get(1)?,
                        stock_name: row.get(2)?,
                        as_of_date: parse_row_date(row.get(3)?)?,
                    })
                },
            )
            .map_err(query_err)?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;
        if records.is_empty() {
            return Err(RotatorError::unavailable(
                index_symbol,
                format!("no constituent snapshot on or before {as_of}"),
            ));
        }
        Ok(records)
    }

    fn get_valuation_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, RotatorError> {
        let conn = self.query_connection(symbol)?;
        let query_err = |e: rusqlite::Error| RotatorError::unavailable(symbol, e.to_string());

        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, value FROM valuations
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(ValuationPoint {
                        symbol: row.get(0)?,
                        date: parse_row_date(row.get(1)?)?,
                        value: row.get(2)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let conn = self.query_connection("*")?;
        let query_err = |e: rusqlite::Error| RotatorError::unavailable("*", e.to_string());

        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError> {
        let conn = self.query_connection(symbol)?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e: rusqlite::Error| RotatorError::unavailable(symbol, e.to_string()))?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |raw: &str| {
                    NaiveDate::parse_from_str(raw, DATE_FORMAT)
                        .map_err(|e| RotatorError::unavailable(symbol, e.to_string()))
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
