//! CSV directory data adapter.
//!
//! Layout under the base path:
//! - `prices/{symbol}.csv`: `date,open,high,low,close,volume`
//! - `valuations/{symbol}.csv`: `date,value`
//! - `constituents/{index}.csv`: `as_of_date,stock_symbol,stock_name`
//!
//! Index and stock price files share the `prices/` directory.

use crate::domain::constituent::ConstituentRecord;
use crate::domain::error::RotatorError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::valuation::ValuationPoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

#[derive(Debug, Deserialize)]
struct ValuationRow {
    date: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ConstituentRow {
    as_of_date: String,
    stock_symbol: String,
    #[serde(default)]
    stock_name: String,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, dir: &str, symbol: &str) -> PathBuf {
        self.base_path.join(dir).join(format!("{symbol}.csv"))
    }

    fn read_rows<T: DeserializeOwned>(&self, symbol: &str, path: &Path) -> Result<Vec<T>, RotatorError> {
        let content = fs::read_to_string(path).map_err(|e| {
            RotatorError::unavailable(symbol, format!("failed to read {}: {e}", path.display()))
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        rdr.deserialize()
            .map(|row| {
                row.map_err(|e| {
                    RotatorError::unavailable(symbol, format!("CSV parse error in {}: {e}", path.display()))
                })
            })
            .collect()
    }
}

fn parse_date(symbol: &str, raw: &str) -> Result<NaiveDate, RotatorError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RotatorError::unavailable(symbol, format!("invalid date '{raw}': {e}")))
}

impl DataPort for CsvAdapter {
    fn get_price_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RotatorError> {
        let rows: Vec<PriceRow> = self.read_rows(symbol, &self.file_path("prices", symbol))?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let date = parse_date(symbol, &row.date)?;
            if date < start_date || date > end_date {
                continue;
            }
            bars.push(PriceBar {
                symbol: symbol.to_string(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn get_constituents(
        &self,
        index_symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, RotatorError> {
        let rows: Vec<ConstituentRow> =
            self.read_rows(index_symbol, &self.file_path("constituents", index_symbol))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let as_of_date = parse_date(index_symbol, &row.as_of_date)?;
            if as_of_date > as_of {
                continue;
            }
            records.push(ConstituentRecord {
                index_symbol: index_symbol.to_string(),
                stock_symbol: row.stock_symbol,
                stock_name: row.stock_name,
                as_of_date,
            });
        }

        records.sort_by(|a, b| {
            a.as_of_date
                .cmp(&b.as_of_date)
                .then_with(|| a.stock_symbol.cmp(&b.stock_symbol))
        });
        Ok(records)
    }

    fn get_valuation_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, RotatorError> {
        let rows: Vec<ValuationRow> = self.read_rows(symbol, &self.file_path("valuations", symbol))?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let date = parse_date(symbol, &row.date)?;
            if date < start_date || date > end_date {
                continue;
            }
            points.push(ValuationPoint {
                symbol: symbol.to_string(),
                date,
                value: row.value,
            });
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let dir = self.base_path.join("prices");
        let entries = fs::read_dir(&dir).map_err(|e| {
            RotatorError::unavailable("*", format!("failed to read directory {}: {e}", dir.display()))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| RotatorError::unavailable("*", format!("directory entry error: {e}")))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError> {
        let path = self.file_path("prices", symbol);
        if !path.exists() {
            return Ok(None);
        }
        let bars = self.get_price_series(symbol, NaiveDate::MIN, NaiveDate::MAX)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        for sub in ["prices", "valuations", "constituents"] {
            fs::create_dir_all(path.join(sub)).unwrap();
        }

        fs::write(
            path.join("prices/399006.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-16,105.0,115.0,100.0,110.0,60000\n\
             2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             2024-01-17,110.0,120.0,105.0,115.0,55000\n",
        )
        .unwrap();
        fs::write(path.join("prices/000001.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join("valuations/000001.csv"),
            "date,value\n2024-01-15,12.5\n2024-01-31,13.0\n",
        )
        .unwrap();
        fs::write(
            path.join("constituents/399006.csv"),
            "as_of_date,stock_symbol,stock_name\n\
             2024-01-01,000001,Ping An Bank\n\
             2024-01-01,300750,CATL\n\
             2024-06-01,300059,East Money\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn price_series_sorted_and_complete() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .get_price_series("399006", date("2024-01-15"), date("2024-01-17"))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date("2024-01-15"));
        assert_eq!(bars[0].symbol, "399006");
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
    }

    #[test]
    fn price_series_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .get_price_series("399006", date("2024-01-16"), date("2024-01-16"))
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date("2024-01-16"));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.get_price_series("XYZ", date("2024-01-01"), date("2024-01-31"));
        assert!(matches!(result, Err(RotatorError::DataUnavailable { .. })));
    }

    #[test]
    fn malformed_row_is_unavailable() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("prices/BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-15,abc,1,1,1,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);

        let result = adapter.get_price_series("BAD", date("2024-01-01"), date("2024-01-31"));
        assert!(matches!(result, Err(RotatorError::DataUnavailable { .. })));
    }

    #[test]
    fn constituents_exclude_future_snapshots() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let records = adapter.get_constituents("399006", date("2024-03-01")).unwrap();
        let symbols: Vec<&str> = records.iter().map(|r| r.stock_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["000001", "300750"]);
        assert_eq!(records[0].stock_name, "Ping An Bank");
        assert_eq!(records[0].index_symbol, "399006");
    }

    #[test]
    fn valuation_series_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter
            .get_valuation_series("000001", date("2024-01-01"), date("2024-01-20"))
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 12.5);
    }

    #[test]
    fn list_symbols_reads_price_files() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_symbols().unwrap(), vec!["000001", "399006"]);
    }

    #[test]
    fn data_range_reports_bounds() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(
            adapter.get_data_range("399006").unwrap(),
            Some((date("2024-01-15"), date("2024-01-17"), 3))
        );
        assert_eq!(adapter.get_data_range("000001").unwrap(), None);
        assert_eq!(adapter.get_data_range("MISSING").unwrap(), None);
    }
}
