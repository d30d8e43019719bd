#![allow(dead_code)]

use chrono::NaiveDate;
pub use rotator::domain::constituent::ConstituentRecord;
use rotator::domain::error::RotatorError;
pub use rotator::domain::ohlcv::PriceBar;
pub use rotator::domain::valuation::ValuationPoint;
use rotator::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub prices: HashMap<String, Vec<PriceBar>>,
    pub constituents: HashMap<String, Vec<ConstituentRecord>>,
    pub valuations: HashMap<String, Vec<ValuationPoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            constituents: HashMap::new(),
            valuations: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.prices.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_constituents(mut self, index: &str, records: Vec<ConstituentRecord>) -> Self {
        self.constituents.insert(index.to_string(), records);
        self
    }

    pub fn with_valuation(mut self, symbol: &str, date: &str, value: f64) -> Self {
        self.valuations
            .entry(symbol.to_string())
            .or_default()
            .push(ValuationPoint {
                symbol: symbol.to_string(),
                date: parse(date),
                value,
            });
        self
    }

    /// Adds a stock to `index` with its own price series and one valuation.
    pub fn with_stock(
        self,
        index: &str,
        symbol: &str,
        as_of: &str,
        closes: &[f64],
        start: &str,
        valuation: f64,
    ) -> Self {
        let mut port = self.with_bars(symbol, bars_from_closes(symbol, start, closes));
        port.constituents
            .entry(index.to_string())
            .or_default()
            .push(member(index, symbol, as_of));
        port.with_valuation(symbol, start, valuation)
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), RotatorError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(RotatorError::unavailable(symbol, reason.clone())),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn get_price_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, RotatorError> {
        self.check(symbol)?;
        let bars = self
            .prices
            .get(symbol)
            .ok_or_else(|| RotatorError::unavailable(symbol, "no price series"))?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn get_constituents(
        &self,
        index_symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, RotatorError> {
        self.check(index_symbol)?;
        let records = self
            .constituents
            .get(index_symbol)
            .ok_or_else(|| RotatorError::unavailable(index_symbol, "no constituents"))?;
        Ok(records
            .iter()
            .filter(|r| r.as_of_date <= as_of)
            .cloned()
            .collect())
    }

    fn get_valuation_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ValuationPoint>, RotatorError> {
        self.check(symbol)?;
        Ok(self
            .valuations
            .get(symbol)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let mut symbols: Vec<String> = self.prices.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError> {
        self.check(symbol)?;
        match self.prices.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn parse(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date: parse(date),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000,
    }
}

/// One bar per calendar day starting at `start`.
pub fn bars_from_closes(symbol: &str, start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let start = parse(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            symbol: symbol.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000,
        })
        .collect()
}

pub fn member(index: &str, stock: &str, as_of: &str) -> ConstituentRecord {
    ConstituentRecord {
        index_symbol: index.to_string(),
        stock_symbol: stock.to_string(),
        stock_name: format!("{stock} Corp"),
        as_of_date: parse(as_of),
    }
}

pub fn generate_bars(symbol: &str, start_date: &str, count: usize, start_price: f64) -> Vec<PriceBar> {
    let start = parse(start_date);
    (0..count)
        .map(|i| {
            let price = start_price + (i as f64) * 0.5;
            PriceBar {
                symbol: symbol.to_string(),
                date: start + chrono::Duration::days(i as i64),
                open: price - 0.25,
                high: price + 1.0,
                low: price - 1.0,
                close: price,
                volume: 1000 + i as i64,
            }
        })
        .collect()
}
