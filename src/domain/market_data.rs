//! In-memory market snapshot the engine evaluates against, plus the unified
//! trading timeline.

use crate::domain::constituent::ConstituentRecord;
use crate::domain::error::RotatorError;
use crate::domain::ohlcv::{PriceBar, bars_as_of, validate_series};
use crate::domain::valuation::ValuationPoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// A tracked index and its ordered bars.
#[derive(Debug, Clone)]
pub struct IndexSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl IndexSeries {
    /// Sorts `bars` by date and enforces the series invariants.
    pub fn new(symbol: &str, mut bars: Vec<PriceBar>) -> Result<Self, RotatorError> {
        bars.sort_by_key(|b| b.date);
        validate_series(symbol, &bars)?;
        Ok(Self {
            symbol: symbol.to_string(),
            bars,
        })
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn as_of(&self, date: NaiveDate) -> &[PriceBar] {
        bars_as_of(&self.bars, date)
    }
}

/// Read-only data for one run. Symbols the provider could not supply are
/// listed in `unavailable` and simply absent from the maps.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub indices: Vec<IndexSeries>,
    pub constituents: HashMap<String, Vec<ConstituentRecord>>,
    pub prices: HashMap<String, Vec<PriceBar>>,
    pub valuations: HashMap<String, Vec<ValuationPoint>>,
    pub unavailable: BTreeSet<String>,
}

impl MarketData {
    /// Prefetches index series, constituent snapshots, and the price and
    /// valuation series of every stock that ever appears in a snapshot.
    pub fn load(
        port: &dyn DataPort,
        index_symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let mut data = MarketData::default();

        for symbol in index_symbols {
            let series = port
                .get_price_series(symbol, start_date, end_date)
                .and_then(|bars| IndexSeries::new(symbol, bars));
            match series {
                Ok(series) => {
                    debug!(index = %symbol, bars = series.bar_count(), "loaded index series");
                    data.indices.push(series);
                }
                Err(e) => {
                    warn!(index = %symbol, error = %e, "index series unavailable");
                    data.unavailable.insert(symbol.clone());
                }
            }

            match port.get_constituents(symbol, end_date) {
                Ok(records) => {
                    data.constituents.insert(symbol.clone(), records);
                }
                Err(e) => {
                    warn!(index = %symbol, error = %e, "constituents unavailable");
                }
            }
        }

        let stocks: BTreeSet<String> = data
            .constituents
            .values()
            .flatten()
            .map(|r| r.stock_symbol.clone())
            .collect();

        for stock in &stocks {
            let prices = port
                .get_price_series(stock, start_date, end_date)
                .and_then(|mut bars| {
                    bars.sort_by_key(|b| b.date);
                    validate_series(stock, &bars)?;
                    Ok(bars)
                });
            let valuations = port.get_valuation_series(stock, start_date, end_date);

            match (prices, valuations) {
                (Ok(bars), Ok(mut points)) => {
                    points.sort_by_key(|p| p.date);
                    data.prices.insert(stock.clone(), bars);
                    data.valuations.insert(stock.clone(), points);
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(stock = %stock, error = %e, "stock data unavailable");
                    data.unavailable.insert(stock.clone());
                }
            }
        }

        data
    }

    pub fn index(&self, symbol: &str) -> Option<&IndexSeries> {
        self.indices.iter().find(|s| s.symbol == symbol)
    }

    /// Membership snapshots for `index_symbol`; `None` when the provider
    /// could not supply them.
    pub fn constituents_of(&self, index_symbol: &str) -> Option<&[ConstituentRecord]> {
        self.constituents.get(index_symbol).map(Vec::as_slice)
    }
}

/// Sorted union of every bar date across `series`.
pub fn build_unified_timeline(series: &[IndexSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(symbol: &str, date: &str, close: f64) -> PriceBar {
        PriceBar {
            symbol: symbol.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn index_series_sorts_bars() {
        let series = IndexSeries::new(
            "399006",
            vec![
                make_bar("399006", "2024-01-03", 101.0),
                make_bar("399006", "2024-01-02", 100.0),
            ],
        )
        .unwrap();
        assert_eq!(series.bars[0].close, 100.0);
        assert_eq!(series.bar_count(), 2);
    }

    #[test]
    fn index_series_rejects_duplicates() {
        let result = IndexSeries::new(
            "399006",
            vec![
                make_bar("399006", "2024-01-02", 100.0),
                make_bar("399006", "2024-01-02", 101.0),
            ],
        );
        assert!(matches!(result, Err(RotatorError::InvalidSeries { .. })));
    }

    #[test]
    fn index_series_as_of() {
        let series = IndexSeries::new(
            "399006",
            vec![
                make_bar("399006", "2024-01-02", 100.0),
                make_bar("399006", "2024-01-05", 101.0),
            ],
        )
        .unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(series.as_of(d).len(), 1);
    }

    #[test]
    fn unified_timeline_merges_and_sorts() {
        let a = IndexSeries::new(
            "A",
            vec![make_bar("A", "2024-01-02", 100.0), make_bar("A", "2024-01-05", 101.0)],
        )
        .unwrap();
        let b = IndexSeries::new(
            "B",
            vec![make_bar("B", "2024-01-01", 50.0), make_bar("B", "2024-01-02", 51.0)],
        )
        .unwrap();

        let timeline = build_unified_timeline(&[a, b]);

        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(timeline[2], NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn unified_timeline_empty() {
        assert!(build_unified_timeline(&[]).is_empty());
    }
}
