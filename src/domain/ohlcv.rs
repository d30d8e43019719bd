//! Price bar representation and series invariants.

use crate::domain::error::RotatorError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    pub fn prices_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite())
    }
}

/// Checks that dates are strictly increasing (which also rules out duplicate
/// dates), that every bar belongs to `symbol` and that prices are finite.
pub fn validate_series(symbol: &str, bars: &[PriceBar]) -> Result<(), RotatorError> {
    if let Some(bar) = bars.iter().find(|b| !b.prices_finite()) {
        return Err(RotatorError::InvalidSeries {
            symbol: symbol.to_string(),
            reason: format!("non-finite price on {}", bar.date),
        });
    }

    if let Some(bar) = bars.iter().find(|b| b.symbol != symbol) {
        return Err(RotatorError::InvalidSeries {
            symbol: symbol.to_string(),
            reason: format!("bar on {} belongs to {}", bar.date, bar.symbol),
        });
    }

    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(RotatorError::InvalidSeries {
                symbol: symbol.to_string(),
                reason: format!(
                    "dates not strictly increasing: {} followed by {}",
                    pair[0].date, pair[1].date
                ),
            });
        }
    }

    Ok(())
}

/// Bars on or before `date`. Assumes `bars` is sorted ascending.
pub fn bars_as_of(bars: &[PriceBar], date: NaiveDate) -> &[PriceBar] {
    let end = bars.partition_point(|b| b.date <= date);
    &bars[..end]
}
