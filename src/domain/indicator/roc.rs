//! Rate of Change as a fraction.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n]
//! If C[i-n] == 0: ROC = 0
//! Warmup: first n bars invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_roc(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = period > 0 && i >= period;
            let value = if valid {
                let prev_close = bars[i - period].close;
                if prev_close == 0.0 {
                    0.0
                } else {
                    (bar.close - prev_close) / prev_close
                }
            } else {
                0.0
            };
            IndicatorPoint {
                date: bar.date,
                valid,
                value,
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn roc_warmup() {
        let series = calculate_roc(&make_bars(&[10.0, 11.0, 12.0]), 2);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn roc_fraction() {
        let series = calculate_roc(&make_bars(&[10.0, 11.0, 15.0]), 2);
        assert_relative_eq!(series.values[2].value, 0.5);
    }

    #[test]
    fn roc_zero_base() {
        let series = calculate_roc(&make_bars(&[0.0, 5.0]), 1);
        assert_eq!(series.values[1].value, 0.0);
    }

    #[test]
    fn roc_zero_period_never_valid() {
        let series = calculate_roc(&make_bars(&[1.0, 2.0]), 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
