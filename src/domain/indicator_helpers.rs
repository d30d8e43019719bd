//! Helpers that condense indicator series into the latest values the
//! screener needs.

use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::roc::calculate_roc;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::ohlcv::PriceBar;

/// Bars between the two MA60 points the angle is measured across.
const ANGLE_SPAN: usize = 20;
/// Bars between the two MA5 points the slope is measured across.
const SLOPE_SPAN: usize = 4;

/// Latest moving-average ladder and recent gain of a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSnapshot {
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub ma60: f64,
    /// Fractional change over the gain lookback; `None` while warming up.
    pub recent_gain: Option<f64>,
    /// Angle in degrees of the MA60 change over 20 bars, scaled so a 1%
    /// move reads as 45 degrees. `None` until 21 bars exist.
    pub ma60_angle: Option<f64>,
    /// MA5 change over 4 bars relative to the latest MA5, per bar.
    /// `None` until 5 bars exist.
    pub ma5_slope: Option<f64>,
}

impl TrendSnapshot {
    /// Returns `None` for an empty series.
    pub fn from_bars(bars: &[PriceBar], gain_lookback: usize) -> Option<Self> {
        if bars.is_empty() {
            return None;
        }
        let ma5 = calculate_sma(bars, 5);
        let ma60 = calculate_sma(bars, 60);
        let latest_ma = |period| calculate_sma(bars, period).latest();

        Some(Self {
            ma5: ma5.latest()?,
            ma10: latest_ma(10)?,
            ma20: latest_ma(20)?,
            ma60: ma60.latest()?,
            recent_gain: calculate_roc(bars, gain_lookback).latest(),
            ma60_angle: lagged_pair(&ma60, ANGLE_SPAN).and_then(|(then, now)| {
                (then != 0.0).then(|| ((now / then - 1.0) * 100.0).atan().to_degrees())
            }),
            ma5_slope: lagged_pair(&ma5, SLOPE_SPAN)
                .and_then(|(then, now)| (now != 0.0).then(|| (now - then) / now / 5.0)),
        })
    }

    /// MA5 < MA10 < MA20 < MA60 with MA5 at less than `ratio` of MA60.
    pub fn is_bearish_alignment(&self, ratio: f64) -> bool {
        self.ma5 < self.ma10
            && self.ma10 < self.ma20
            && self.ma20 < self.ma60
            && self.ma60 > 0.0
            && self.ma5 / self.ma60 < ratio
    }
}

/// The value `lag` points before the last one, and the last one.
fn lagged_pair(series: &IndicatorSeries, lag: usize) -> Option<(f64, f64)> {
    let values = &series.values;
    let last = values.last()?;
    let earlier = values.len().checked_sub(lag + 1).map(|i| &values[i])?;
    (earlier.valid && last.valid).then_some((earlier.value, last.value))
}

/// Lowest low over the last `lookback` bars (all bars when shorter).
pub fn lowest_low(bars: &[PriceBar], lookback: usize) -> Option<f64> {
    let start = bars.len().saturating_sub(lookback);
    bars[start..].iter().map(|b| b.low).reduce(f64::min)
}
