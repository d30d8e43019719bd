//! Strength oscillator (RSI-style) over closing prices.
//!
//! Smoothing is a simple moving average of the last `window` close-to-close
//! changes:
//! - avg_gain = mean of positive changes in the window (zeros count)
//! - avg_loss = mean of absolute negative changes in the window
//!
//! Formula: score = 100 - (100 / (1 + avg_gain / avg_loss))
//! - avg_loss == 0 and avg_gain > 0: score = 100
//! - avg_gain == 0 and avg_loss == 0: score = 50
//!
//! Warmup: the first `window` bars produce no point, so the output has
//! `bars.len() - window` entries.

use crate::domain::error::RotatorError;
use crate::domain::indicator::StrengthPoint;
use crate::domain::ohlcv::PriceBar;

pub const NEUTRAL_SCORE: f64 = 50.0;

pub fn compute_strength(bars: &[PriceBar], window: usize) -> Result<Vec<StrengthPoint>, RotatorError> {
    if window == 0 {
        return Err(RotatorError::InvalidParameter {
            name: "window".into(),
            reason: "window must be positive".into(),
        });
    }

    let required = window + 1;
    if bars.len() < required {
        return Err(RotatorError::InsufficientData {
            symbol: bars.first().map(|b| b.symbol.clone()).unwrap_or_default(),
            bars: bars.len(),
            required,
        });
    }

    if let Some(bar) = bars.iter().find(|b| !b.close.is_finite()) {
        return Err(RotatorError::InvalidSeries {
            symbol: bar.symbol.clone(),
            reason: format!("non-finite close on {}", bar.date),
        });
    }

    let mut gains: Vec<f64> = Vec::with_capacity(bars.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(bars.len() - 1);

    for pair in bars.windows(2) {
        let change = pair[1].close - pair[0].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    // Window sums are taken fresh per point so an all-zero window sums to
    // exactly zero.
    let points = (window..bars.len())
        .map(|i| {
            let avg_gain = gains[i - window..i].iter().sum::<f64>() / window as f64;
            let avg_loss = losses[i - window..i].iter().sum::<f64>() / window as f64;
            StrengthPoint {
                date: bars[i].date,
                score: score_from_averages(avg_gain, avg_loss),
            }
        })
        .collect();

    Ok(points)
}

/// Strength at the last bar of `bars`.
pub fn latest_strength(bars: &[PriceBar], window: usize) -> Result<StrengthPoint, RotatorError> {
    let points = compute_strength(bars, window)?;
    // compute_strength always yields at least one point on success
    points.last().copied().ok_or_else(|| RotatorError::InsufficientData {
        symbol: bars.first().map(|b| b.symbol.clone()).unwrap_or_default(),
        bars: bars.len(),
        required: window + 1,
    })
}

fn score_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL_SCORE } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
