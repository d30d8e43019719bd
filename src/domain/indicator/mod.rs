//! Technical indicator implementations.
//!
//! - `StrengthPoint`: one value of the strength oscillator (see [`rsi`])
//! - `IndicatorPoint` / `IndicatorSeries`: auxiliary series used by the trend filter
//! - `IndicatorType`: indicator identity + parameters

pub mod roc;
pub mod rsi;
pub mod sma;

use chrono::NaiveDate;
use std::fmt;

/// Strength oscillator value (0..=100) at the date of the bar it was computed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthPoint {
    pub date: NaiveDate,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Strength(usize),
    Sma(usize),
    Roc(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Most recent valid value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.values
            .iter()
            .rev()
            .find(|p| p.valid)
            .map(|p| p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Strength(period) => write!(f, "RSI({})", period),
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
        }
    }
}
