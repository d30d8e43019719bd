//! Market-wide reading of the index strength scores and per-index action
//! hints for positions already held.

use std::fmt;

pub const OVERBOUGHT_MEAN: f64 = 80.0;
pub const OVERSOLD_MEAN: f64 = 40.0;
pub const DIVERGENT_STDDEV: f64 = 15.0;

pub const HOLD_FLOOR: f64 = 55.0;
pub const EXIT_BELOW: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketCondition {
    Overbought,
    Oversold,
    Divergent,
    Normal,
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MarketCondition::Overbought => "overbought",
            MarketCondition::Oversold => "oversold",
            MarketCondition::Divergent => "divergent",
            MarketCondition::Normal => "normal",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketRegime {
    pub mean_score: f64,
    pub dispersion: f64,
    pub condition: MarketCondition,
}

impl MarketRegime {
    /// `None` for an empty sample. Dispersion is the population standard
    /// deviation.
    pub fn assess(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let dispersion = variance.sqrt();

        let condition = if mean > OVERBOUGHT_MEAN {
            MarketCondition::Overbought
        } else if mean < OVERSOLD_MEAN {
            MarketCondition::Oversold
        } else if dispersion > DIVERGENT_STDDEV {
            MarketCondition::Divergent
        } else {
            MarketCondition::Normal
        };

        Some(Self {
            mean_score: mean,
            dispersion,
            condition,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Hold,
    /// Halve exposure.
    Reduce,
    Exit,
}

impl IndexAction {
    pub fn for_score(score: f64) -> Self {
        if score >= HOLD_FLOOR {
            IndexAction::Hold
        } else if score >= EXIT_BELOW {
            IndexAction::Reduce
        } else {
            IndexAction::Exit
        }
    }
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndexAction::Hold => "hold",
            IndexAction::Reduce => "reduce",
            IndexAction::Exit => "exit",
        };
        f.write_str(label)
    }
}
