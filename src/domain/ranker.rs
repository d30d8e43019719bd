//! Index strength ranking.
//!
//! Each index is scored with the strength oscillator on the bars visible as
//! of the evaluation date. The score comes from the last bar on or before
//! that date; later bars are never read.

use crate::domain::cache::{SeriesKind, StrengthCache, StrengthKey};
use crate::domain::error::RotatorError;
use crate::domain::indicator::rsi::latest_strength;
use crate::domain::market_data::IndexSeries;
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::debug;

pub const MIN_RANKED_INDICES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStrength {
    pub symbol: String,
    pub score: f64,
    /// Date of the bar the score was computed on.
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SkippedIndex {
    pub symbol: String,
    pub bars: usize,
    pub required: usize,
}

#[derive(Debug, Clone)]
pub struct IndexRanking {
    pub evaluation_date: NaiveDate,
    /// Score descending, ties by symbol ascending.
    pub ranked: Vec<IndexStrength>,
    pub skipped: Vec<SkippedIndex>,
}

impl IndexRanking {
    /// The strongest index; `None` only for an empty, hand-built ranking.
    pub fn selected(&self) -> Option<&IndexStrength> {
        self.ranked.first()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.ranked.iter().map(|s| s.score).collect()
    }
}

pub fn compare_strength(a: &IndexStrength, b: &IndexStrength) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

pub fn rank_indices(
    indices: &[IndexSeries],
    evaluation_date: NaiveDate,
    window: usize,
    cache: Option<&StrengthCache>,
) -> Result<IndexRanking, RotatorError> {
    let mut ranked = Vec::with_capacity(indices.len());
    let mut skipped = Vec::new();

    for series in indices {
        let visible = series.as_of(evaluation_date);
        let compute = || latest_strength(visible, window);
        let result = match cache {
            Some(cache) => cache.get_or_compute(
                StrengthKey {
                    kind: SeriesKind::Index,
                    symbol: series.symbol.clone(),
                    evaluation_date,
                    window,
                },
                compute,
            ),
            None => compute(),
        };

        match result {
            Ok(point) => {
                debug!(index = %series.symbol, score = point.score, as_of = %point.date, "index strength");
                ranked.push(IndexStrength {
                    symbol: series.symbol.clone(),
                    score: point.score,
                    as_of: point.date,
                });
            }
            Err(RotatorError::InsufficientData { bars, required, .. }) => {
                debug!(index = %series.symbol, bars, required, "index skipped: insufficient history");
                skipped.push(SkippedIndex {
                    symbol: series.symbol.clone(),
                    bars,
                    required,
                });
            }
            Err(e) => return Err(e),
        }
    }

    if ranked.len() < MIN_RANKED_INDICES {
        let best = skipped.iter().max_by_key(|s| s.bars);
        return Err(RotatorError::InsufficientData {
            symbol: best.map(|s| s.symbol.clone()).unwrap_or_else(|| "indices".into()),
            bars: best.map(|s| s.bars).unwrap_or(0),
            required: window + 1,
        });
    }

    ranked.sort_by(compare_strength);
    skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    Ok(IndexRanking {
        evaluation_date,
        ranked,
        skipped,
    })
}
