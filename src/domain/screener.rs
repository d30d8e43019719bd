//! Constituent screening.
//!
//! 1. Membership: latest snapshot of the index on or before the date.
//! 2. Per-stock filters (history, valuation, trend), then the valuation band
//!    computed from the surviving cross-section.
//! 3. Composite score from normalized momentum and valuation.
//! 4. Rank by composite descending, ties by symbol.
//! 5. Keep the top K; fewer than `min_selection` survivors is an error.
//!
//! Per-stock work only reads that stock's own series, so it runs on the
//! rayon pool.

use crate::domain::cache::{SeriesKind, StrengthCache, StrengthKey};
use crate::domain::constituent::{ConstituentRecord, resolve_membership};
use crate::domain::error::RotatorError;
use crate::domain::indicator::rsi::latest_strength;
use crate::domain::indicator_helpers::{TrendSnapshot, lowest_low};
use crate::domain::ohlcv::{PriceBar, bars_as_of};
use crate::domain::valuation::{ValuationBand, ValuationPoint, value_as_of};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// (x - mean) / population std dev; all zero when the spread is zero.
    ZScore,
    /// Average rank scaled to 0..=1; a single value maps to 0.5.
    PercentileRank,
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z-score" | "z" => Ok(Normalization::ZScore),
            "rank" | "percentile" | "percentile_rank" => Ok(Normalization::PercentileRank),
            other => Err(format!("unknown normalization '{other}' (expected zscore or rank)")),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::ZScore => f.write_str("zscore"),
            Normalization::PercentileRank => f.write_str("rank"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendFilter {
    pub max_recent_gain: f64,
    pub gain_lookback: usize,
    pub ma_down_ratio: f64,
    /// Degrees; a steeper MA60 decline is excluded.
    pub min_ma60_angle: f64,
    /// Per-bar MA5 slope; a faster decline is excluded.
    pub min_ma5_slope: f64,
}

impl Default for TrendFilter {
    fn default() -> Self {
        Self {
            max_recent_gain: 0.7,
            gain_lookback: 10,
            ma_down_ratio: 0.95,
            min_ma60_angle: -20.0,
            min_ma5_slope: -0.003,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenFilters {
    pub stock_window: usize,
    pub valuation_lower_pct: f64,
    pub valuation_upper_pct: f64,
    pub exclude_non_positive_valuation: bool,
    pub lower_valuation_is_better: bool,
    pub momentum_weight: f64,
    pub valuation_weight: f64,
    pub normalization: Normalization,
    pub trend_filter: Option<TrendFilter>,
    pub top_k: usize,
    pub min_selection: usize,
    pub stop_loss_lookback: usize,
}

impl Default for ScreenFilters {
    fn default() -> Self {
        Self {
            stock_window: 6,
            valuation_lower_pct: 10.0,
            valuation_upper_pct: 90.0,
            exclude_non_positive_valuation: true,
            lower_valuation_is_better: true,
            momentum_weight: 0.5,
            valuation_weight: 0.5,
            normalization: Normalization::ZScore,
            trend_filter: Some(TrendFilter::default()),
            top_k: 15,
            min_selection: 10,
            stop_loss_lookback: 10,
        }
    }
}

impl ScreenFilters {
    pub fn validate(&self) -> Result<(), RotatorError> {
        let invalid = |name: &str, reason: &str| RotatorError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if self.stock_window == 0 {
            return Err(invalid("stock_window", "must be positive"));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k", "must be at least 1"));
        }
        if self.min_selection == 0 || self.min_selection > self.top_k {
            return Err(invalid("min_selection", "must be between 1 and top_k"));
        }
        let pct_ok = |p: f64| (0.0..=100.0).contains(&p);
        if !pct_ok(self.valuation_lower_pct)
            || !pct_ok(self.valuation_upper_pct)
            || self.valuation_lower_pct > self.valuation_upper_pct
        {
            return Err(invalid(
                "valuation_band",
                "percentiles must satisfy 0 <= lower <= upper <= 100",
            ));
        }
        if !self.momentum_weight.is_finite() || !self.valuation_weight.is_finite() {
            return Err(invalid("weights", "must be finite"));
        }
        if let Some(trend) = &self.trend_filter {
            if trend.gain_lookback == 0 {
                return Err(invalid("gain_lookback", "must be positive"));
            }
            let finite = [
                trend.max_recent_gain,
                trend.ma_down_ratio,
                trend.min_ma60_angle,
                trend.min_ma5_slope,
            ];
            if !finite.iter().all(|v| v.is_finite()) {
                return Err(invalid("trend_filter", "thresholds must be finite"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockScore {
    pub stock_symbol: String,
    pub stock_name: String,
    pub evaluation_date: NaiveDate,
    pub valuation_metric: f64,
    pub momentum_metric: f64,
    pub composite_score: f64,
    pub rank: usize,
    /// Lowest low over the stop-loss lookback.
    pub stop_loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    InsufficientHistory { bars: usize, required: usize },
    MissingValuation,
    NonPositiveValuation { value: f64 },
    LongTrendDown { angle: f64 },
    BearishAlignment,
    OverExtended { gain: f64 },
    ShortTrendDown { slope: f64 },
    OutsideValuationBand { value: f64 },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::InsufficientHistory { bars, required } => {
                write!(f, "insufficient history ({bars} of {required} bars)")
            }
            ExclusionReason::MissingValuation => f.write_str("no valuation on or before date"),
            ExclusionReason::NonPositiveValuation { value } => {
                write!(f, "non-positive valuation {value:.4}")
            }
            ExclusionReason::OverExtended { gain } => {
                write!(f, "recent gain {:.1}% too large", gain * 100.0)
            }
            ExclusionReason::LongTrendDown { angle } => {
                write!(f, "MA60 falling at {angle:.1} degrees")
            }
            ExclusionReason::BearishAlignment => f.write_str("bearish moving-average alignment"),
            ExclusionReason::ShortTrendDown { slope } => {
                write!(f, "MA5 slope {slope:.4} per bar")
            }
            ExclusionReason::OutsideValuationBand { value } => {
                write!(f, "valuation {value:.4} outside band")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub stock_symbol: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    pub index_symbol: String,
    pub evaluation_date: NaiveDate,
    pub members: usize,
    pub band: Option<ValuationBand>,
    /// Rank order, already truncated to `top_k`.
    pub scores: Vec<StockScore>,
    /// Sorted by stock symbol.
    pub excluded: Vec<Exclusion>,
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    record: &'a ConstituentRecord,
    momentum: f64,
    valuation: f64,
    stop_loss: f64,
}

#[allow(clippy::too_many_arguments)]
pub fn screen_constituents(
    index_symbol: &str,
    evaluation_date: NaiveDate,
    constituents: &[ConstituentRecord],
    prices: &HashMap<String, Vec<PriceBar>>,
    valuations: &HashMap<String, Vec<ValuationPoint>>,
    filters: &ScreenFilters,
    cache: Option<&StrengthCache>,
) -> Result<ScreenOutcome, RotatorError> {
    filters.validate()?;

    let members = resolve_membership(constituents, index_symbol, evaluation_date);

    let evaluated: Vec<Result<Candidate, Exclusion>> = members
        .par_iter()
        .map(|record| {
            evaluate_stock(
                record,
                evaluation_date,
                prices.get(&record.stock_symbol).map(Vec::as_slice).unwrap_or(&[]),
                valuations.get(&record.stock_symbol).map(Vec::as_slice).unwrap_or(&[]),
                filters,
                cache,
            )
        })
        .collect();

    let mut candidates = Vec::with_capacity(evaluated.len());
    let mut excluded = Vec::new();
    for result in evaluated {
        match result {
            Ok(candidate) => candidates.push(candidate),
            Err(exclusion) => excluded.push(exclusion),
        }
    }

    let sample: Vec<f64> = candidates.iter().map(|c| c.valuation).collect();
    let band = ValuationBand::from_sample(
        &sample,
        filters.valuation_lower_pct,
        filters.valuation_upper_pct,
    );
    if let Some(band) = band {
        candidates.retain(|c| {
            let inside = band.contains(c.valuation);
            if !inside {
                excluded.push(Exclusion {
                    stock_symbol: c.record.stock_symbol.clone(),
                    reason: ExclusionReason::OutsideValuationBand { value: c.valuation },
                });
            }
            inside
        });
    }

    excluded.sort_by(|a, b| a.stock_symbol.cmp(&b.stock_symbol));
    for exclusion in &excluded {
        debug!(stock = %exclusion.stock_symbol, reason = %exclusion.reason, "excluded");
    }

    let passed = candidates.len();
    if passed < filters.min_selection {
        return Err(RotatorError::EmptySelection {
            index: index_symbol.to_string(),
            passed,
            required: filters.min_selection,
        });
    }

    let momentum: Vec<f64> = candidates.iter().map(|c| c.momentum).collect();
    let valuation: Vec<f64> = candidates
        .iter()
        .map(|c| {
            if filters.lower_valuation_is_better {
                -c.valuation
            } else {
                c.valuation
            }
        })
        .collect();
    let momentum_norm = normalize(&momentum, filters.normalization);
    let valuation_norm = normalize(&valuation, filters.normalization);

    let mut scores: Vec<StockScore> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| StockScore {
            stock_symbol: c.record.stock_symbol.clone(),
            stock_name: c.record.stock_name.clone(),
            evaluation_date,
            valuation_metric: c.valuation,
            momentum_metric: c.momentum,
            composite_score: filters.momentum_weight * momentum_norm[i]
                + filters.valuation_weight * valuation_norm[i],
            rank: 0,
            stop_loss: c.stop_loss,
        })
        .collect();

    scores.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.stock_symbol.cmp(&b.stock_symbol))
    });
    scores.truncate(filters.top_k);
    for (i, score) in scores.iter_mut().enumerate() {
        score.rank = i + 1;
    }

    info!(
        index = %index_symbol,
        date = %evaluation_date,
        members = members.len(),
        passed,
        selected = scores.len(),
        "screened constituents"
    );

    Ok(ScreenOutcome {
        index_symbol: index_symbol.to_string(),
        evaluation_date,
        members: members.len(),
        band,
        scores,
        excluded,
    })
}

fn evaluate_stock<'a>(
    record: &'a ConstituentRecord,
    evaluation_date: NaiveDate,
    prices: &[PriceBar],
    valuations: &[ValuationPoint],
    filters: &ScreenFilters,
    cache: Option<&StrengthCache>,
) -> Result<Candidate<'a>, Exclusion> {
    let exclude = |reason| Exclusion {
        stock_symbol: record.stock_symbol.clone(),
        reason,
    };

    let visible = bars_as_of(prices, evaluation_date);
    let required = filters.stock_window + 1;
    if visible.len() < required {
        return Err(exclude(ExclusionReason::InsufficientHistory {
            bars: visible.len(),
            required,
        }));
    }

    let valuation = match value_as_of(valuations, evaluation_date) {
        Some(point) if point.value.is_finite() => point.value,
        _ => return Err(exclude(ExclusionReason::MissingValuation)),
    };
    if filters.exclude_non_positive_valuation && valuation <= 0.0 {
        return Err(exclude(ExclusionReason::NonPositiveValuation { value: valuation }));
    }

    if let Some(trend) = &filters.trend_filter {
        if let Some(snapshot) = TrendSnapshot::from_bars(visible, trend.gain_lookback) {
            if let Some(angle) = snapshot.ma60_angle.filter(|a| *a < trend.min_ma60_angle) {
                return Err(exclude(ExclusionReason::LongTrendDown { angle }));
            }
            if snapshot.is_bearish_alignment(trend.ma_down_ratio) {
                return Err(exclude(ExclusionReason::BearishAlignment));
            }
            if let Some(gain) = snapshot.recent_gain.filter(|g| *g > trend.max_recent_gain) {
                return Err(exclude(ExclusionReason::OverExtended { gain }));
            }
            if let Some(slope) = snapshot.ma5_slope.filter(|s| *s < trend.min_ma5_slope) {
                return Err(exclude(ExclusionReason::ShortTrendDown { slope }));
            }
        }
    }

    let compute = || latest_strength(visible, filters.stock_window);
    let momentum = match cache {
        Some(cache) => cache.get_or_compute(
            StrengthKey {
                kind: SeriesKind::Stock,
                symbol: record.stock_symbol.clone(),
                evaluation_date,
                window: filters.stock_window,
            },
            compute,
        ),
        None => compute(),
    }
    .map_err(|_| {
        exclude(ExclusionReason::InsufficientHistory {
            bars: visible.len(),
            required,
        })
    })?
    .score;

    let stop_loss = lowest_low(visible, filters.stop_loss_lookback.max(1))
        .unwrap_or(visible[visible.len() - 1].close);

    Ok(Candidate {
        record,
        momentum,
        valuation,
        stop_loss,
    })
}

/// Normalizes `values` within the sample.
pub fn normalize(values: &[f64], method: Normalization) -> Vec<f64> {
    match method {
        Normalization::ZScore => z_scores(values),
        Normalization::PercentileRank => percentile_ranks(values),
    }
}

fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std_dev).collect()
}

fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 1 {
        return vec![0.5];
    }
    values
        .iter()
        .map(|v| {
            let below = values.iter().filter(|o| *o < v).count() as f64;
            let equal = values.iter().filter(|o| *o == v).count() as f64;
            // average zero-based rank of the tie group
            let rank = below + (equal - 1.0) / 2.0;
            rank / (n - 1) as f64
        })
        .collect()
}
