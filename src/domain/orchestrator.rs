//! Per-date rotation decisions: rank the tracked indices, screen the
//! strongest one, and record every degradation on the decision itself.

use crate::domain::cache::StrengthCache;
use crate::domain::error::RotatorError;
use crate::domain::market_data::MarketData;
use crate::domain::ranker::{IndexStrength, rank_indices};
use crate::domain::regime::MarketRegime;
use crate::domain::screener::{ScreenFilters, StockScore, screen_constituents};
use crate::domain::sizing::{TargetWeight, position_weights};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Strength window for the index ranking.
    pub index_window: usize,
    pub filters: ScreenFilters,
    pub max_position_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_window: 5,
            filters: ScreenFilters::default(),
            max_position_size: 0.05,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), RotatorError> {
        if self.index_window == 0 {
            return Err(RotatorError::InvalidParameter {
                name: "index_window".into(),
                reason: "must be positive".into(),
            });
        }
        if !(self.max_position_size > 0.0 && self.max_position_size <= 1.0) {
            return Err(RotatorError::InvalidParameter {
                name: "max_position_size".into(),
                reason: "must be in (0, 1]".into(),
            });
        }
        self.filters.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoldReason {
    /// Fewer than two indices had enough history.
    InsufficientIndexHistory {
        symbol: String,
        bars: usize,
        required: usize,
    },
    /// The provider could not supply constituents for the chosen index.
    DataUnavailable { symbol: String },
    Failed { reason: String },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::InsufficientIndexHistory {
                symbol,
                bars,
                required,
            } => write!(
                f,
                "insufficient index history ({symbol}: {bars} of {required} bars)"
            ),
            HoldReason::DataUnavailable { symbol } => write!(f, "data unavailable for {symbol}"),
            HoldReason::Failed { reason } => write!(f, "evaluation failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionStatus {
    Rotated,
    Hold { reason: HoldReason },
    StayOut { passed: usize, required: usize },
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Rotated => f.write_str("rotated"),
            DecisionStatus::Hold { .. } => f.write_str("hold"),
            DecisionStatus::StayOut { .. } => f.write_str("stay_out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationDecision {
    pub evaluation_date: NaiveDate,
    pub selected_index: Option<String>,
    /// Rank order; empty unless `status` is `Rotated`.
    pub selected_stocks: Vec<StockScore>,
    pub status: DecisionStatus,
    pub ranking: Vec<IndexStrength>,
    pub regime: Option<MarketRegime>,
}

impl RotationDecision {
    fn hold(evaluation_date: NaiveDate, reason: HoldReason, ranking: Vec<IndexStrength>) -> Self {
        let regime = MarketRegime::assess(&ranking.iter().map(|s| s.score).collect::<Vec<_>>());
        Self {
            evaluation_date,
            selected_index: None,
            selected_stocks: Vec::new(),
            status: DecisionStatus::Hold { reason },
            ranking,
            regime,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self.status, DecisionStatus::Hold { .. })
    }

    pub fn is_stay_out(&self) -> bool {
        matches!(self.status, DecisionStatus::StayOut { .. })
    }

    pub fn weights(&self, max_position_size: f64) -> Vec<TargetWeight> {
        position_weights(&self.selected_stocks, max_position_size)
    }

    /// A hold keeps whatever index the previous decision held.
    fn carry_forward(mut self, previous: Option<&RotationDecision>) -> Self {
        if self.is_hold() {
            self.selected_index = previous.and_then(|p| p.selected_index.clone());
        }
        self
    }
}

/// Stateless between calls. Strength memoization is scoped to a single
/// `MarketData`: `evaluate_schedule` builds its own cache, and callers that
/// want one across `evaluate` calls pass it to `evaluate_with_cache`.
pub struct SelectionEngine {
    config: EngineConfig,
}

impl SelectionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, RotatorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        data: &MarketData,
        evaluation_date: NaiveDate,
        previous: Option<&RotationDecision>,
    ) -> RotationDecision {
        self.evaluate_date(data, evaluation_date, None).carry_forward(previous)
    }

    /// Like [`evaluate`](Self::evaluate), reusing strength scores from
    /// `cache`. The cache must only ever have seen this `data`.
    pub fn evaluate_with_cache(
        &self,
        data: &MarketData,
        evaluation_date: NaiveDate,
        previous: Option<&RotationDecision>,
        cache: &StrengthCache,
    ) -> RotationDecision {
        self.evaluate_date(data, evaluation_date, Some(cache))
            .carry_forward(previous)
    }

    /// Evaluates `dates` in parallel, then threads the held index through
    /// the results in date order.
    pub fn evaluate_schedule(&self, data: &MarketData, dates: &[NaiveDate]) -> Vec<RotationDecision> {
        let mut dates = dates.to_vec();
        dates.sort();
        dates.dedup();

        let cache = StrengthCache::new();
        let fresh: Vec<RotationDecision> = dates
            .par_iter()
            .map(|&date| self.evaluate_date(data, date, Some(&cache)))
            .collect();
        debug!(dates = dates.len(), cached = cache.len(), "schedule evaluated");

        let mut decisions: Vec<RotationDecision> = Vec::with_capacity(fresh.len());
        for decision in fresh {
            let decision = decision.carry_forward(decisions.last());
            decisions.push(decision);
        }
        decisions
    }

    fn evaluate_date(
        &self,
        data: &MarketData,
        evaluation_date: NaiveDate,
        cache: Option<&StrengthCache>,
    ) -> RotationDecision {
        let ranking = match rank_indices(
            &data.indices,
            evaluation_date,
            self.config.index_window,
            cache,
        ) {
            Ok(ranking) => ranking,
            Err(RotatorError::InsufficientData {
                symbol,
                bars,
                required,
            }) => {
                warn!(date = %evaluation_date, bars, required, "index ranking unavailable, holding");
                return RotationDecision::hold(
                    evaluation_date,
                    HoldReason::InsufficientIndexHistory {
                        symbol,
                        bars,
                        required,
                    },
                    Vec::new(),
                );
            }
            Err(e) => {
                warn!(date = %evaluation_date, error = %e, "index ranking failed, holding");
                return RotationDecision::hold(
                    evaluation_date,
                    HoldReason::Failed {
                        reason: e.to_string(),
                    },
                    Vec::new(),
                );
            }
        };

        let regime = MarketRegime::assess(&ranking.scores());
        let Some(selected) = ranking.selected().map(|s| s.symbol.clone()) else {
            warn!(date = %evaluation_date, "empty index ranking, holding");
            return RotationDecision::hold(
                evaluation_date,
                HoldReason::Failed {
                    reason: "no index could be ranked".into(),
                },
                Vec::new(),
            );
        };

        let Some(constituents) = data.constituents_of(&selected) else {
            warn!(date = %evaluation_date, index = %selected, "constituents unavailable, holding");
            return RotationDecision::hold(
                evaluation_date,
                HoldReason::DataUnavailable { symbol: selected },
                ranking.ranked,
            );
        };

        let outcome = screen_constituents(
            &selected,
            evaluation_date,
            constituents,
            &data.prices,
            &data.valuations,
            &self.config.filters,
            cache,
        );

        let (selected_stocks, status) = match outcome {
            Ok(outcome) => (outcome.scores, DecisionStatus::Rotated),
            Err(RotatorError::EmptySelection {
                passed, required, ..
            }) => (Vec::new(), DecisionStatus::StayOut { passed, required }),
            Err(e) => {
                warn!(date = %evaluation_date, index = %selected, error = %e, "screening failed, holding");
                return RotationDecision::hold(
                    evaluation_date,
                    HoldReason::Failed {
                        reason: e.to_string(),
                    },
                    ranking.ranked,
                );
            }
        };

        info!(
            date = %evaluation_date,
            index = %selected,
            status = %status,
            stocks = selected_stocks.len(),
            "rotation decision"
        );

        RotationDecision {
            evaluation_date,
            selected_index: Some(selected),
            selected_stocks,
            status,
            ranking: ranking.ranked,
            regime,
        }
    }
}

/// Every `every`-th trading day of `timeline` within `[start, end]`,
/// starting with the first one.
pub fn rebalance_dates(
    timeline: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
    every: usize,
) -> Result<Vec<NaiveDate>, RotatorError> {
    if every == 0 {
        return Err(RotatorError::InvalidParameter {
            name: "rebalance_every".into(),
            reason: "must be positive".into(),
        });
    }
    if start > end {
        return Err(RotatorError::InvalidParameter {
            name: "start_date".into(),
            reason: format!("start {start} is after end {end}"),
        });
    }
    Ok(timeline
        .iter()
        .copied()
        .filter(|d| *d >= start && *d <= end)
        .step_by(every)
        .collect())
}
