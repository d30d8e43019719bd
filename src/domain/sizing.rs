//! Target weights for a selected stock list.

use crate::domain::screener::StockScore;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetWeight {
    pub stock_symbol: String,
    pub weight: f64,
}

/// Equal weight `1/N`, capped at `max_position_size`. Whatever the cap
/// removes stays in cash.
pub fn position_weights(stocks: &[StockScore], max_position_size: f64) -> Vec<TargetWeight> {
    if stocks.is_empty() {
        return Vec::new();
    }
    let equal = 1.0 / stocks.len() as f64;
    let weight = equal.min(max_position_size.max(0.0));
    stocks
        .iter()
        .map(|s| TargetWeight {
            stock_symbol: s.stock_symbol.clone(),
            weight,
        })
        .collect()
}

/// Fraction of capital left unallocated.
pub fn cash_weight(weights: &[TargetWeight]) -> f64 {
    (1.0 - weights.iter().map(|w| w.weight).sum::<f64>()).max(0.0)
}
