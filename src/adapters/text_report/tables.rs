//! Plain-text tables shared by the report files and the CLI output.

use crate::domain::orchestrator::{DecisionStatus, RotationDecision};
use crate::domain::ranker::IndexStrength;
use crate::domain::regime::{IndexAction, MarketRegime};
use crate::domain::sizing::{cash_weight, position_weights};

pub fn render_ranking_table(ranking: &[IndexStrength]) -> String {
    if ranking.is_empty() {
        return "  (no ranked indices)\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "  {:<4} {:<12} {:>8} {:<12} {:<8}\n",
        "#", "Index", "Score", "As of", "Action"
    ));
    for (i, strength) in ranking.iter().enumerate() {
        output.push_str(&format!(
            "  {:<4} {:<12} {:>8.2} {:<12} {:<8}\n",
            i + 1,
            strength.symbol,
            strength.score,
            strength.as_of,
            IndexAction::for_score(strength.score),
        ));
    }
    output
}

pub fn render_regime(regime: Option<&MarketRegime>) -> String {
    match regime {
        Some(r) => format!(
            "Market: {} (mean {:.2}, dispersion {:.2})\n",
            r.condition, r.mean_score, r.dispersion
        ),
        None => "Market: n/a\n".to_string(),
    }
}

pub fn render_selection_table(decision: &RotationDecision, max_position_size: f64) -> String {
    if decision.selected_stocks.is_empty() {
        return "  (no stocks selected)\n".to_string();
    }

    let weights = position_weights(&decision.selected_stocks, max_position_size);
    let mut output = String::new();
    output.push_str(&format!(
        "  {:<4} {:<10} {:<16} {:>10} {:>10} {:>10} {:>10} {:>8}\n",
        "Rank", "Symbol", "Name", "Composite", "Momentum", "Valuation", "Stop", "Weight"
    ));
    for (stock, weight) in decision.selected_stocks.iter().zip(&weights) {
        output.push_str(&format!(
            "  {:<4} {:<10} {:<16} {:>10.4} {:>10.2} {:>10.4} {:>10.2} {:>7.1}%\n",
            stock.rank,
            stock.stock_symbol,
            truncate(&stock.stock_name, 16),
            stock.composite_score,
            stock.momentum_metric,
            stock.valuation_metric,
            stock.stop_loss,
            weight.weight * 100.0,
        ));
    }
    output.push_str(&format!("  Cash: {:.1}%\n", cash_weight(&weights) * 100.0));
    output
}

pub fn render_status(decision: &RotationDecision) -> String {
    let index = decision.selected_index.as_deref().unwrap_or("-");
    match &decision.status {
        DecisionStatus::Rotated => format!("Rotated into {index}\n"),
        DecisionStatus::Hold { reason } => format!("Hold {index}: {reason}\n"),
        DecisionStatus::StayOut { passed, required } => format!(
            "Stay out of {index}: {passed} stocks passed, {required} required\n"
        ),
    }
}

/// Full report for one decision.
pub fn render_decision(decision: &RotationDecision, max_position_size: f64) -> String {
    let mut output = String::new();
    output.push_str(&format!("Rotation decision for {}\n", decision.evaluation_date));
    output.push_str(&"=".repeat(40));
    output.push('\n');
    output.push_str(&render_status(decision));
    output.push_str(&render_regime(decision.regime.as_ref()));
    output.push_str("\nIndex ranking:\n");
    output.push_str(&render_ranking_table(&decision.ranking));
    output.push_str("\nSelected stocks:\n");
    output.push_str(&render_selection_table(decision, max_position_size));
    output
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
