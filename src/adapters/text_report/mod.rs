//! Text selection report and CSV decision log.

pub mod tables;

use crate::domain::error::RotatorError;
use crate::domain::orchestrator::{DecisionStatus, RotationDecision};
use crate::domain::sizing::position_weights;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;

/// One decision-log row. Decisions without stocks produce a single row with
/// the stock columns empty.
#[derive(Debug, Serialize)]
struct DecisionLogRow<'a> {
    evaluation_date: String,
    status: String,
    selected_index: &'a str,
    detail: String,
    regime: String,
    rank: Option<usize>,
    stock_symbol: &'a str,
    stock_name: &'a str,
    composite_score: Option<f64>,
    momentum_metric: Option<f64>,
    valuation_metric: Option<f64>,
    stop_loss: Option<f64>,
    weight: Option<f64>,
}

pub struct TextReportAdapter {
    max_position_size: f64,
}

impl TextReportAdapter {
    pub fn new(max_position_size: f64) -> Self {
        Self { max_position_size }
    }
}

fn status_detail(status: &DecisionStatus) -> String {
    match status {
        DecisionStatus::Rotated => String::new(),
        DecisionStatus::Hold { reason } => reason.to_string(),
        DecisionStatus::StayOut { passed, required } => {
            format!("{passed} passed, {required} required")
        }
    }
}

impl ReportPort for TextReportAdapter {
    fn write_selection_report(
        &self,
        decision: &RotationDecision,
        output_path: &str,
    ) -> Result<(), RotatorError> {
        fs::write(output_path, tables::render_decision(decision, self.max_position_size))?;
        Ok(())
    }

    fn write_decision_log(
        &self,
        decisions: &[RotationDecision],
        output_path: &str,
    ) -> Result<(), RotatorError> {
        let csv_err = |e: csv::Error| RotatorError::Io(std::io::Error::other(e));
        let mut writer = csv::Writer::from_path(output_path).map_err(csv_err)?;

        for decision in decisions {
            let base = DecisionLogRow {
                evaluation_date: decision.evaluation_date.to_string(),
                status: decision.status.to_string(),
                selected_index: decision.selected_index.as_deref().unwrap_or(""),
                detail: status_detail(&decision.status),
                regime: decision
                    .regime
                    .map(|r| r.condition.to_string())
                    .unwrap_or_default(),
                rank: None,
                stock_symbol: "",
                stock_name: "",
                composite_score: None,
                momentum_metric: None,
                valuation_metric: None,
                stop_loss: None,
                weight: None,
            };

            if decision.selected_stocks.is_empty() {
                writer.serialize(&base).map_err(csv_err)?;
                continue;
            }

            let weights = position_weights(&decision.selected_stocks, self.max_position_size);
            for (stock, weight) in decision.selected_stocks.iter().zip(&weights) {
                writer
                    .serialize(DecisionLogRow {
                        evaluation_date: base.evaluation_date.clone(),
                        status: base.status.clone(),
                        detail: base.detail.clone(),
                        regime: base.regime.clone(),
                        rank: Some(stock.rank),
                        stock_symbol: &stock.stock_symbol,
                        stock_name: &stock.stock_name,
                        composite_score: Some(stock.composite_score),
                        momentum_metric: Some(stock.momentum_metric),
                        valuation_metric: Some(stock.valuation_metric),
                        stop_loss: Some(stock.stop_loss),
                        weight: Some(weight.weight),
                        ..base
                    })
                    .map_err(csv_err)?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}
