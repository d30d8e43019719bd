//! Report generation port trait.

use crate::domain::error::RotatorError;
use crate::domain::orchestrator::RotationDecision;

/// Port for persisting rotation results.
pub trait ReportPort {
    /// Human-readable report of one decision.
    fn write_selection_report(
        &self,
        decision: &RotationDecision,
        output_path: &str,
    ) -> Result<(), RotatorError>;

    /// One row per selected stock, or a single row for a decision without
    /// stocks.
    fn write_decision_log(
        &self,
        decisions: &[RotationDecision],
        output_path: &str,
    ) -> Result<(), RotatorError>;
}
