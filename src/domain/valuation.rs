//! Valuation observations and the cross-sectional valuation band.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationPoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Latest valuation on or before `date`. Assumes `points` is sorted ascending.
pub fn value_as_of(points: &[ValuationPoint], date: NaiveDate) -> Option<&ValuationPoint> {
    let end = points.partition_point(|p| p.date <= date);
    end.checked_sub(1).map(|i| &points[i])
}

/// Percentile of `sorted` with linear interpolation between closest ranks.
/// `pct` is in 0..=100. `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).clamp(sorted[lo], sorted[hi])
}

/// Acceptable valuation interval for one evaluation date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationBand {
    pub lower: f64,
    pub upper: f64,
}

impl ValuationBand {
    /// Band between the `lower_pct` and `upper_pct` percentiles of `sample`.
    /// Non-finite values are ignored; `None` when nothing finite remains.
    pub fn from_sample(sample: &[f64], lower_pct: f64, upper_pct: f64) -> Option<Self> {
        let mut sorted: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            lower: percentile(&sorted, lower_pct),
            upper: percentile(&sorted, upper_pct),
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}
