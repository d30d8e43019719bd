//! Configuration validation.
//!
//! Checks raw config values before the engine is built so errors name the
//! offending section and key.

use crate::domain::constituent::parse_symbols;
use crate::domain::error::RotatorError;
use crate::domain::screener::Normalization;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_dates(config)?;
    validate_indices(config)?;
    validate_positive_int(config, "engine", "index_window", 5)?;
    validate_positive_int(config, "engine", "rebalance_every", 5)?;
    validate_max_position_size(config)?;
    validate_data_source(config)?;
    Ok(())
}

pub fn validate_screen_config(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    validate_positive_int(config, "screen", "stock_window", 6)?;
    validate_positive_int(config, "screen", "top_k", 15)?;
    validate_positive_int(config, "screen", "stop_loss_lookback", 10)?;
    validate_positive_int(config, "screen", "gain_lookback", 10)?;
    validate_min_selection(config)?;
    validate_percentiles(config)?;
    validate_normalization(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RotatorError {
    RotatorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parses a `YYYY-MM-DD` value; a missing key is `ConfigMissing`.
pub fn parse_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, RotatorError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| RotatorError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(section, key, "invalid date format (expected YYYY-MM-DD)"))
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let start = parse_date(config, "engine", "start_date")?;
    let end = parse_date(config, "engine", "end_date")?;
    if start > end {
        return Err(invalid("engine", "start_date", "start_date must not be after end_date"));
    }
    Ok(())
}

/// `[indices] symbols`, normalized the same way as a command-line list.
pub fn configured_indices(config: &dyn ConfigPort) -> Result<Vec<String>, RotatorError> {
    let raw = config
        .get_string("indices", "symbols")
        .ok_or_else(|| RotatorError::ConfigMissing {
            section: "indices".into(),
            key: "symbols".into(),
        })?;
    parse_symbols(&raw).map_err(|e| invalid("indices", "symbols", e.to_string()))
}

fn validate_indices(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    configured_indices(config).map(|_| ())
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), RotatorError> {
    if config.get_int(section, key, default) <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(())
}

fn validate_max_position_size(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let value = config.get_double("engine", "max_position_size", 0.05);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "engine",
            "max_position_size",
            "max_position_size must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => {
            if config.get_string("data", "csv_dir").is_none() {
                return Err(RotatorError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                });
            }
            Ok(())
        }
        "sqlite" => {
            if config.get_string("sqlite", "path").is_none() {
                return Err(RotatorError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                });
            }
            Ok(())
        }
        other => Err(invalid(
            "data",
            "source",
            format!("unknown data source '{other}' (expected csv or sqlite)"),
        )),
    }
}

fn validate_min_selection(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let top_k = config.get_int("screen", "top_k", 15);
    let min_selection = config.get_int("screen", "min_selection", 10);
    if min_selection < 1 || min_selection > top_k {
        return Err(invalid(
            "screen",
            "min_selection",
            "min_selection must be between 1 and top_k",
        ));
    }
    Ok(())
}

fn validate_percentiles(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    let lower = config.get_double("screen", "valuation_lower_pct", 10.0);
    let upper = config.get_double("screen", "valuation_upper_pct", 90.0);
    if !(0.0..=100.0).contains(&lower) {
        return Err(invalid("screen", "valuation_lower_pct", "must be within [0, 100]"));
    }
    if !(0.0..=100.0).contains(&upper) {
        return Err(invalid("screen", "valuation_upper_pct", "must be within [0, 100]"));
    }
    if lower > upper {
        return Err(invalid(
            "screen",
            "valuation_lower_pct",
            "valuation_lower_pct must not exceed valuation_upper_pct",
        ));
    }
    Ok(())
}

fn validate_normalization(config: &dyn ConfigPort) -> Result<(), RotatorError> {
    if let Some(raw) = config.get_string("screen", "normalization") {
        raw.parse::<Normalization>()
            .map_err(|reason| invalid("screen", "normalization", reason))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    const BASE: &[(&str, &str, &str)] = &[
        ("data", "source", "csv"),
        ("data", "csv_dir", "./data"),
        ("indices", "symbols", "399006,000300"),
        ("engine", "start_date", "2024-01-01"),
        ("engine", "end_date", "2024-06-30"),
    ];

    fn with(extra: &[(&'static str, &'static str, &'static str)]) -> MapConfig {
        let mut entries: Vec<(&str, &str, &str)> = BASE.to_vec();
        for e in extra {
            entries.retain(|(s, k, _)| !(s == &e.0 && k == &e.1));
            entries.push(*e);
        }
        MapConfig::new(&entries)
    }

    fn assert_invalid(result: Result<(), RotatorError>, expected_key: &str) {
        match result {
            Err(RotatorError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn base_config_is_valid() {
        let config = with(&[]);
        assert!(validate_engine_config(&config).is_ok());
        assert!(validate_screen_config(&config).is_ok());
    }

    #[test]
    fn missing_start_date() {
        let config = MapConfig::new(&BASE[..3]);
        assert!(matches!(
            validate_engine_config(&config),
            Err(RotatorError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn bad_date_format() {
        assert_invalid(
            validate_engine_config(&with(&[("engine", "end_date", "30/06/2024")])),
            "end_date",
        );
    }

    #[test]
    fn start_after_end() {
        assert_invalid(
            validate_engine_config(&with(&[("engine", "start_date", "2025-01-01")])),
            "start_date",
        );
    }

    #[test]
    fn duplicate_index_symbols() {
        assert_invalid(
            validate_engine_config(&with(&[("indices", "symbols", "399006,399006")])),
            "symbols",
        );
    }

    #[test]
    fn configured_indices_are_uppercased() {
        let config = with(&[("indices", "symbols", " hsi , sh000300 ")]);
        assert_eq!(configured_indices(&config).unwrap(), vec!["HSI", "SH000300"]);
    }

    #[test]
    fn empty_index_list() {
        assert_invalid(
            validate_engine_config(&with(&[("indices", "symbols", "A,,B")])),
            "symbols",
        );
    }

    #[test]
    fn zero_index_window() {
        assert_invalid(
            validate_engine_config(&with(&[("engine", "index_window", "0")])),
            "index_window",
        );
    }

    #[test]
    fn position_size_out_of_range() {
        assert_invalid(
            validate_engine_config(&with(&[("engine", "max_position_size", "1.5")])),
            "max_position_size",
        );
    }

    #[test]
    fn unknown_source() {
        assert_invalid(
            validate_engine_config(&with(&[("data", "source", "postgres")])),
            "source",
        );
    }

    #[test]
    fn sqlite_requires_path() {
        assert!(matches!(
            validate_engine_config(&with(&[("data", "source", "sqlite")])),
            Err(RotatorError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn min_selection_above_top_k() {
        assert_invalid(
            validate_screen_config(&with(&[("screen", "top_k", "5"), ("screen", "min_selection", "6")])),
            "min_selection",
        );
    }

    #[test]
    fn inverted_percentiles() {
        assert_invalid(
            validate_screen_config(&with(&[
                ("screen", "valuation_lower_pct", "80"),
                ("screen", "valuation_upper_pct", "20"),
            ])),
            "valuation_lower_pct",
        );
    }

    #[test]
    fn unknown_normalization() {
        assert_invalid(
            validate_screen_config(&with(&[("screen", "normalization", "median")])),
            "normalization",
        );
    }
}
