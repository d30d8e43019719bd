//! Domain error types.

/// Top-level error type for rotator.
#[derive(Debug, thiserror::Error)]
pub enum RotatorError {
    #[error("insufficient data for {symbol}: have {bars} bars, need {required}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        required: usize,
    },

    #[error("empty selection for index {index}: {passed} stocks passed, need {required}")]
    EmptySelection {
        index: String,
        passed: usize,
        required: usize,
    },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RotatorError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        RotatorError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RotatorError> for std::process::ExitCode {
    fn from(err: &RotatorError) -> Self {
        let code: u8 = match err {
            RotatorError::Io(_) => 1,
            RotatorError::ConfigParse { .. }
            | RotatorError::ConfigMissing { .. }
            | RotatorError::ConfigInvalid { .. }
            | RotatorError::InvalidParameter { .. } => 2,
            RotatorError::Database { .. }
            | RotatorError::DataUnavailable { .. }
            | RotatorError::InvalidSeries { .. } => 3,
            RotatorError::InsufficientData { .. } | RotatorError::EmptySelection { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = RotatorError::InsufficientData {
            symbol: "399006".into(),
            bars: 3,
            required: 15,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for 399006: have 3 bars, need 15"
        );
    }

    #[test]
    fn empty_selection_message() {
        let err = RotatorError::EmptySelection {
            index: "000015".into(),
            passed: 2,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "empty selection for index 000015: 2 stocks passed, need 10"
        );
    }

    #[test]
    fn unavailable_helper() {
        let err = RotatorError::unavailable("600000", "file missing");
        assert!(matches!(
            err,
            RotatorError::DataUnavailable { ref symbol, .. } if symbol == "600000"
        ));
    }
}
