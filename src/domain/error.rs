//! Domain error types.
//!
//! Only fatal conditions live here. Admission rejections and data gaps are
//! ordinary outcomes of the simulation loop and are reported as return values.

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
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

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("unknown strategy '{name}' for instrument {instrument}")]
    UnknownStrategy { instrument: String, name: String },

    #[error("data feed error: {reason}")]
    DataFeed { reason: String },

    #[error("no {timeframe} data for {instrument}")]
    NoData {
        instrument: String,
        timeframe: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradesimError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TradesimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        TradesimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// True for errors that abort a run before the simulation loop starts.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TradesimError::ConfigParse { .. }
                | TradesimError::ConfigMissing { .. }
                | TradesimError::ConfigInvalid { .. }
                | TradesimError::UnknownInstrument(_)
                | TradesimError::UnknownStrategy { .. }
        )
    }
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. }
            | TradesimError::UnknownInstrument(_)
            | TradesimError::UnknownStrategy { .. } => 2,
            TradesimError::DataFeed { .. } | TradesimError::NoData { .. } => 3,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_classified() {
        assert!(TradesimError::missing("backtest", "seed").is_config_error());
        assert!(TradesimError::invalid("xauusd", "leverage", "must be positive").is_config_error());
        assert!(TradesimError::UnknownInstrument("gbpusd".into()).is_config_error());
        assert!(
            !TradesimError::DataFeed {
                reason: "boom".into()
            }
            .is_config_error()
        );
    }

    #[test]
    fn display_includes_section_and_key() {
        let err = TradesimError::invalid("xauusd", "contract_size", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [xauusd] contract_size: must be positive"
        );
    }
}
