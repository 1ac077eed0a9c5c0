//! CLI error type.

use std::fmt;

use pulsephase::config::ConfigError;
use pulsephase::logging::LoggingError;
use pulsephase::parameters::ParametersError;
use pulsephase::PredictError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    Config(String),
    Argument(String),
    Parameters(ParametersError),
    Predict(PredictError),
    Logging(LoggingError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Argument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Parameters(e) => write!(f, "Parameter file error: {}", e),
            CliError::Predict(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parameters(e) => Some(e),
            CliError::Predict(e) => Some(e),
            CliError::Logging(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ParametersError> for CliError {
    fn from(e: ParametersError) -> Self {
        CliError::Parameters(e)
    }
}

impl From<PredictError> for CliError {
    fn from(e: PredictError) -> Self {
        CliError::Predict(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}
