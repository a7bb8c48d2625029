use crate::config::ConfigError;
use crate::subscriptions::PlanImportError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Failures that stop the backend process or a CLI command.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    /// Binding the listener or serving connections failed.
    Listener(std::io::Error),
    /// A provider client (OneSignal, Groq) could not be built.
    HttpClient(reqwest::Error),
    Catalog(PlanImportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "telemetry error: {err}"),
            AppError::Listener(err) => write!(f, "http listener error: {err}"),
            AppError::HttpClient(err) => write!(f, "provider client error: {err}"),
            AppError::Catalog(err) => write!(f, "plan catalog error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Listener(err) => Some(err),
            AppError::HttpClient(err) => Some(err),
            AppError::Catalog(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Listener(value)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::HttpClient(value)
    }
}

impl From<PlanImportError> for AppError {
    fn from(value: PlanImportError) -> Self {
        Self::Catalog(value)
    }
}
