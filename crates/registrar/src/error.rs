use crate::config::ConfigError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;
use crate::workflows::enrollment::AllocationError;
use crate::workflows::results::{RenderError, ResultsError};
use std::fmt;

/// Application-level error surfaced by binaries embedding the registrar.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Store(StoreError),
    Allocation(AllocationError),
    Results(ResultsError),
    Template(RenderError),
}

impl AppError {
    /// Whether the failure came from bad caller input rather than the
    /// environment; CLIs use this to pick an exit code.
    pub fn is_user_error(&self) -> bool {
        match self {
            AppError::Allocation(err) => !matches!(err, AllocationError::StoreUnavailable(_)),
            AppError::Results(err) => !matches!(
                err,
                ResultsError::StoreUnavailable(_) | ResultsError::RenderFailed(_)
            ),
            AppError::Store(err) => !matches!(err, StoreError::Unavailable(_)),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Template(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Store(err) => write!(f, "store error: {}", err),
            AppError::Allocation(err) => write!(f, "allocation error: {}", err),
            AppError::Results(err) => write!(f, "results error: {}", err),
            AppError::Template(err) => write!(f, "transcript template error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Allocation(err) => Some(err),
            AppError::Results(err) => Some(err),
            AppError::Template(err) => Some(err),
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
        Self::Io(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<AllocationError> for AppError {
    fn from(value: AllocationError) -> Self {
        Self::Allocation(value)
    }
}

impl From<ResultsError> for AppError {
    fn from(value: ResultsError) -> Self {
        Self::Results(value)
    }
}

impl From<RenderError> for AppError {
    fn from(value: RenderError) -> Self {
        Self::Template(value)
    }
}
