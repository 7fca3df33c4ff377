//! Planner error types

use thiserror::Error;

/// Errors surfaced outside the per-tick update
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tuning source unavailable: {0}")]
    TuningUnavailable(String),

    #[error("Logging already initialised: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}
