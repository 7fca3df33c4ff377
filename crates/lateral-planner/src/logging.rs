//! Tracing subscriber setup for binaries

use crate::error::PlannerError;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber, JSON lines when `json` is set
pub fn init_logging(json: bool, level: Level) -> Result<(), PlannerError> {
    if json {
        let subscriber = FmtSubscriber::builder()
            .json()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
