use thiserror::Error;

/// Fatal failures of the backtesting core.
///
/// Expected per-game data gaps (no usable odds, thin history) are *not*
/// errors: those are absorbed locally as `Option`/skips and the run
/// continues. Everything here aborts the call that produced it.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Too little training data to fit or seed a run.
    #[error("insufficient data: need at least {needed} rows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A prediction was requested before any successful `fit()`.
    #[error("model not fitted")]
    ModelNotFitted,

    /// Fewer seasons available than the requested train + test span.
    #[error("insufficient seasons: need {needed}, got {got}")]
    InsufficientSeasons { needed: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model snapshot (de)serialization failure.
    #[error("model snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("historical store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BacktestError>;
