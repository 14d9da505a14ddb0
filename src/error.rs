//! Error types for the TD3 agent

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Td3Error {
    /// Sampling asked for more transitions than the buffer holds
    #[error("insufficient data: requested {requested} transitions, buffer holds {available}")]
    InsufficientData { requested: usize, available: usize },

    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A target store is missing a parameter present in its online counterpart
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("parameter store lock poisoned")]
    LockPoisoned,

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Td3Error>;
