//! Error types for Synheart Pulse

use thiserror::Error;

/// Errors that can occur while sampling frames or scoring the pulse signal
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Timestamp went backwards: previous {previous} ms, current {current} ms")]
    NonMonotonicTimestamp { previous: f64, current: f64 },

    #[error("Insufficient data: {available} samples buffered, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Processing fault: {0}")]
    ProcessingFault(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
