//! Error types.

use crate::predictor::ContextId;

/// Problems with a [`crate::PredictorConfig`]. A predictor is never built
/// from a configuration that produces one of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("table size must be a power of two, got {size}")]
    TableSize { size: usize },

    #[error("history size must be positive")]
    HistorySize,

    #[error("weight range is empty: min {min} > max {max}")]
    WeightRange { min: i32, max: i32 },

    #[error("threshold must be non-negative, got {threshold}")]
    Threshold { threshold: i32 },

    #[error("ensemble needs at least one member")]
    EnsembleMembers,

    #[error("ensemble average window length must be positive")]
    EnsembleWindowLength,

    #[error("at least one hardware context is required")]
    NumThreads,

    #[error("address shift {shift} discards every address bit")]
    AddrShift { shift: u32 },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors reported while using a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PredictorError {
    #[error("no hardware context with id {0}")]
    UnknownContext(ContextId),
}

/// Errors reported while reading a branch trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace length {len} is not a multiple of the record size")]
    Truncated { len: usize },

    #[error("record {index} has invalid flags {flags:#07b}")]
    InvalidFlags { index: usize, flags: u32 },
}
