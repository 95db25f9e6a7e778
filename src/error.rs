//! Errors
//!
//! A single error type shared by every stage of the analysis pipeline.

use thiserror::Error;

/// Low-level numeric failure wrapped by [`AnalysisError::InternalComputation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericFault {
    /// A NaN or infinite value appeared in the named quantity.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    /// A normalizer for the named quantity was zero.
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
}

/// Errors returned by the detectors and their building blocks.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The signal is absent, empty, has a zero sample rate or ragged channels.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The signal cannot fill even one analysis frame.
    #[error("insufficient signal: one frame needs {required} samples, got {available}")]
    InsufficientSignal {
        /// Samples needed for a single frame.
        required: usize,
        /// Samples actually available.
        available: usize,
    },

    /// Processing finished without a musically meaningful result.
    #[error("no detection: {0}")]
    NoDetection(String),

    /// An unexpected numeric failure inside a pipeline stage.
    #[error("internal computation error in {stage}")]
    InternalComputation {
        /// Stage that produced the fault.
        stage: &'static str,
        /// Underlying numeric cause.
        #[source]
        source: NumericFault,
    },

    /// A detector or engine was configured with unusable parameters.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AnalysisError {
    pub(crate) fn non_finite(stage: &'static str, quantity: &'static str) -> Self {
        AnalysisError::InternalComputation {
            stage,
            source: NumericFault::NonFinite(quantity),
        }
    }

    pub(crate) fn division_by_zero(stage: &'static str, quantity: &'static str) -> Self {
        AnalysisError::InternalComputation {
            stage,
            source: NumericFault::DivisionByZero(quantity),
        }
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;
