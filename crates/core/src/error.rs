//! Error taxonomy for the wave simulator.
//!
//! Nothing here is retried automatically. Every failure aborts the current
//! run and returns the solver to `Idle`; the caller decides what to do next.
//!
//! Stability (the CFL bound on `dt`) is a documented caller responsibility
//! and has no variant: violating it produces a growing solution, not an error.

use std::time::Duration;
use thiserror::Error;

/// Invalid geometry, parameters, material keys, or lifecycle misuse.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("inclusion {index} at ({x}, {y}) with radius {r} does not lie strictly inside the domain")]
    InclusionOutOfBounds { index: usize, x: f64, y: f64, r: f64 },

    #[error("refinement boundary for inclusion {index} on the {axis} axis cannot be resolved")]
    AmbiguousRefinement { axis: char, index: usize },

    #[error("{axis} axis has {points} points, at least 3 are required for the staggered grid")]
    AxisTooCoarse { axis: char, points: usize },

    #[error("material `{0}` is not registered")]
    UnknownMaterial(String),

    #[error("`{operation}` is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Top-level error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("result writer did not drain within {timeout:?}")]
    PipelineTimeout { timeout: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed output container: {0}")]
    Container(String),

    #[error("result writer failed: {0}")]
    Writer(String),

    #[error("execution worker failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Shorthand for [`ConfigError::InvalidParameter`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigError::InvalidParameter {
            name,
            reason: reason.into(),
        })
    }

    /// True for failures caused by the inputs rather than by the run itself.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: SimError = ConfigError::UnknownMaterial("Unobtainium".into()).into();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "configuration error: material `Unobtainium` is not registered"
        );
    }

    #[test]
    fn test_timeout_message_names_deadline() {
        let err = SimError::PipelineTimeout {
            timeout: Duration::from_millis(250),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("250ms"));
    }
}
