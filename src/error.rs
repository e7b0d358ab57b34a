//! Unified error handling for PlanForge
//!
//! A single error type covers the whole build/execute pipeline. Errors are
//! categorized so callers can distinguish structural problems they can fix
//! (bad configuration, missing tensors) from device failures reported by the
//! accelerator runtime, which are propagated instead of aborting the process.

use std::fmt;

use crate::backend::DeviceError;

/// Unified error type for PlanForge sessions
#[derive(Debug, thiserror::Error)]
pub enum PlanForgeError {
    // ========== Structural errors ==========
    /// The output table passed at session construction was empty
    #[error("output table must have at least one entry")]
    EmptyOutputTable,

    /// The configured device id is outside the available device range
    #[error("invalid device_id: {requested} >= {available} (available device count)")]
    DeviceOutOfRange { requested: usize, available: usize },

    /// Reduced precision was forced but the device does not support it
    #[error("reduced precision is not available on device '{0}'")]
    PrecisionUnsupported(String),

    /// A named tensor has no binding slot in the compiled plan
    #[error("tensor not found in compiled plan: {0}")]
    TensorNotFound(String),

    /// Host tensor byte length no longer matches the footprint bound at build time
    #[error("shape mismatch for tensor '{name}': bound {bound} bytes, host buffer has {actual}")]
    ShapeMismatch {
        name: String,
        bound: usize,
        actual: usize,
    },

    /// Invalid session configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Device errors ==========
    /// Accelerator runtime reported a failure
    #[error("device failure: {0}")]
    DeviceFailure(#[from] DeviceError),

    /// The runtime compiler failed to produce a plan
    #[error("plan compilation failed: {0}")]
    PlanBuildFailed(String),

    // ========== I/O and serialization ==========
    /// Cache file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan blob could not be encoded or decoded
    #[error("plan serialization failed: {0}")]
    Serialization(String),

    // ========== Internal ==========
    /// Internal invariant violation (indicates a bug)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Structural error - fix the graph, tables, or configuration
    Structural,
    /// Device error - accelerator runtime failure
    Device,
    /// I/O error - cache files, serialization
    Io,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Structural => write!(f, "Structural"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Io => write!(f, "Io"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl PlanForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanForgeError::EmptyOutputTable
            | PlanForgeError::DeviceOutOfRange { .. }
            | PlanForgeError::PrecisionUnsupported(_)
            | PlanForgeError::TensorNotFound(_)
            | PlanForgeError::ShapeMismatch { .. }
            | PlanForgeError::InvalidConfiguration(_) => ErrorCategory::Structural,

            PlanForgeError::DeviceFailure(_) | PlanForgeError::PlanBuildFailed(_) => {
                ErrorCategory::Device
            }

            PlanForgeError::Io(_) | PlanForgeError::Serialization(_) => ErrorCategory::Io,

            PlanForgeError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Structural errors are actionable by the caller: session construction
    /// failed and no session exists, but the process is healthy.
    pub fn is_structural(&self) -> bool {
        self.category() == ErrorCategory::Structural
    }

    /// Device errors come from the accelerator runtime and may clear up on a
    /// different device or after driver recovery.
    pub fn is_device_failure(&self) -> bool {
        self.category() == ErrorCategory::Device
    }
}

/// Result alias used throughout the crate
pub type PlanResult<T> = std::result::Result<T, PlanForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            PlanForgeError::EmptyOutputTable.category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            PlanForgeError::DeviceOutOfRange {
                requested: 4,
                available: 1
            }
            .category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            PlanForgeError::TensorNotFound("x".to_string()).category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            PlanForgeError::PlanBuildFailed("no plan".to_string()).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            PlanForgeError::Internal("bug".to_string()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_device_out_of_range_message_names_both_numbers() {
        let err = PlanForgeError::DeviceOutOfRange {
            requested: 3,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_is_structural() {
        assert!(PlanForgeError::EmptyOutputTable.is_structural());
        assert!(PlanForgeError::PrecisionUnsupported("gfx1100".to_string()).is_structural());
        assert!(!PlanForgeError::PlanBuildFailed("x".to_string()).is_structural());
    }

    #[test]
    fn test_device_error_conversion() {
        let err: PlanForgeError = DeviceError::AllocationFailed("oom".to_string()).into();
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PlanForgeError = io.into();
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
