// Engine facade error types and constants

use crate::error::{ErrorCode, LifecycleError};
use log::error;
use std::fmt;

/// Engine error code constants
///
/// Error code range: 4001-4005
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Environment cannot create an audio resource at all
    pub const CAPABILITY_UNAVAILABLE: i32 = 4001;

    /// Factory returned no handle
    pub const CREATION_FAILED: i32 = 4002;

    /// Wrapped lifecycle failure
    pub const LIFECYCLE: i32 = 4003;

    /// A previous init() already failed
    pub const INIT_FAILED: i32 = 4004;

    /// Facade was torn down
    pub const DESTROYED: i32 = 4005;
}

/// Log an engine error with structured context
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=EngineFacade, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Engine orchestration errors
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Capability probe reported no audio support
    CapabilityUnavailable,

    /// Capability-gated factory failed to create a handle
    CreationFailed { reason: String },

    /// Lifecycle transition failed
    Lifecycle(LifecycleError),

    /// init() already ran and failed; the failure is sticky until destroy()
    InitFailed { reason: String },

    /// Facade torn down
    Destroyed,
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::CapabilityUnavailable => EngineErrorCodes::CAPABILITY_UNAVAILABLE,
            EngineError::CreationFailed { .. } => EngineErrorCodes::CREATION_FAILED,
            EngineError::Lifecycle(_) => EngineErrorCodes::LIFECYCLE,
            EngineError::InitFailed { .. } => EngineErrorCodes::INIT_FAILED,
            EngineError::Destroyed => EngineErrorCodes::DESTROYED,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::CapabilityUnavailable => {
                "Audio processing is not supported in this environment".to_string()
            }
            EngineError::CreationFailed { reason } => {
                format!("Failed to create audio resource: {}", reason)
            }
            EngineError::Lifecycle(inner) => inner.message(),
            EngineError::InitFailed { reason } => {
                format!("Engine initialization previously failed: {}", reason)
            }
            EngineError::Destroyed => "Engine destroyed. Obtain a fresh instance.".to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

impl From<LifecycleError> for EngineError {
    fn from(err: LifecycleError) -> Self {
        EngineError::Lifecycle(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(EngineError::CapabilityUnavailable.code(), 4001);
        assert_eq!(
            EngineError::CreationFailed {
                reason: "x".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            EngineError::Lifecycle(LifecycleError::ResourceClosed).code(),
            4003
        );
        assert_eq!(
            EngineError::InitFailed {
                reason: "x".to_string()
            }
            .code(),
            4004
        );
        assert_eq!(EngineError::Destroyed.code(), 4005);
    }

    #[test]
    fn test_lifecycle_conversion_keeps_message() {
        fn may_fail() -> Result<(), LifecycleError> {
            Err(LifecycleError::ResourceClosed)
        }

        fn caller() -> Result<(), EngineError> {
            may_fail()?;
            Ok(())
        }

        let err = caller().unwrap_err();
        assert!(matches!(err, EngineError::Lifecycle(LifecycleError::ResourceClosed)));
        assert!(err.message().contains("closed"));
    }
}
