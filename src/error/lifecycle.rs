// Lifecycle error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

use crate::engine::backend::ResourceState;

/// Lifecycle error code constants
///
/// Single source of truth for codes shared with diagnostics consumers.
///
/// Error code range: 3001-3005
pub struct LifecycleErrorCodes {}

impl LifecycleErrorCodes {
    /// Operation attempted on a closed (terminal) resource
    pub const RESOURCE_CLOSED: i32 = 3001;

    /// Platform refused the transition (missing user gesture, device busy)
    pub const PLATFORM_REJECTED: i32 = 3002;

    /// Platform call settled but the resource ended in the wrong state
    pub const UNEXPECTED_STATE: i32 = 3003;

    /// Automatic resume retries exhausted
    pub const RETRY_LIMIT_REACHED: i32 = 3004;

    /// No resource is managed yet
    pub const NOT_INITIALIZED: i32 = 3005;
}

/// Log a lifecycle error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_lifecycle_error(err: &LifecycleError, context: &str) {
    error!(
        "Lifecycle error in {}: code={}, component=LifecycleManager, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Resource lifecycle errors
///
/// These errors cover resume/suspend/close transitions on the audio
/// resource handle. None of them leave the manager unusable except
/// `ResourceClosed`, which reflects the terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// Resource is closed; no transition out of `closed` exists
    ResourceClosed,

    /// Platform rejected the request
    PlatformRejected { reason: String },

    /// Platform call returned but the resource is not where we asked
    UnexpectedState {
        expected: ResourceState,
        actual: ResourceState,
    },

    /// Resume attempts reached the configured cap
    RetryLimitReached { attempts: u32 },

    /// No resource under management
    NotInitialized,
}

impl ErrorCode for LifecycleError {
    fn code(&self) -> i32 {
        match self {
            LifecycleError::ResourceClosed => LifecycleErrorCodes::RESOURCE_CLOSED,
            LifecycleError::PlatformRejected { .. } => LifecycleErrorCodes::PLATFORM_REJECTED,
            LifecycleError::UnexpectedState { .. } => LifecycleErrorCodes::UNEXPECTED_STATE,
            LifecycleError::RetryLimitReached { .. } => LifecycleErrorCodes::RETRY_LIMIT_REACHED,
            LifecycleError::NotInitialized => LifecycleErrorCodes::NOT_INITIALIZED,
        }
    }

    fn message(&self) -> String {
        match self {
            LifecycleError::ResourceClosed => {
                "Audio resource is closed. Create a new engine instance.".to_string()
            }
            LifecycleError::PlatformRejected { reason } => {
                format!("Platform rejected the request: {}", reason)
            }
            LifecycleError::UnexpectedState { expected, actual } => {
                format!(
                    "Audio resource ended in {} (expected {})",
                    actual, expected
                )
            }
            LifecycleError::RetryLimitReached { attempts } => {
                format!(
                    "Resume failed after {} attempts. A user gesture is required to retry.",
                    attempts
                )
            }
            LifecycleError::NotInitialized => {
                "Audio resource not initialized. Call init() first.".to_string()
            }
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LifecycleError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for LifecycleError {}
