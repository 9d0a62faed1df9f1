// Error types for the vocal coach core
//
// This module defines custom error types for resource lifecycle and engine
// orchestration, providing structured error handling with numeric codes plus
// a classification-ready report payload for user-facing rendering.

mod engine;
mod lifecycle;

pub use engine::{log_engine_error, EngineError, EngineErrorCodes};
pub use lifecycle::{log_lifecycle_error, LifecycleError, LifecycleErrorCodes};

use serde::{Deserialize, Serialize};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the bus and diagnostics boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Classification-ready error payload published on `error:occurred`.
///
/// Mirrors the `{message, stack, name}` shape the notification surface
/// expects. `stack` carries the chain of context strings leading to the
/// failure, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub code: i32,
}

impl ErrorReport {
    /// Build a report from any coded error, recording where it surfaced.
    pub fn from_error<E>(err: &E, context: &str) -> Self
    where
        E: ErrorCode + std::fmt::Debug,
    {
        let name = format!("{:?}", err)
            .split(|c: char| c == ' ' || c == '{' || c == '(')
            .next()
            .unwrap_or("Error")
            .to_string();

        Self {
            name,
            message: err.message(),
            stack: Some(format!("at {}", context)),
            code: err.code(),
        }
    }
}
