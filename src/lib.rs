// Vocal Coach Core - Rust audio coordination engine
// Frequency math, audio resource lifecycle, and the coordination bus

// Module declarations
pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod math;
pub mod telemetry;

// Re-exports for convenience
pub use bus::{EventBus, EventEnvelope, ScopedBus, SubscriptionToken, Topic};
pub use config::EngineConfig;
pub use engine::{EngineFacade, EngineLifecycleState, EngineSlot, ResourceState};
pub use error::{EngineError, ErrorCode, ErrorReport, LifecycleError};
pub use managers::ResourceLifecycleManager;
pub use telemetry::{DiagnosticsCollector, DiagnosticsSink, TracingSink};

use tracing::Level;

/// Install a `tracing` fmt subscriber at `level`.
///
/// Safe to call more than once; only the first call installs anything.
/// `log` records from the library reach the same subscriber.
pub fn init_logging(level: Level) {
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
    {
        log::debug!("[Logging] Subscriber installed at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(Level::DEBUG);
        init_logging(Level::INFO);
    }
}
