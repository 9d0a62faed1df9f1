// ResourceLifecycleManager: finite state machine over the audio resource
//
// Single Responsibility: resume/suspend/close transitions with bounded retry
// Sole writer of transitions it requests; observer of those it does not.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::LifecycleConfig;
use crate::engine::backend::{AudioResource, ClockSource, ResourceClock, ResourceState};
use crate::error::{log_lifecycle_error, ErrorCode, LifecycleError};
use crate::telemetry::{DiagnosticsSink, Severity};

const COMPONENT: &str = "LifecycleManager";

/// A transition observed on the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: ResourceState,
    pub to: ResourceState,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleStatus {
    pub state: ResourceState,
    pub sample_rate: u32,
    pub resume_attempts: u32,
    pub max_resume_attempts: u32,
    pub escalated: bool,
}

/// Drives the audio resource through `running`/`suspended`/`closed`.
///
/// The initial state is read from the resource at construction. The manager
/// never resumes on its own: construction, external interruptions and
/// escalation all leave reactivation to a caller acting on a user gesture.
///
/// # Retry policy
/// Every failed `resume()` increments the attempt counter, capped at
/// `max_resume_attempts`. Reaching the cap escalates once (critical
/// diagnostic) and stops `resume_with_retry()` from looping; plain
/// `resume()` calls still reach the platform so a manual retry can succeed.
/// Any success resets the counter.
///
/// # Example
/// ```ignore
/// let mut manager = ResourceLifecycleManager::new(resource, &config.lifecycle, sink);
/// manager.resume().await?;
/// manager.suspend().await?;
/// manager.close().await?;
/// ```
pub struct ResourceLifecycleManager {
    resource: Arc<dyn AudioResource>,
    state: ResourceState,
    resume_attempts: u32,
    max_resume_attempts: u32,
    retry_delay: Duration,
    escalated: bool,
    state_rx: broadcast::Receiver<ResourceState>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl ResourceLifecycleManager {
    /// Wrap a freshly created resource.
    ///
    /// Subscribes to the platform notification channel before reading the
    /// initial state so no external change can slip between the two.
    pub fn new(
        resource: Arc<dyn AudioResource>,
        config: &LifecycleConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let state_rx = resource.state_changes();
        let state = resource.state();

        log::info!(
            "[LifecycleManager] Managing resource in state {} at {} Hz",
            state,
            resource.sample_rate()
        );
        sink.record(
            Severity::Info,
            COMPONENT,
            "resource attached",
            json!({ "state": state, "sampleRate": resource.sample_rate() }),
        );

        Self {
            resource,
            state,
            resume_attempts: 0,
            max_resume_attempts: config.max_resume_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            escalated: false,
            state_rx,
            sink,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.resource.sample_rate()
    }

    pub fn resume_attempts(&self) -> u32 {
        self.resume_attempts
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            state: self.state,
            sample_rate: self.resource.sample_rate(),
            resume_attempts: self.resume_attempts,
            max_resume_attempts: self.max_resume_attempts,
            escalated: self.escalated,
        }
    }

    /// Clock of the managed resource, for stamping bus envelopes.
    pub fn clock(&self) -> Arc<dyn ClockSource> {
        Arc::new(ResourceClock::new(Arc::clone(&self.resource)))
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Ask the platform to start (or restart) processing.
    ///
    /// * already `running` → `Ok` without touching the platform
    /// * `closed` → `Err(ResourceClosed)`, no attempt counted
    /// * otherwise one platform attempt; success resets the counter
    pub async fn resume(&mut self) -> Result<(), LifecycleError> {
        self.sync_external_changes();

        match self.state {
            ResourceState::Running => return Ok(()),
            ResourceState::Closed => return Err(self.reject(LifecycleError::ResourceClosed, "resume")),
            _ => {}
        }

        let outcome = self.resource.resume().await;
        let actual = self.resource.state();
        self.state = actual;

        let failure = match outcome {
            Ok(()) if actual == ResourceState::Running => None,
            Ok(()) => Some(LifecycleError::UnexpectedState {
                expected: ResourceState::Running,
                actual,
            }),
            Err(err) => Some(LifecycleError::PlatformRejected {
                reason: err.to_string(),
            }),
        };

        match failure {
            None => {
                let previous_attempts = self.resume_attempts;
                self.resume_attempts = 0;
                self.escalated = false;
                log::info!(
                    "[LifecycleManager] Resumed after {} failed attempt(s)",
                    previous_attempts
                );
                self.sink.record(
                    Severity::Info,
                    COMPONENT,
                    "resumed",
                    json!({ "previousAttempts": previous_attempts }),
                );
                Ok(())
            }
            Some(err) => {
                self.register_resume_failure(&err);
                Err(err)
            }
        }
    }

    /// Resume, retrying with `retry_delay_ms` pauses until success or escalation.
    pub async fn resume_with_retry(&mut self) -> Result<(), LifecycleError> {
        loop {
            match self.resume().await {
                Ok(()) => return Ok(()),
                Err(LifecycleError::ResourceClosed) => return Err(LifecycleError::ResourceClosed),
                Err(_) if self.escalated => {
                    return Err(LifecycleError::RetryLimitReached {
                        attempts: self.resume_attempts,
                    });
                }
                Err(_) => {
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
    }

    /// Ask the platform to pause processing. Mirrors the resulting state.
    pub async fn suspend(&mut self) -> Result<(), LifecycleError> {
        self.sync_external_changes();

        match self.state {
            ResourceState::Suspended => return Ok(()),
            ResourceState::Closed => {
                return Err(self.reject(LifecycleError::ResourceClosed, "suspend"))
            }
            _ => {}
        }

        let from = self.state;
        let outcome = self.resource.suspend().await;
        self.state = self.resource.state();

        let result = match outcome {
            Ok(()) if self.state == ResourceState::Suspended => Ok(()),
            Ok(()) => Err(LifecycleError::UnexpectedState {
                expected: ResourceState::Suspended,
                actual: self.state,
            }),
            Err(err) => Err(LifecycleError::PlatformRejected {
                reason: err.to_string(),
            }),
        };

        match result {
            Ok(()) => {
                log::info!("[LifecycleManager] Suspended (was {})", from);
                self.sink.record(
                    Severity::Info,
                    COMPONENT,
                    "suspended",
                    json!({ "from": from }),
                );
                Ok(())
            }
            Err(err) => Err(self.reject(err, "suspend")),
        }
    }

    /// Release the resource. Terminal: the manager stays `closed` forever.
    pub async fn close(&mut self) -> Result<(), LifecycleError> {
        self.sync_external_changes();

        if self.state == ResourceState::Closed {
            return Ok(());
        }

        let from = self.state;
        match self.resource.close().await {
            Ok(()) => {
                self.state = ResourceState::Closed;
                log::info!("[LifecycleManager] Closed (was {})", from);
                self.sink.record(Severity::Info, COMPONENT, "closed", json!({ "from": from }));
                Ok(())
            }
            Err(err) => {
                self.state = self.resource.state();
                Err(self.reject(
                    LifecycleError::PlatformRejected {
                        reason: err.to_string(),
                    },
                    "close",
                ))
            }
        }
    }

    /// Clear the attempt counter and escalation flag before a manual retry.
    pub fn reset_attempts(&mut self) {
        self.resume_attempts = 0;
        self.escalated = false;
    }

    /// Attach an input stream supplied by the input provider.
    pub fn attach_input(&mut self, stream_id: &str) -> Result<(), LifecycleError> {
        self.sync_external_changes();

        if self.state == ResourceState::Closed {
            return Err(self.reject(LifecycleError::ResourceClosed, "attach_input"));
        }

        self.resource.connect_input(stream_id).map_err(|err| {
            self.reject(
                LifecycleError::PlatformRejected {
                    reason: err.to_string(),
                },
                "attach_input",
            )
        })?;

        self.sink.record(
            Severity::Info,
            COMPONENT,
            "input attached",
            json!({ "streamId": stream_id }),
        );
        Ok(())
    }

    // ========================================================================
    // EXTERNAL OBSERVATION
    // ========================================================================

    /// Drain platform notifications and reconcile with the live state.
    ///
    /// Returns the transitions observed, in order. Never resumes: an
    /// externally suspended resource stays suspended until a caller acts on
    /// a fresh user gesture.
    pub fn sync_external_changes(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();

        loop {
            match self.state_rx.try_recv() {
                Ok(next) => {
                    if let Some(change) = self.observe(next) {
                        changes.push(change);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!(
                        "[LifecycleManager] Missed {} state notifications; reconciling",
                        skipped
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        // Notifications can be lost or absent; the live state is authoritative.
        let live = self.resource.state();
        if let Some(change) = self.observe(live) {
            changes.push(change);
        }

        changes
    }

    /// Record an externally driven state, returning the change if any.
    pub fn observe(&mut self, next: ResourceState) -> Option<StateChange> {
        if next == self.state {
            return None;
        }
        // Closed is terminal; ignore stale notifications claiming otherwise.
        if self.state == ResourceState::Closed {
            return None;
        }

        let change = StateChange {
            from: self.state,
            to: next,
        };
        self.state = next;

        if change.from == ResourceState::Running && change.to == ResourceState::Suspended {
            log::warn!(
                "[LifecycleManager] Resource suspended externally; waiting for a user gesture to resume"
            );
            self.sink.record(
                Severity::Warn,
                COMPONENT,
                "suspended externally",
                json!({ "from": change.from, "to": change.to }),
            );
        } else {
            log::info!(
                "[LifecycleManager] External state change {} -> {}",
                change.from,
                change.to
            );
            self.sink.record(
                Severity::Info,
                COMPONENT,
                "external state change",
                json!({ "from": change.from, "to": change.to }),
            );
        }

        Some(change)
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn register_resume_failure(&mut self, err: &LifecycleError) {
        if self.resume_attempts < self.max_resume_attempts {
            self.resume_attempts += 1;
        }

        log_lifecycle_error(err, "resume");
        self.sink.record(
            Severity::Warn,
            COMPONENT,
            "resume failed",
            json!({
                "attempt": self.resume_attempts,
                "maxAttempts": self.max_resume_attempts,
                "code": err.code(),
                "reason": err.message(),
            }),
        );

        if self.resume_attempts == self.max_resume_attempts && !self.escalated {
            self.escalated = true;
            log::error!(
                "[LifecycleManager] Resume failed {} times; automatic retry stopped",
                self.resume_attempts
            );
            self.sink.record(
                Severity::Critical,
                COMPONENT,
                "resume retry limit reached",
                json!({ "attempts": self.resume_attempts }),
            );
        }
    }

    fn reject(&self, err: LifecycleError, context: &str) -> LifecycleError {
        log_lifecycle_error(&err, context);
        self.sink.record(
            Severity::Error,
            COMPONENT,
            &format!("{} failed", context),
            json!({ "code": err.code(), "reason": err.message(), "state": self.state }),
        );
        err
    }
}

#[cfg(test)]
mod tests;
