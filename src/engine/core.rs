//! EngineFacade: orchestration layer over the audio resource.
//!
//! The facade owns the capability probe, the lifecycle manager of the single
//! audio resource, and the coordination bus. It turns lifecycle outcomes
//! into bus events and diagnostics, and never panics on operational
//! failures: every public operation returns a `Result` and reports the
//! failure on `error:occurred` as well.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bus::topics::{
    ContextClosed, ContextCreated, ContextCreatedPayload, ContextInterrupted,
    ContextResumeEscalated, ContextResumed, ContextStateChange, ContextSuspended,
    EngineDestroyed, EngineInitialized, EngineStarted, EngineStatePayload, EngineStopped,
    ErrorOccurred, MicrophoneAttached, MicrophonePayload, ResumeEscalatedPayload,
    StateChangePayload,
};
use crate::bus::{EventBus, Topic};
use crate::config::EngineConfig;
use crate::engine::backend::{CapabilityProbe, ResourceState};
use crate::error::{log_engine_error, ErrorCode, EngineError, ErrorReport, LifecycleError};
use crate::managers::{LifecycleStatus, ResourceLifecycleManager, StateChange};
use crate::telemetry::{DiagnosticsSink, Severity, TracingSink};

const COMPONENT: &str = "EngineFacade";

/// Coarse engine state, independent of the resource's own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLifecycleState {
    Uninitialized,
    /// Resource created; may be `running` or `suspended`
    Initialized,
    Running,
    Stopped,
    /// `init()` failed or the resource was closed underneath the engine
    Error,
    Destroyed,
}

/// Snapshot returned by [`EngineFacade::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineLifecycleState,
    pub resource: Option<LifecycleStatus>,
    pub last_error: Option<ErrorReport>,
}

/// Builder for [`EngineFacade`].
///
/// The capability probe is the only required dependency; everything else
/// falls back to defaults.
#[derive(Default)]
pub struct EngineFacadeBuilder {
    config: Option<EngineConfig>,
    probe: Option<Arc<dyn CapabilityProbe>>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    bus: Option<EventBus>,
}

impl EngineFacadeBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share an existing bus instead of creating one from `config.bus`.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> anyhow::Result<EngineFacade> {
        let Some(probe) = self.probe else {
            anyhow::bail!("EngineFacade requires a capability probe");
        };

        let config = self.config.unwrap_or_default();
        if let Err(problems) = config.validate() {
            log::warn!(
                "[EngineFacade] Building with questionable configuration: {}",
                problems.join("; ")
            );
        }

        let bus = self.bus.unwrap_or_else(|| EventBus::with_config(&config.bus));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn DiagnosticsSink>);

        Ok(EngineFacade {
            config,
            probe,
            sink,
            bus,
            manager: None,
            state: EngineLifecycleState::Uninitialized,
            last_error: None,
        })
    }
}

/// Orchestrates the audio resource lifecycle and announces it on the bus.
///
/// One facade owns at most one resource. [`EngineSlot`](super::EngineSlot)
/// keeps one facade per composition root.
pub struct EngineFacade {
    config: EngineConfig,
    probe: Arc<dyn CapabilityProbe>,
    sink: Arc<dyn DiagnosticsSink>,
    bus: EventBus,
    manager: Option<ResourceLifecycleManager>,
    state: EngineLifecycleState,
    last_error: Option<EngineError>,
}

impl EngineFacade {
    pub fn builder() -> EngineFacadeBuilder {
        EngineFacadeBuilder::default()
    }

    pub fn state(&self) -> EngineLifecycleState {
        self.state
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resource_state(&self) -> Option<ResourceState> {
        self.manager.as_ref().map(|m| m.state())
    }

    /// `Initialized` and `Running` both count as ready; a suspended
    /// resource after `init()` still accepts inputs and a later `start()`.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            EngineLifecycleState::Initialized | EngineLifecycleState::Running
        )
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            resource: self.manager.as_ref().map(|m| m.status()),
            last_error: self
                .last_error
                .as_ref()
                .map(|err| ErrorReport::from_error(err, "status")),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Create and wrap the audio resource.
    ///
    /// Runs once: later calls return the outcome of the first, a failure
    /// coming back as `InitFailed` until `destroy()`. A resource that starts
    /// `suspended` gets one resume attempt; staying suspended is a valid
    /// outcome, not an error.
    pub async fn init(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineLifecycleState::Uninitialized => {}
            EngineLifecycleState::Destroyed => return Err(EngineError::Destroyed),
            EngineLifecycleState::Error => {
                return Err(EngineError::InitFailed {
                    reason: self
                        .last_error
                        .as_ref()
                        .map(ErrorCode::message)
                        .unwrap_or_default(),
                })
            }
            _ => return Ok(()),
        }

        if !self.probe.can_create_audio_resource() {
            return Err(self.fail_init(EngineError::CapabilityUnavailable));
        }

        let Some(resource) = self.probe.create_audio_resource(&self.config.resource) else {
            return Err(self.fail_init(EngineError::CreationFailed {
                reason: "factory returned no resource".to_string(),
            }));
        };

        let mut manager =
            ResourceLifecycleManager::new(resource, &self.config.lifecycle, Arc::clone(&self.sink));
        self.bus.set_clock(Some(manager.clock()));

        let initial = manager.state();
        self.emit::<ContextCreated>(&ContextCreatedPayload {
            sample_rate: manager.sample_rate(),
            state: initial,
        });

        let resume_failure = if initial == ResourceState::Suspended {
            manager.resume().await.err()
        } else {
            None
        };
        let status = manager.status();
        self.manager = Some(manager);
        self.state = EngineLifecycleState::Initialized;

        match resume_failure {
            None if initial != status.state => {
                self.emit::<ContextResumed>(&StateChangePayload {
                    from: initial,
                    to: status.state,
                    external: false,
                });
            }
            None => {}
            Some(err) => {
                log::warn!(
                    "[EngineFacade] Initial resume failed ({}); resource stays {}",
                    err,
                    status.state
                );
                self.sink.record(
                    Severity::Warn,
                    COMPONENT,
                    "initial resume failed",
                    json!({ "state": status.state, "attempts": status.resume_attempts }),
                );
                if status.escalated {
                    self.announce_escalation(&status);
                }
            }
        }

        log::info!(
            "[EngineFacade] Initialized ({} Hz, resource {})",
            status.sample_rate,
            status.state
        );
        self.emit_engine_state::<EngineInitialized>();
        Ok(())
    }

    /// `init()` followed by a bounded resume if the resource is not running.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.sync_external_state();
        self.init().await?;

        let (from, was_escalated, outcome, status) = {
            let manager = self.manager_mut()?;
            let from = manager.state();
            let was_escalated = manager.is_escalated();
            let outcome = if from == ResourceState::Running {
                Ok(())
            } else {
                manager.resume_with_retry().await
            };
            (from, was_escalated, outcome, manager.status())
        };

        if let Err(err) = outcome {
            if status.escalated && !was_escalated {
                self.announce_escalation(&status);
            }
            return Err(self.report(EngineError::Lifecycle(err), "start"));
        }

        if from != ResourceState::Running {
            self.emit::<ContextResumed>(&StateChangePayload {
                from,
                to: ResourceState::Running,
                external: false,
            });
        }

        if self.state != EngineLifecycleState::Running {
            self.state = EngineLifecycleState::Running;
            log::info!("[EngineFacade] Started");
            self.emit_engine_state::<EngineStarted>();
        }
        Ok(())
    }

    /// Suspend the resource. Idempotent; a no-op before `init()`.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        if self.state == EngineLifecycleState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        self.sync_external_state();
        let Some(manager) = self.manager.as_mut() else {
            log::debug!("[EngineFacade] stop() before init(); nothing to do");
            return Ok(());
        };

        let from = manager.state();
        if let Err(err) = manager.suspend().await {
            return Err(self.report(EngineError::Lifecycle(err), "stop"));
        }

        if from != ResourceState::Suspended {
            self.emit::<ContextSuspended>(&StateChangePayload {
                from,
                to: ResourceState::Suspended,
                external: false,
            });
        }

        if self.state != EngineLifecycleState::Stopped {
            self.state = EngineLifecycleState::Stopped;
            log::info!("[EngineFacade] Stopped");
            self.emit_engine_state::<EngineStopped>();
        }
        Ok(())
    }

    /// Close the resource and release everything the facade owns.
    ///
    /// Teardown always completes; a failed close is reported and returned
    /// after the facade has reached `Destroyed`.
    pub async fn destroy(&mut self) -> Result<(), EngineError> {
        if self.state == EngineLifecycleState::Destroyed {
            return Ok(());
        }

        let mut close_failure = None;
        if let Some(mut manager) = self.manager.take() {
            let from = manager.state();
            match manager.close().await {
                Ok(()) if from != ResourceState::Closed => {
                    self.emit::<ContextClosed>(&StateChangePayload {
                        from,
                        to: ResourceState::Closed,
                        external: false,
                    });
                }
                Ok(()) => {}
                Err(err) => close_failure = Some(EngineError::Lifecycle(err)),
            }
        }

        self.bus.set_clock(None);
        self.last_error = None;
        self.state = EngineLifecycleState::Destroyed;
        log::info!("[EngineFacade] Destroyed");
        self.emit_engine_state::<EngineDestroyed>();

        match close_failure {
            Some(err) => Err(self.report(err, "destroy")),
            None => Ok(()),
        }
    }

    // ========================================================================
    // EXTERNAL EVENTS
    // ========================================================================

    /// Pull platform-driven state changes into the facade and announce them.
    ///
    /// An interruption of a running engine moves it to `Stopped`; the engine
    /// does not resume on its own. A resource closed underneath the engine
    /// moves it to `Error`.
    pub fn sync_external_state(&mut self) -> Vec<StateChange> {
        let changes = match self.manager.as_mut() {
            Some(manager) => manager.sync_external_changes(),
            None => return Vec::new(),
        };

        for change in &changes {
            let payload = StateChangePayload {
                from: change.from,
                to: change.to,
                external: true,
            };
            self.emit::<ContextStateChange>(&payload);

            match (change.from, change.to) {
                (ResourceState::Running, ResourceState::Suspended) => {
                    self.emit::<ContextInterrupted>(&payload);
                    if self.state == EngineLifecycleState::Running {
                        self.state = EngineLifecycleState::Stopped;
                        self.emit_engine_state::<EngineStopped>();
                    }
                }
                (_, ResourceState::Closed) => {
                    self.emit::<ContextClosed>(&payload);
                    self.state = EngineLifecycleState::Error;
                    let err = self.report(
                        EngineError::Lifecycle(LifecycleError::ResourceClosed),
                        "sync_external_state",
                    );
                    self.last_error = Some(err);
                }
                _ => {}
            }
        }

        changes
    }

    /// Connect a permitted microphone stream to the resource.
    pub fn attach_microphone(&mut self, stream_id: &str) -> Result<(), EngineError> {
        if self.state == EngineLifecycleState::Destroyed {
            return Err(EngineError::Destroyed);
        }

        let outcome = self.manager_mut()?.attach_input(stream_id);
        if let Err(err) = outcome {
            return Err(self.report(EngineError::Lifecycle(err), "attach_microphone"));
        }

        self.emit::<MicrophoneAttached>(&MicrophonePayload {
            stream_id: stream_id.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn manager_mut(&mut self) -> Result<&mut ResourceLifecycleManager, EngineError> {
        match self.state {
            EngineLifecycleState::Destroyed => Err(EngineError::Destroyed),
            _ => self
                .manager
                .as_mut()
                .ok_or(EngineError::Lifecycle(LifecycleError::NotInitialized)),
        }
    }

    fn fail_init(&mut self, err: EngineError) -> EngineError {
        self.state = EngineLifecycleState::Error;
        let err = self.report(err, "init");
        self.last_error = Some(err.clone());
        err
    }

    /// Log, record and publish `err`, handing it back to the caller.
    fn report(&self, err: EngineError, context: &str) -> EngineError {
        log_engine_error(&err, context);
        let report = ErrorReport::from_error(&err, context);
        self.sink.record(
            Severity::Error,
            COMPONENT,
            &format!("{} failed", context),
            json!({ "code": report.code, "name": report.name, "message": report.message }),
        );
        self.emit::<ErrorOccurred>(&report);
        err
    }

    fn announce_escalation(&self, status: &LifecycleStatus) {
        self.emit::<ContextResumeEscalated>(&ResumeEscalatedPayload {
            attempts: status.resume_attempts,
            max_attempts: status.max_resume_attempts,
        });
    }

    fn emit_engine_state<T>(&self)
    where
        T: Topic<Payload = EngineStatePayload>,
    {
        self.emit::<T>(&EngineStatePayload {
            state: self.state,
            resource_state: self.resource_state(),
        });
    }

    fn emit<T: Topic>(&self, payload: &T::Payload) -> usize {
        tracing::debug!(event = T::NAME, "[EngineFacade] publish");
        self.bus.publish_topic::<T>(payload)
    }
}

#[cfg(test)]
mod tests;
