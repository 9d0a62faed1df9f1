use std::sync::Mutex;

use super::*;
use crate::config::LifecycleConfig;
use crate::engine::backend::{AudioResource, SimulatedProbe, SimulatedResource};
use crate::error::EngineErrorCodes;
use crate::telemetry::DiagnosticsCollector;

struct Harness {
    facade: EngineFacade,
    probe: Arc<SimulatedProbe>,
    collector: Arc<DiagnosticsCollector>,
    events: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(probe: SimulatedProbe) -> Self {
        let probe = Arc::new(probe);
        let collector = Arc::new(DiagnosticsCollector::default());
        let config = EngineConfig {
            lifecycle: LifecycleConfig {
                max_resume_attempts: 3,
                retry_delay_ms: 0,
            },
            ..EngineConfig::default()
        };

        let facade = EngineFacade::builder()
            .config(config)
            .probe(probe.clone())
            .sink(collector.clone())
            .build()
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        for name in [
            "context:created",
            "context:statechange",
            "context:resumed",
            "context:suspended",
            "context:interrupted",
            "context:closed",
            "context:resume-escalated",
            "engine:initialized",
            "engine:started",
            "engine:stopped",
            "engine:destroyed",
            "microphone:attached",
            "error:occurred",
        ] {
            let log = Arc::clone(&events);
            facade.bus().subscribe(
                name,
                move |envelope| {
                    log.lock().unwrap().push(envelope.event.clone());
                    Ok(())
                },
                0,
            );
        }

        Self {
            facade,
            probe,
            collector,
            events,
        }
    }

    fn resource(&self) -> Arc<SimulatedResource> {
        self.probe.last_resource().unwrap()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn saw(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }
}

#[test]
fn test_builder_requires_probe() {
    assert!(EngineFacade::builder().build().is_err());
}

#[tokio::test]
async fn test_init_resumes_suspended_resource_once() {
    let mut h = Harness::new(SimulatedProbe::new());

    h.facade.init().await.unwrap();

    assert_eq!(h.facade.state(), EngineLifecycleState::Initialized);
    assert_eq!(h.facade.resource_state(), Some(ResourceState::Running));
    assert!(h.facade.is_ready());
    assert_eq!(h.resource().resume_calls(), 1);
    assert_eq!(
        h.events(),
        vec!["context:created", "context:resumed", "engine:initialized"]
    );
}

#[tokio::test]
async fn test_init_tolerates_failed_initial_resume() {
    let mut h = Harness::new(SimulatedProbe::new().with_failing_resumes(1));

    h.facade.init().await.unwrap();

    assert_eq!(h.facade.state(), EngineLifecycleState::Initialized);
    assert_eq!(h.facade.resource_state(), Some(ResourceState::Suspended));
    assert!(h.facade.is_ready(), "initialized counts as ready");
    assert!(!h.saw("error:occurred"));
}

#[tokio::test]
async fn test_init_runs_once() {
    let mut h = Harness::new(SimulatedProbe::new());

    h.facade.init().await.unwrap();
    h.facade.init().await.unwrap();

    assert_eq!(h.probe.created_count(), 1);
}

#[tokio::test]
async fn test_init_without_capability_is_sticky() {
    let mut h = Harness::new(SimulatedProbe::unavailable());

    let err = h.facade.init().await.unwrap_err();
    assert_eq!(err, EngineError::CapabilityUnavailable);
    assert_eq!(h.facade.state(), EngineLifecycleState::Error);
    assert!(h.saw("error:occurred"));

    let again = h.facade.init().await.unwrap_err();
    assert_eq!(again.code(), EngineErrorCodes::INIT_FAILED);
    assert!(again.message().contains("not supported"));
    assert_eq!(h.probe.created_count(), 0);

    let status = h.facade.status();
    assert_eq!(
        status.last_error.map(|r| r.code),
        Some(EngineErrorCodes::CAPABILITY_UNAVAILABLE)
    );
}

#[tokio::test]
async fn test_init_reports_refused_creation() {
    let mut h = Harness::new(SimulatedProbe::refusing());

    let err = h.facade.init().await.unwrap_err();
    assert!(matches!(err, EngineError::CreationFailed { .. }));
    assert!(h.facade.status().resource.is_none());
}

#[tokio::test]
async fn test_start_resumes_and_announces() {
    let mut h = Harness::new(SimulatedProbe::new().with_failing_resumes(2));

    h.facade.start().await.unwrap();

    assert_eq!(h.facade.state(), EngineLifecycleState::Running);
    assert!(h.facade.is_ready());
    // One attempt from init, two from start's bounded retry.
    assert_eq!(h.resource().resume_calls(), 3);
    assert!(h.saw("engine:started"));
}

#[tokio::test]
async fn test_start_escalates_after_retry_limit() {
    let mut h = Harness::new(SimulatedProbe::new().with_failing_resumes(10));

    let err = h.facade.start().await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Lifecycle(LifecycleError::RetryLimitReached { attempts: 3 })
    ));
    assert!(h.saw("context:resume-escalated"));
    assert!(h.saw("error:occurred"));
    assert!(!h.saw("engine:started"));
    assert_eq!(h.collector.records_at_least(Severity::Critical).len(), 1);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();

    h.facade.stop().await.unwrap();
    h.facade.stop().await.unwrap();

    assert_eq!(h.facade.state(), EngineLifecycleState::Stopped);
    assert_eq!(h.resource().suspend_calls(), 1);
    let stops = h.events().iter().filter(|e| *e == "engine:stopped").count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_stop_before_init_is_noop() {
    let mut h = Harness::new(SimulatedProbe::new());
    assert!(h.facade.stop().await.is_ok());
    assert_eq!(h.facade.state(), EngineLifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_destroy_closes_and_blocks_further_use() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();
    let resource = h.resource();

    h.facade.destroy().await.unwrap();

    assert_eq!(resource.state(), ResourceState::Closed);
    assert_eq!(h.facade.state(), EngineLifecycleState::Destroyed);
    assert!(h.facade.resource_state().is_none());
    assert!(h.saw("context:closed"));
    assert!(h.saw("engine:destroyed"));

    assert_eq!(h.facade.start().await.unwrap_err(), EngineError::Destroyed);
    assert!(h.facade.destroy().await.is_ok());
    assert_eq!(resource.close_calls(), 1);
}

#[tokio::test]
async fn test_external_interruption_stops_without_resuming() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();
    let resource = h.resource();
    let resumes_before = resource.resume_calls();

    resource.interrupt();
    let changes = h.facade.sync_external_state();

    assert_eq!(
        changes,
        vec![StateChange {
            from: ResourceState::Running,
            to: ResourceState::Suspended,
        }]
    );
    assert_eq!(h.facade.state(), EngineLifecycleState::Stopped);
    assert!(h.saw("context:statechange"));
    assert!(h.saw("context:interrupted"));
    assert_eq!(resource.resume_calls(), resumes_before);

    h.facade.start().await.unwrap();
    assert_eq!(h.facade.state(), EngineLifecycleState::Running);
}

#[tokio::test]
async fn test_external_close_moves_to_error() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();

    h.resource().force_state(ResourceState::Closed);
    h.facade.sync_external_state();

    assert_eq!(h.facade.state(), EngineLifecycleState::Error);
    assert!(h.saw("context:closed"));
    assert!(matches!(
        h.facade.start().await,
        Err(EngineError::InitFailed { .. })
    ));
}

#[tokio::test]
async fn test_start_notices_unsynced_external_close() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();

    h.resource().force_state(ResourceState::Closed);
    let err = h.facade.start().await.unwrap_err();

    assert!(matches!(err, EngineError::InitFailed { .. }));
    assert_eq!(h.facade.state(), EngineLifecycleState::Error);
    assert!(!h.facade.is_ready());
    assert!(h.saw("context:closed"));
}

#[tokio::test]
async fn test_stop_notices_unsynced_external_close() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.start().await.unwrap();

    h.resource().force_state(ResourceState::Closed);
    let err = h.facade.stop().await.unwrap_err();

    assert_eq!(err, EngineError::Lifecycle(LifecycleError::ResourceClosed));
    assert_eq!(h.facade.state(), EngineLifecycleState::Error);
    assert_eq!(h.resource().suspend_calls(), 0);
}

#[tokio::test]
async fn test_escalation_is_announced_once_across_starts() {
    let mut h = Harness::new(SimulatedProbe::new().with_failing_resumes(100));

    for _ in 0..3 {
        assert!(h.facade.start().await.is_err());
    }

    let escalations = h
        .events()
        .iter()
        .filter(|e| *e == "context:resume-escalated")
        .count();
    assert_eq!(escalations, 1);
    assert_eq!(h.collector.records_at_least(Severity::Critical).len(), 1);
    // init + two retries reach the cap; each later start makes one more attempt
    assert_eq!(h.resource().resume_calls(), 5);
}

#[tokio::test]
async fn test_attach_microphone() {
    let mut h = Harness::new(SimulatedProbe::new());

    assert_eq!(
        h.facade.attach_microphone("mic-1").unwrap_err(),
        EngineError::Lifecycle(LifecycleError::NotInitialized)
    );

    h.facade.init().await.unwrap();
    h.facade.attach_microphone("mic-1").unwrap();

    assert_eq!(h.resource().connected_inputs(), vec!["mic-1".to_string()]);
    assert!(h.saw("microphone:attached"));
}

#[tokio::test]
async fn test_bus_is_stamped_with_resource_clock() {
    let mut h = Harness::new(SimulatedProbe::new());
    h.facade.init().await.unwrap();

    let stamp = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&stamp);
    h.facade.bus().subscribe(
        "pitch:detected",
        move |envelope| {
            *sink.lock().unwrap() = envelope.timestamp;
            Ok(())
        },
        0,
    );
    h.facade.bus().publish("pitch:detected", json!(440.0), None);

    assert!(stamp.lock().unwrap().is_some());
}
