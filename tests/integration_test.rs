// Integration tests for the public engine API
//
// These drive the facade, the lifecycle manager and the bus together
// against the simulated platform, the way a host application would.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::json;

use vocal_coach_core::bus::topics::{ContextInterrupted, StateChangePayload};
use vocal_coach_core::config::{EngineConfig, LifecycleConfig};
use vocal_coach_core::engine::{AudioResource, EngineFacade, EngineSlot, SimulatedProbe};
use vocal_coach_core::math::{analyze_frequency, Accuracy};
use vocal_coach_core::telemetry::{DiagnosticsCollector, Severity};
use vocal_coach_core::{EngineLifecycleState, EventBus, ResourceState};

fn fast_config() -> EngineConfig {
    EngineConfig {
        lifecycle: LifecycleConfig {
            max_resume_attempts: 3,
            retry_delay_ms: 0,
        },
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn test_full_session_over_shared_bus() {
    let bus = EventBus::new();
    let probe = Arc::new(SimulatedProbe::new());
    let collector = Arc::new(DiagnosticsCollector::default());

    let mut engine = EngineFacade::builder()
        .config(fast_config())
        .probe(probe.clone())
        .sink(collector.clone())
        .bus(bus.clone())
        .build()
        .unwrap();

    let mut lifecycle = bus.subscribe_stream("engine:started", 0);

    // A pitch consumer living on the same bus as the engine.
    let config = engine.config().clone();
    let readings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&readings);
    bus.namespace("pitch").subscribe(
        "detected",
        move |envelope| {
            let frequency = envelope
                .data
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("expected a frequency"))?;
            if let Some(reading) = analyze_frequency(frequency, &config.accuracy) {
                sink.lock().unwrap().push((reading, envelope.timestamp));
            }
            Ok(())
        },
        0,
    );

    engine.start().await.unwrap();
    assert!(lifecycle.next().await.is_some());

    engine.attach_microphone("mic-0").unwrap();
    bus.publish("pitch:detected", json!(442.0), None);

    {
        let readings = readings.lock().unwrap();
        assert_eq!(readings.len(), 1);
        let (reading, timestamp) = &readings[0];
        assert_eq!(reading.note, "A4");
        assert_eq!(reading.accuracy, Accuracy::Excellent);
        assert!(timestamp.is_some(), "envelope should carry the resource clock");
    }

    engine.stop().await.unwrap();
    engine.destroy().await.unwrap();

    assert_eq!(probe.last_resource().unwrap().state(), ResourceState::Closed);
    assert!(collector.snapshot().total_records > 0);
    assert!(collector.records_at_least(Severity::Error).is_empty());
}

#[tokio::test]
async fn test_interruption_requires_explicit_restart() {
    let probe = Arc::new(SimulatedProbe::new());
    let mut engine = EngineFacade::builder()
        .config(fast_config())
        .probe(probe.clone())
        .build()
        .unwrap();

    let interruptions = Arc::new(Mutex::new(Vec::<StateChangePayload>::new()));
    let sink = Arc::clone(&interruptions);
    engine.bus().subscribe_topic::<ContextInterrupted, _>(
        move |payload, _| {
            sink.lock().unwrap().push(payload);
            Ok(())
        },
        0,
    );

    engine.start().await.unwrap();
    let resource = probe.last_resource().unwrap();
    resource.interrupt();
    engine.sync_external_state();

    assert_eq!(interruptions.lock().unwrap().len(), 1);
    assert!(interruptions.lock().unwrap()[0].external);
    assert_eq!(engine.state(), EngineLifecycleState::Stopped);

    // Nothing brings the resource back on its own.
    engine.sync_external_state();
    assert_eq!(resource.state(), ResourceState::Suspended);

    engine.start().await.unwrap();
    assert_eq!(resource.state(), ResourceState::Running);
}

#[tokio::test]
async fn test_escalation_then_manual_recovery() {
    let probe = Arc::new(SimulatedProbe::new().with_failing_resumes(3));
    let collector = Arc::new(DiagnosticsCollector::default());
    let mut engine = EngineFacade::builder()
        .config(fast_config())
        .probe(probe.clone())
        .sink(collector.clone())
        .build()
        .unwrap();

    assert!(engine.start().await.is_err());
    let status = engine.status();
    assert_eq!(status.resource.as_ref().map(|r| r.escalated), Some(true));
    assert_eq!(collector.records_at_least(Severity::Critical).len(), 1);

    // Scripted failures are used up; the next gesture succeeds.
    engine.start().await.unwrap();
    assert!(engine.is_ready());
    assert_eq!(engine.status().resource.map(|r| r.resume_attempts), Some(0));
}

#[tokio::test]
async fn test_slot_provides_fresh_engine_after_destroy() {
    let probe = Arc::new(SimulatedProbe::new());
    let factory_probe = probe.clone();
    let slot = EngineSlot::new(move || {
        EngineFacade::builder()
            .config(fast_config())
            .probe(factory_probe.clone())
            .build()
    });

    let engine = slot.instance().unwrap();
    engine.lock().await.start().await.unwrap();
    slot.destroy().await.unwrap();

    let fresh = slot.instance().unwrap();
    let mut fresh = fresh.lock().await;
    assert_eq!(fresh.state(), EngineLifecycleState::Uninitialized);
    fresh.start().await.unwrap();

    assert_eq!(probe.created_count(), 2);
}
