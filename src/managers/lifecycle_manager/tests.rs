use super::*;
use crate::engine::backend::SimulatedResource;
use crate::telemetry::DiagnosticsCollector;

fn fast_config() -> LifecycleConfig {
    LifecycleConfig {
        max_resume_attempts: 3,
        retry_delay_ms: 0,
    }
}

fn manager_with(
    initial: ResourceState,
) -> (
    ResourceLifecycleManager,
    Arc<SimulatedResource>,
    Arc<DiagnosticsCollector>,
) {
    let resource = Arc::new(SimulatedResource::new(initial, 48_000));
    let collector = Arc::new(DiagnosticsCollector::default());
    let manager = ResourceLifecycleManager::new(resource.clone(), &fast_config(), collector.clone());
    (manager, resource, collector)
}

fn critical_count(collector: &DiagnosticsCollector) -> usize {
    collector.records_at_least(Severity::Critical).len()
}

#[test]
fn test_initial_state_comes_from_resource() {
    let (manager, resource, _) = manager_with(ResourceState::Running);
    assert_eq!(manager.state(), ResourceState::Running);
    assert_eq!(manager.sample_rate(), 48_000);
    assert_eq!(resource.resume_calls(), 0);

    let (manager, resource, _) = manager_with(ResourceState::Suspended);
    assert_eq!(manager.state(), ResourceState::Suspended);
    assert_eq!(resource.resume_calls(), 0, "construction must never resume");
}

#[tokio::test]
async fn test_resume_when_running_skips_platform() {
    let (mut manager, resource, _) = manager_with(ResourceState::Running);
    assert!(manager.resume().await.is_ok());
    assert_eq!(resource.resume_calls(), 0);
}

#[tokio::test]
async fn test_resume_from_suspended_succeeds() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    assert!(manager.resume().await.is_ok());
    assert_eq!(manager.state(), ResourceState::Running);
    assert_eq!(resource.resume_calls(), 1);
    assert_eq!(manager.resume_attempts(), 0);
}

#[tokio::test]
async fn test_resume_on_closed_always_fails() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    manager.close().await.unwrap();

    for _ in 0..2 {
        let err = manager.resume().await.unwrap_err();
        assert_eq!(err, LifecycleError::ResourceClosed);
    }
    assert_eq!(resource.resume_calls(), 0);
    assert_eq!(manager.resume_attempts(), 0, "closed rejections are not retry attempts");
}

#[tokio::test]
async fn test_three_failures_escalate_once() {
    let (mut manager, resource, collector) = manager_with(ResourceState::Suspended);
    resource.fail_next_resumes(10);

    for expected in 1..=2 {
        assert!(manager.resume().await.is_err());
        assert_eq!(manager.resume_attempts(), expected);
        assert!(!manager.is_escalated());
    }

    assert!(manager.resume().await.is_err());
    assert_eq!(manager.resume_attempts(), 3);
    assert!(manager.is_escalated());
    assert_eq!(critical_count(&collector), 1);

    // Fourth attempt still reaches the platform and fails, without re-escalating.
    let err = manager.resume().await.unwrap_err();
    assert!(matches!(err, LifecycleError::PlatformRejected { .. }));
    assert_eq!(manager.resume_attempts(), 3);
    assert_eq!(critical_count(&collector), 1);
    assert_eq!(resource.resume_calls(), 4);
}

#[tokio::test]
async fn test_success_resets_attempt_counter() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    resource.fail_next_resumes(2);

    assert!(manager.resume().await.is_err());
    assert!(manager.resume().await.is_err());
    assert_eq!(manager.resume_attempts(), 2);

    assert!(manager.resume().await.is_ok());
    assert_eq!(manager.resume_attempts(), 0);
    assert!(!manager.is_escalated());
}

#[tokio::test]
async fn test_manual_retry_after_escalation() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    resource.fail_next_resumes(3);

    for _ in 0..3 {
        let _ = manager.resume().await;
    }
    assert!(manager.is_escalated());

    assert!(manager.resume().await.is_ok());
    assert_eq!(manager.state(), ResourceState::Running);
    assert!(!manager.is_escalated());
}

#[tokio::test]
async fn test_resume_that_settles_in_wrong_state_counts_as_failure() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    resource.set_resume_stalls(true);

    let err = manager.resume().await.unwrap_err();
    assert_eq!(
        err,
        LifecycleError::UnexpectedState {
            expected: ResourceState::Running,
            actual: ResourceState::Suspended,
        }
    );
    assert_eq!(manager.resume_attempts(), 1);
}

#[tokio::test]
async fn test_resume_with_retry_recovers_from_transient_failures() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    resource.fail_next_resumes(2);

    assert!(manager.resume_with_retry().await.is_ok());
    assert_eq!(resource.resume_calls(), 3);
    assert_eq!(manager.state(), ResourceState::Running);
}

#[tokio::test]
async fn test_resume_with_retry_stops_at_cap() {
    let (mut manager, resource, collector) = manager_with(ResourceState::Suspended);
    resource.fail_next_resumes(100);

    let err = manager.resume_with_retry().await.unwrap_err();
    assert_eq!(err, LifecycleError::RetryLimitReached { attempts: 3 });
    assert_eq!(resource.resume_calls(), 3);
    assert_eq!(critical_count(&collector), 1);

    manager.reset_attempts();
    assert_eq!(manager.status().resume_attempts, 0);
    assert!(!manager.status().escalated);
}

#[tokio::test]
async fn test_suspend_is_idempotent() {
    let (mut manager, resource, _) = manager_with(ResourceState::Running);

    assert!(manager.suspend().await.is_ok());
    assert!(manager.suspend().await.is_ok());
    assert_eq!(manager.state(), ResourceState::Suspended);
    assert_eq!(resource.suspend_calls(), 1);
}

#[tokio::test]
async fn test_close_is_terminal_and_idempotent() {
    let (mut manager, resource, _) = manager_with(ResourceState::Running);

    assert!(manager.close().await.is_ok());
    assert!(manager.close().await.is_ok());
    assert_eq!(resource.close_calls(), 1);
    assert_eq!(manager.state(), ResourceState::Closed);

    assert_eq!(
        manager.suspend().await.unwrap_err(),
        LifecycleError::ResourceClosed
    );
    assert_eq!(
        manager.attach_input("mic-1").unwrap_err(),
        LifecycleError::ResourceClosed
    );

    // A stale notification cannot reopen it.
    assert!(manager.observe(ResourceState::Running).is_none());
    assert_eq!(manager.state(), ResourceState::Closed);
}

#[tokio::test]
async fn test_external_suspension_is_observed_but_not_resumed() {
    let (mut manager, resource, collector) = manager_with(ResourceState::Suspended);
    manager.resume().await.unwrap();

    resource.interrupt();
    let changes = manager.sync_external_changes();

    assert_eq!(
        changes,
        vec![StateChange {
            from: ResourceState::Running,
            to: ResourceState::Suspended,
        }]
    );
    assert_eq!(manager.state(), ResourceState::Suspended);
    assert_eq!(resource.resume_calls(), 1, "no automatic resume");
    assert!(collector
        .records_at_least(Severity::Warn)
        .iter()
        .any(|r| r.message == "suspended externally"));

    // Nothing new to report on the next sync.
    assert!(manager.sync_external_changes().is_empty());
}

#[test]
fn test_attach_input_forwards_to_resource() {
    let (mut manager, resource, _) = manager_with(ResourceState::Suspended);
    assert!(manager.attach_input("mic-1").is_ok());
    assert_eq!(resource.connected_inputs(), vec!["mic-1".to_string()]);
}

#[test]
fn test_clock_reads_resource_time() {
    let (manager, _, _) = manager_with(ResourceState::Running);
    let clock = manager.clock();
    let first = clock.now_seconds().unwrap();
    let second = clock.now_seconds().unwrap();
    assert!(second > first);
}
