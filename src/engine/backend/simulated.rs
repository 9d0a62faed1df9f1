use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::config::ResourceConfig;

use super::{AudioResource, CapabilityProbe, ResourceState};

/// Simulated audio resource used for deterministic testing and CLI tooling.
///
/// Behaves like a browser audio context: it starts in whatever state the
/// caller picks (usually `suspended`, as before a user gesture), accepts
/// scripted resume failures and can be interrupted from "outside".
pub struct SimulatedResource {
    state: Mutex<ResourceState>,
    sample_rate: u32,
    clock_ms: AtomicU64,
    failing_resumes: AtomicU32,
    resume_stalls: AtomicBool,
    resume_calls: AtomicU32,
    suspend_calls: AtomicU32,
    close_calls: AtomicU32,
    inputs: Mutex<Vec<String>>,
    state_tx: broadcast::Sender<ResourceState>,
}

impl SimulatedResource {
    pub fn new(initial: ResourceState, sample_rate: u32) -> Self {
        let (state_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(initial),
            sample_rate,
            clock_ms: AtomicU64::new(0),
            failing_resumes: AtomicU32::new(0),
            resume_stalls: AtomicBool::new(false),
            resume_calls: AtomicU32::new(0),
            suspend_calls: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
            state_tx,
        }
    }

    /// Reject the next `count` resume requests.
    pub fn fail_next_resumes(&self, count: u32) {
        self.failing_resumes.store(count, Ordering::SeqCst);
    }

    /// When set, resume settles without error but the state stays put,
    /// like a platform that silently ignores a resume outside a gesture.
    pub fn set_resume_stalls(&self, stalls: bool) {
        self.resume_stalls.store(stalls, Ordering::SeqCst);
    }

    /// Platform-driven demotion (e.g. another app took the audio device).
    pub fn interrupt(&self) {
        self.force_state(ResourceState::Suspended);
    }

    /// Change state outside manager control and notify observers.
    pub fn force_state(&self, next: ResourceState) {
        if self.swap_state(next) != next {
            let _ = self.state_tx.send(next);
        }
    }

    pub fn resume_calls(&self) -> u32 {
        self.resume_calls.load(Ordering::SeqCst)
    }

    pub fn suspend_calls(&self) -> u32 {
        self.suspend_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn connected_inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }

    fn current(&self) -> ResourceState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn swap_state(&self, next: ResourceState) -> ResourceState {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    fn take_scripted_failure(&self) -> bool {
        self.failing_resumes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl AudioResource for SimulatedResource {
    fn state(&self) -> ResourceState {
        self.current()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Advances by a fixed 10ms per read so timestamps are deterministic
    /// and strictly increasing.
    fn current_time(&self) -> f64 {
        let ms = self.clock_ms.fetch_add(10, Ordering::SeqCst);
        ms as f64 / 1000.0
    }

    fn resume(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.resume_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.current() == ResourceState::Closed {
                bail!("cannot resume a closed context");
            }
            if self.take_scripted_failure() {
                bail!("resume rejected: no user activation");
            }
            if !self.resume_stalls.load(Ordering::SeqCst) {
                self.swap_state(ResourceState::Running);
            }
            Ok(())
        })
    }

    fn suspend(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.suspend_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.current() == ResourceState::Closed {
                bail!("cannot suspend a closed context");
            }
            self.swap_state(ResourceState::Suspended);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.swap_state(ResourceState::Closed);
            Ok(())
        })
    }

    fn state_changes(&self) -> broadcast::Receiver<ResourceState> {
        self.state_tx.subscribe()
    }

    fn connect_input(&self, stream_id: &str) -> anyhow::Result<()> {
        if self.current() == ResourceState::Closed {
            return Err(anyhow!("context closed"));
        }
        let mut inputs = self
            .inputs
            .lock()
            .map_err(|_| anyhow!("input list poisoned"))?;
        inputs.push(stream_id.to_string());
        Ok(())
    }
}

/// Capability probe handing out [`SimulatedResource`]s.
pub struct SimulatedProbe {
    available: bool,
    refuse_creation: bool,
    initial_state: ResourceState,
    default_sample_rate: u32,
    failing_resumes: u32,
    created: Mutex<Vec<Arc<SimulatedResource>>>,
}

impl SimulatedProbe {
    /// Probe whose resources start `suspended`, as before a user gesture.
    pub fn new() -> Self {
        Self {
            available: true,
            refuse_creation: false,
            initial_state: ResourceState::Suspended,
            default_sample_rate: 44_100,
            failing_resumes: 0,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Environment without audio support.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Capability reported but the factory returns nothing.
    pub fn refusing() -> Self {
        Self {
            refuse_creation: true,
            ..Self::new()
        }
    }

    pub fn with_initial_state(mut self, state: ResourceState) -> Self {
        self.initial_state = state;
        self
    }

    /// Newly created resources reject their first `count` resumes.
    pub fn with_failing_resumes(mut self, count: u32) -> Self {
        self.failing_resumes = count;
        self
    }

    /// Most recently created resource.
    pub fn last_resource(&self) -> Option<Arc<SimulatedResource>> {
        self.created.lock().ok().and_then(|c| c.last().cloned())
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProbe for SimulatedProbe {
    fn can_create_audio_resource(&self) -> bool {
        self.available
    }

    fn create_audio_resource(&self, config: &ResourceConfig) -> Option<Arc<dyn AudioResource>> {
        if !self.available || self.refuse_creation {
            return None;
        }

        let sample_rate = config.sample_rate.unwrap_or(self.default_sample_rate);
        let resource = Arc::new(SimulatedResource::new(self.initial_state, sample_rate));
        resource.fail_next_resumes(self.failing_resumes);

        if let Ok(mut created) = self.created.lock() {
            created.push(Arc::clone(&resource));
        }
        Some(resource)
    }
}
