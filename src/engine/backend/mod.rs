//! Platform abstractions for the audio resource.
//!
//! The core never talks to audio hardware directly. A [`CapabilityProbe`]
//! decides whether a resource can exist and creates it; the resulting
//! [`AudioResource`] handle is then driven exclusively by the lifecycle
//! manager.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::ResourceConfig;

/// Platform-reported state of the audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Uninitialized,
    Running,
    Suspended,
    /// Terminal; no transition leaves this state
    Closed,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Uninitialized => "uninitialized",
            ResourceState::Running => "running",
            ResourceState::Suspended => "suspended",
            ResourceState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Latency/power trade-off requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyHint {
    #[default]
    Interactive,
    Balanced,
    Playback,
}

/// Handle to the single hardware-backed processing resource.
///
/// Lifecycle calls are asynchronous suspension points: the future settles
/// once the platform has finished, after which `state()` reflects the
/// outcome. A platform error means the request was rejected outright.
pub trait AudioResource: Send + Sync {
    fn state(&self) -> ResourceState;
    fn sample_rate(&self) -> u32;
    /// Monotonic resource clock in seconds
    fn current_time(&self) -> f64;

    fn resume(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn suspend(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Notifications for state changes the platform makes on its own
    /// (interruptions, device loss). Only changes made after subscribing are seen.
    fn state_changes(&self) -> broadcast::Receiver<ResourceState>;

    /// Connect an already-permitted input stream to the resource graph.
    fn connect_input(&self, stream_id: &str) -> anyhow::Result<()>;
}

/// Environment capability check plus the gated factory.
pub trait CapabilityProbe: Send + Sync {
    fn can_create_audio_resource(&self) -> bool;

    /// Create the resource. Returns `None` if the platform refuses.
    fn create_audio_resource(&self, config: &ResourceConfig) -> Option<Arc<dyn AudioResource>>;
}

/// Time source used to stamp bus envelopes.
pub trait ClockSource: Send + Sync {
    /// Current time in seconds, or `None` when no clock is available.
    fn now_seconds(&self) -> Option<f64>;
}

/// Clock backed by a live audio resource; silent once the resource closes.
pub struct ResourceClock {
    resource: Arc<dyn AudioResource>,
}

impl ResourceClock {
    pub fn new(resource: Arc<dyn AudioResource>) -> Self {
        Self { resource }
    }
}

impl ClockSource for ResourceClock {
    fn now_seconds(&self) -> Option<f64> {
        match self.resource.state() {
            ResourceState::Closed => None,
            _ => Some(self.resource.current_time()),
        }
    }
}

mod simulated;
pub use simulated::{SimulatedProbe, SimulatedResource};
