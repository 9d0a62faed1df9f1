//! Engine module housing the orchestration layer.
//!
//! `backend` holds the platform abstractions (capability probe, audio
//! resource, clock) and the simulated platform; `core` holds the
//! `EngineFacade`; `slot` holds the composition-root slot that keeps one
//! facade alive at a time.

pub mod backend;
pub mod core;
pub mod slot;

pub use backend::{
    AudioResource, CapabilityProbe, ClockSource, LatencyHint, ResourceClock, ResourceState,
    SimulatedProbe, SimulatedResource,
};
pub use self::core::{EngineFacade, EngineFacadeBuilder, EngineLifecycleState, EngineStatus};
pub use slot::{EngineSlot, SharedEngine};
