// Managers Module
//
// Focused manager types owned by the engine facade.
//
// - ResourceLifecycleManager: audio resource state machine with bounded resume retry

pub mod lifecycle_manager;

pub use lifecycle_manager::{LifecycleStatus, ResourceLifecycleManager, StateChange};
