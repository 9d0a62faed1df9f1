//! Typed topics for events produced and consumed inside the crate.
//!
//! The registry stays string-keyed; a [`Topic`] pins an event name to a
//! payload type so producer/consumer mismatches surface at compile time.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::EventEnvelope;
use crate::engine::backend::ResourceState;
use crate::engine::EngineLifecycleState;
use crate::error::ErrorReport;

/// An event name bound to its payload type.
pub trait Topic {
    const NAME: &'static str;
    type Payload: Serialize + DeserializeOwned;
}

pub(super) fn decode<T: Topic>(envelope: &EventEnvelope) -> anyhow::Result<T::Payload> {
    serde_json::from_value(envelope.data.clone())
        .with_context(|| format!("payload for {} does not match its topic type", T::NAME))
}

// ========================================================================
// PAYLOADS
// ========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextCreatedPayload {
    pub sample_rate: u32,
    pub state: ResourceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangePayload {
    pub from: ResourceState,
    pub to: ResourceState,
    /// `true` when the platform changed state on its own
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeEscalatedPayload {
    pub attempts: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatePayload {
    pub state: EngineLifecycleState,
    pub resource_state: Option<ResourceState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrophonePayload {
    pub stream_id: String,
}

// ========================================================================
// TOPICS
// ========================================================================

macro_rules! topic {
    ($(#[$meta:meta])* $name:ident, $event:literal, $payload:ty) => {
        $(#[$meta])*
        pub struct $name;

        impl Topic for $name {
            const NAME: &'static str = $event;
            type Payload = $payload;
        }
    };
}

topic!(
    /// Resource created and wrapped by the lifecycle manager
    ContextCreated, "context:created", ContextCreatedPayload
);
topic!(ContextStateChange, "context:statechange", StateChangePayload);
topic!(ContextResumed, "context:resumed", StateChangePayload);
topic!(ContextSuspended, "context:suspended", StateChangePayload);
topic!(
    /// Platform demoted a running resource; a user gesture is needed to resume
    ContextInterrupted, "context:interrupted", StateChangePayload
);
topic!(ContextClosed, "context:closed", StateChangePayload);
topic!(ContextResumeEscalated, "context:resume-escalated", ResumeEscalatedPayload);
topic!(EngineInitialized, "engine:initialized", EngineStatePayload);
topic!(EngineStarted, "engine:started", EngineStatePayload);
topic!(EngineStopped, "engine:stopped", EngineStatePayload);
topic!(EngineDestroyed, "engine:destroyed", EngineStatePayload);
topic!(MicrophoneAttached, "microphone:attached", MicrophonePayload);
topic!(
    /// Classification-ready error for the notification surface
    ErrorOccurred, "error:occurred", ErrorReport
);
