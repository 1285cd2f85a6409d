// Agent identity, responder categories and the per-agent context

use crate::incident::Severity;
use crate::message::{Envelope, MessageError, MessageKind, ReasonPayload, SchemaRegistry};
use crate::monitor::SimulationMonitor;
use crate::transport::{Directory, MessageRouter};
use crate::unit::UnitRole;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};


/// Feed a broker publishes calls-for-proposals on.
pub const INCIDENT_ALERTS_FEED: &str = "incident-alerts";

/// Feed the environment publishes severity changes on.
pub const INCIDENT_STATUS_FEED: &str = "incident-status";

/// Capability registered by the environment agent.
pub const ENVIRONMENT_CAPABILITY: &str = "environment";

/// Unique name of an agent on the message router.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Responder category: each has its own broker, stations and unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponderKind {
    FireBrigade,
    Hospital,
}

impl ResponderKind {
    pub const ALL: [ResponderKind; 2] = [ResponderKind::FireBrigade, ResponderKind::Hospital];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderKind::FireBrigade => "fire-brigade",
            ResponderKind::Hospital => "hospital",
        }
    }

    /// Directory capability of this category's broker.
    pub fn broker_capability(&self) -> &'static str {
        match self {
            ResponderKind::FireBrigade => "fire-brigade-coordinator",
            ResponderKind::Hospital => "hospital-coordinator",
        }
    }

    /// Directory capability of this category's stations.
    pub fn station_capability(&self) -> &'static str {
        match self {
            ResponderKind::FireBrigade => "fire-brigade-station",
            ResponderKind::Hospital => "hospital-station",
        }
    }

    pub fn unit_role(&self) -> UnitRole {
        match self {
            ResponderKind::FireBrigade => UnitRole::FireEngine,
            ResponderKind::Hospital => UnitRole::Ambulance,
        }
    }

    /// Allocation weight of an incident; unknown severity weighs 1.
    pub fn weight(&self, severity: Option<&Severity>) -> u32 {
        match (self, severity) {
            (_, None) => 1,
            (ResponderKind::FireBrigade, Some(s)) => s.intensity,
            (ResponderKind::Hospital, Some(s)) => s.casualties,
        }
    }
}

impl fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an agent needs from process setup.
///
/// Cloned into each agent task; the router, directory and monitor are
/// shared handles, never shared agent state.
#[derive(Clone)]
pub struct AgentContext {
    pub id: AgentId,
    pub router: MessageRouter,
    pub directory: Directory,
    pub schemas: Arc<SchemaRegistry>,
    pub monitor: Arc<SimulationMonitor>,
}

impl AgentContext {
    pub fn new(
        id: AgentId,
        router: MessageRouter,
        directory: Directory,
        schemas: Arc<SchemaRegistry>,
        monitor: Arc<SimulationMonitor>,
    ) -> Self {
        Self {
            id,
            router,
            directory,
            schemas,
            monitor,
        }
    }

    pub fn envelope<P: Serialize>(
        &self,
        recipient: &AgentId,
        kind: MessageKind,
        payload: &P,
    ) -> Envelope {
        Envelope::new(&self.id, recipient, kind, payload)
    }

    pub fn send(&self, envelope: Envelope) -> bool {
        self.router.send(envelope)
    }

    pub fn send_all(&self, envelopes: impl IntoIterator<Item = Envelope>) {
        for envelope in envelopes {
            self.send(envelope);
        }
    }

    /// Answer `to`, keeping its correlation.
    pub fn reply<P: Serialize>(&self, to: &Envelope, kind: MessageKind, payload: &P) -> bool {
        self.send(to.reply(kind, payload))
    }

    /// Structural check of an incoming envelope.
    ///
    /// Answers the sender with `not-understood` and returns false when the
    /// envelope does not match its schema.
    pub fn admit(&self, envelope: &Envelope) -> bool {
        match self.schemas.validate(envelope) {
            Ok(()) => true,
            Err(e) => {
                self.not_understood(envelope, &e);
                false
            }
        }
    }

    /// Decode a payload, answering `not-understood` on failure.
    pub fn decode<T: DeserializeOwned>(&self, envelope: &Envelope) -> Option<T> {
        match envelope.decode() {
            Ok(payload) => Some(payload),
            Err(e) => {
                self.not_understood(envelope, &e);
                None
            }
        }
    }

    pub fn not_understood(&self, envelope: &Envelope, error: &MessageError) {
        warn!(
            agent = %self.id,
            sender = %envelope.sender,
            kind = %envelope.kind,
            error = %error,
            "Message not understood"
        );

        // Never answer a not-understood with another one
        if envelope.kind == MessageKind::NotUnderstood {
            return;
        }

        let reason = ReasonPayload::new(error.to_string());
        if !self.reply(envelope, MessageKind::NotUnderstood, &reason) {
            debug!(agent = %self.id, sender = %envelope.sender, "Sender gone, not-understood dropped");
        }
    }
}
