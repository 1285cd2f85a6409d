// Message envelopes exchanged between agents

use crate::agent::AgentId;
use crate::grid::Coordinate;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

mod payload;
mod schema;
#[cfg(test)]
mod tests;

pub use payload::{
    AlertPayload, CoordinatePayload, FeedPayload, IgnitePayload, ProposalPayload, ReasonPayload,
    RecallPayload, SeverityPayload, UnitStatusPayload,
};
pub use schema::{MessageError, MessageSchema, SchemaRegistry};

/// Performative carried by an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Alert,
    Subscribe,
    Unsubscribe,
    Agree,
    Refuse,
    CallForProposal,
    Propose,
    AcceptProposal,
    RejectProposal,
    UnitStatus,
    IncidentSeverity,
    TargetAssignment,
    Recall,
    Extinguish,
    Rescue,
    CasualtyPickedUp,
    Ignite,
    NotUnderstood,
}

impl MessageKind {
    pub const ALL: [MessageKind; 18] = [
        MessageKind::Alert,
        MessageKind::Subscribe,
        MessageKind::Unsubscribe,
        MessageKind::Agree,
        MessageKind::Refuse,
        MessageKind::CallForProposal,
        MessageKind::Propose,
        MessageKind::AcceptProposal,
        MessageKind::RejectProposal,
        MessageKind::UnitStatus,
        MessageKind::IncidentSeverity,
        MessageKind::TargetAssignment,
        MessageKind::Recall,
        MessageKind::Extinguish,
        MessageKind::Rescue,
        MessageKind::CasualtyPickedUp,
        MessageKind::Ignite,
        MessageKind::NotUnderstood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Alert => "alert",
            MessageKind::Subscribe => "subscribe",
            MessageKind::Unsubscribe => "unsubscribe",
            MessageKind::Agree => "agree",
            MessageKind::Refuse => "refuse",
            MessageKind::CallForProposal => "call-for-proposal",
            MessageKind::Propose => "propose",
            MessageKind::AcceptProposal => "accept-proposal",
            MessageKind::RejectProposal => "reject-proposal",
            MessageKind::UnitStatus => "unit-status",
            MessageKind::IncidentSeverity => "incident-severity",
            MessageKind::TargetAssignment => "target-assignment",
            MessageKind::Recall => "recall",
            MessageKind::Extinguish => "extinguish",
            MessageKind::Rescue => "rescue",
            MessageKind::CasualtyPickedUp => "casualty-picked-up",
            MessageKind::Ignite => "ignite",
            MessageKind::NotUnderstood => "not-understood",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressed message with an opaque JSON payload.
///
/// The payload is decoded on the receiving side against the kind's schema,
/// so a sender can never crash a receiver with bad content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// UUIDv7 identifier (time-ordered)
    pub id: Uuid,

    pub sender: AgentId,

    pub recipient: AgentId,

    pub kind: MessageKind,

    /// Incident coordinate this message belongs to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Coordinate>,

    /// Kind-specific content, always a JSON object
    pub payload: Value,

    pub sent_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new<P: Serialize>(
        sender: &AgentId,
        recipient: &AgentId,
        kind: MessageKind,
        payload: &P,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: sender.clone(),
            recipient: recipient.clone(),
            kind,
            correlation: None,
            payload: serde_json::to_value(payload)
                .unwrap_or_else(|_| Value::Object(Default::default())),
            sent_at: Utc::now(),
        }
    }

    pub fn with_correlation(mut self, coordinate: Coordinate) -> Self {
        self.correlation = Some(coordinate);
        self
    }

    /// Build a response addressed back to the sender, keeping the correlation key.
    pub fn reply<P: Serialize>(&self, kind: MessageKind, payload: &P) -> Envelope {
        let mut reply = Envelope::new(&self.recipient, &self.sender, kind, payload);
        reply.correlation = self.correlation;
        reply
    }

    /// Decode the payload into its typed form.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| MessageError::Malformed(e.to_string()))
    }
}
