use super::{Envelope, MessageKind};
use std::collections::HashMap;
use std::fmt;

/// Reasons an envelope is not understood by its receiver
#[derive(Debug, Clone, PartialEq)]
pub enum MessageError {
    UnknownKind(MessageKind),
    PayloadNotObject(MessageKind),
    MissingField {
        kind: MessageKind,
        field: &'static str,
    },
    Malformed(String),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::UnknownKind(kind) => write!(f, "no schema registered for '{}'", kind),
            MessageError::PayloadNotObject(kind) => {
                write!(f, "payload of '{}' must be a JSON object", kind)
            }
            MessageError::MissingField { kind, field } => {
                write!(f, "'{}' payload is missing required field '{}'", kind, field)
            }
            MessageError::Malformed(reason) => write!(f, "malformed payload: {}", reason),
        }
    }
}

impl std::error::Error for MessageError {}

/// Required payload fields for one message kind
#[derive(Debug, Clone)]
pub struct MessageSchema {
    pub kind: MessageKind,
    pub required: Vec<&'static str>,
}

/// Message-schema registry shared by every agent of one process.
///
/// Built once during setup and handed to agents through their context.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<MessageKind, MessageSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registry covering every kind the emergency-response agents exchange.
    pub fn emergency_response() -> Self {
        let mut registry = Self::new();
        for kind in MessageKind::ALL {
            let required: &[&'static str] = match kind {
                MessageKind::Alert
                | MessageKind::CallForProposal
                | MessageKind::AcceptProposal
                | MessageKind::RejectProposal
                | MessageKind::TargetAssignment
                | MessageKind::Extinguish
                | MessageKind::Rescue
                | MessageKind::CasualtyPickedUp => &["coordinate"],
                MessageKind::Subscribe | MessageKind::Unsubscribe | MessageKind::Agree => {
                    &["feed"]
                }
                MessageKind::Refuse | MessageKind::NotUnderstood => &["reason"],
                MessageKind::Propose => &["coordinate", "distance", "available_units"],
                MessageKind::UnitStatus => &["status"],
                MessageKind::IncidentSeverity | MessageKind::Ignite => {
                    &["coordinate", "intensity", "casualties"]
                }
                MessageKind::Recall => &[],
            };
            registry.register(kind, required);
        }
        registry
    }

    pub fn register(&mut self, kind: MessageKind, required: &[&'static str]) {
        self.schemas.insert(
            kind,
            MessageSchema {
                kind,
                required: required.to_vec(),
            },
        );
    }

    pub fn understands(&self, kind: MessageKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    pub fn schema(&self, kind: MessageKind) -> Option<&MessageSchema> {
        self.schemas.get(&kind)
    }

    /// Structural check of an envelope before its payload is decoded.
    ///
    /// Rules:
    /// - the kind must be registered
    /// - the payload must be a JSON object
    /// - every required field must be present and non-null
    pub fn validate(&self, envelope: &Envelope) -> Result<(), MessageError> {
        let schema = self
            .schemas
            .get(&envelope.kind)
            .ok_or(MessageError::UnknownKind(envelope.kind))?;

        let object = envelope
            .payload
            .as_object()
            .ok_or(MessageError::PayloadNotObject(envelope.kind))?;

        for field in schema.required.iter().copied() {
            match object.get(field) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(MessageError::MissingField {
                        kind: envelope.kind,
                        field,
                    })
                }
            }
        }

        Ok(())
    }
}
