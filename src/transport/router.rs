use crate::agent::AgentId;
use crate::message::Envelope;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiving end of an agent's mailbox
pub type Mailbox = mpsc::UnboundedReceiver<Envelope>;

/// Point-to-point delivery between agents.
///
/// Each registered agent owns one mailbox. Sending is fire-and-forget: an
/// envelope for an unknown or stopped recipient is logged and dropped.
#[derive(Clone, Default)]
pub struct MessageRouter {
    mailboxes: Arc<DashMap<AgentId, mpsc::UnboundedSender<Envelope>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            mailboxes: Arc::new(DashMap::new()),
        }
    }

    /// Create the mailbox for `id`, replacing any previous one.
    pub fn register(&self, id: &AgentId) -> Mailbox {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.mailboxes.insert(id.clone(), tx).is_some() {
            warn!(agent = %id, "Mailbox replaced, previous receiver orphaned");
        }
        rx
    }

    pub fn deregister(&self, id: &AgentId) -> bool {
        self.mailboxes.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &AgentId) -> bool {
        self.mailboxes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }

    /// Deliver an envelope. Returns false if it was dropped.
    pub fn send(&self, envelope: Envelope) -> bool {
        let recipient = envelope.recipient.clone();
        let kind = envelope.kind;

        let Some(tx) = self.mailboxes.get(&recipient) else {
            debug!(recipient = %recipient, kind = %kind, "Unknown recipient, message dropped");
            return false;
        };

        if tx.send(envelope).is_err() {
            debug!(recipient = %recipient, kind = %kind, "Recipient stopped, message dropped");
            return false;
        }

        true
    }
}
