use crate::agent::AgentId;
use crate::message::{Envelope, FeedPayload, MessageKind, ReasonPayload};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One party subscribed to a named feed
#[derive(Clone, Debug, Serialize)]
pub struct Subscription {
    pub subscriber: AgentId,
    pub feed: String,
    pub subscribed_at: DateTime<Utc>,
    #[serde(skip)]
    sequence: u64,
}

/// Subscribers of a single named feed.
///
/// Safe to read while registrations are coming in; every snapshot is a
/// point-in-time copy in subscription order.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    feed: String,
    subscriptions: Arc<DashMap<AgentId, Subscription>>,
    next_sequence: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new(feed: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            subscriptions: Arc::new(DashMap::new()),
            next_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// Returns true if `subscriber` was newly added.
    pub fn register(&self, subscriber: &AgentId) -> bool {
        match self.subscriptions.entry(subscriber.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Subscription {
                    subscriber: subscriber.clone(),
                    feed: self.feed.clone(),
                    subscribed_at: Utc::now(),
                    sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                });
                true
            }
        }
    }

    /// Returns true if `subscriber` was present.
    pub fn deregister(&self, subscriber: &AgentId) -> bool {
        self.subscriptions.remove(subscriber).is_some()
    }

    pub fn contains(&self, subscriber: &AgentId) -> bool {
        self.subscriptions.contains_key(subscriber)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Current subscribers, oldest subscription first.
    pub fn snapshot(&self) -> Vec<AgentId> {
        let mut entries: Vec<(u64, AgentId)> = self
            .subscriptions
            .iter()
            .map(|s| (s.sequence, s.subscriber.clone()))
            .collect();
        entries.sort_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut entries: Vec<Subscription> =
            self.subscriptions.iter().map(|s| s.value().clone()).collect();
        entries.sort_by_key(|s| s.sequence);
        entries
    }

    /// Answer a subscribe or unsubscribe request for this feed.
    ///
    /// Produces `agree` when the registry changed and `refuse` otherwise
    /// (already subscribed, not subscribed, or a different feed). A repeated
    /// request is harmless.
    pub fn handle_request(&self, request: &Envelope, feed: &str) -> Envelope {
        if feed != self.feed {
            return request.reply(
                MessageKind::Refuse,
                &ReasonPayload::for_feed(format!("unknown feed '{}'", feed), feed),
            );
        }

        let subscribing = request.kind == MessageKind::Subscribe;
        let changed = if subscribing {
            self.register(&request.sender)
        } else {
            self.deregister(&request.sender)
        };

        if changed {
            info!(
                feed = %self.feed,
                subscriber = %request.sender,
                subscribed = subscribing,
                subscribers = self.len(),
                "Subscription updated"
            );
            request.reply(
                MessageKind::Agree,
                &FeedPayload {
                    feed: self.feed.clone(),
                },
            )
        } else {
            let reason = if subscribing {
                "already subscribed"
            } else {
                "not subscribed"
            };
            debug!(feed = %self.feed, subscriber = %request.sender, reason = reason, "Subscription request refused");
            request.reply(
                MessageKind::Refuse,
                &ReasonPayload::for_feed(reason, &self.feed),
            )
        }
    }
}
