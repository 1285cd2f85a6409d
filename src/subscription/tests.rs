use super::*;
use crate::agent::AgentId;
use crate::message::{Envelope, FeedPayload, MessageKind, ReasonPayload};
use std::sync::Arc;
use std::thread;

fn request(kind: MessageKind, from: &str, feed: &str) -> Envelope {
    Envelope::new(
        &AgentId::from(from),
        &AgentId::from("broker"),
        kind,
        &FeedPayload {
            feed: feed.to_string(),
        },
    )
}

#[test]
fn test_register_is_idempotent() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    let station = AgentId::from("station-1");

    assert_eq!(
        (registry.register(&station), registry.register(&station)),
        (true, false)
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_deregister_then_register() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    let station = AgentId::from("station-1");
    registry.register(&station);

    assert_eq!(
        (registry.deregister(&station), registry.register(&station)),
        (true, true)
    );
    assert!(!registry.deregister(&AgentId::from("stranger")));
}

#[test]
fn test_snapshot_in_subscription_order() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    for id in ["zulu", "alpha", "mike"] {
        registry.register(&AgentId::from(id));
    }

    assert_eq!(
        registry.snapshot(),
        vec![
            AgentId::from("zulu"),
            AgentId::from("alpha"),
            AgentId::from("mike")
        ]
    );
}

#[test]
fn test_snapshot_is_detached_copy() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    registry.register(&AgentId::from("a"));
    let snapshot = registry.snapshot();

    registry.register(&AgentId::from("b"));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(registry.snapshot().len(), 2);
}

#[test]
fn test_handle_request_agree_then_refuse() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    let req = request(MessageKind::Subscribe, "station-1", "incident-alerts");

    let first = registry.handle_request(&req, "incident-alerts");
    assert_eq!(first.kind, MessageKind::Agree);
    assert_eq!(first.recipient, AgentId::from("station-1"));

    let second = registry.handle_request(&req, "incident-alerts");
    assert_eq!(second.kind, MessageKind::Refuse);
    let reason: ReasonPayload = second.decode().unwrap();
    assert_eq!(reason.reason, "already subscribed");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_handle_unsubscribe() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    registry.register(&AgentId::from("station-1"));

    let req = request(MessageKind::Unsubscribe, "station-1", "incident-alerts");
    assert_eq!(
        registry.handle_request(&req, "incident-alerts").kind,
        MessageKind::Agree
    );
    assert_eq!(
        registry.handle_request(&req, "incident-alerts").kind,
        MessageKind::Refuse
    );
    assert!(registry.is_empty());
}

#[test]
fn test_handle_request_unknown_feed() {
    let registry = SubscriptionRegistry::new("incident-alerts");
    let req = request(MessageKind::Subscribe, "station-1", "weather");

    assert_eq!(
        registry.handle_request(&req, "weather").kind,
        MessageKind::Refuse
    );
    assert!(registry.is_empty());
}

#[test]
fn test_concurrent_register_and_snapshot() {
    let registry = Arc::new(SubscriptionRegistry::new("incident-alerts"));
    let mut handles = vec![];

    for i in 0..10 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            let id = AgentId::new(format!("station-{}", i));
            assert!(registry.register(&id));
            registry.snapshot().len()
        }));
    }

    for handle in handles {
        let seen = handle.join().unwrap();
        assert!(seen >= 1 && seen <= 10);
    }
    assert_eq!(registry.len(), 10);
}
