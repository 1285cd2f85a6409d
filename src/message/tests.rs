use super::*;
use crate::agent::AgentId;
use crate::grid::Coordinate;
use serde_json::json;

fn envelope(kind: MessageKind, payload: serde_json::Value) -> Envelope {
    let mut env = Envelope::new(
        &AgentId::from("sender"),
        &AgentId::from("recipient"),
        kind,
        &json!({}),
    );
    env.payload = payload;
    env
}

#[test]
fn test_every_kind_is_registered() {
    let registry = SchemaRegistry::emergency_response();
    for kind in MessageKind::ALL {
        assert!(registry.understands(kind), "missing schema for {}", kind);
    }
}

#[test]
fn test_valid_proposal_passes() {
    let registry = SchemaRegistry::emergency_response();
    let env = envelope(
        MessageKind::Propose,
        json!({"coordinate": {"row": 1, "col": 2}, "distance": 3, "available_units": 4}),
    );
    assert!(registry.validate(&env).is_ok());

    let decoded: ProposalPayload = env.decode().unwrap();
    assert_eq!(decoded.coordinate, Coordinate::new(1, 2));
    assert_eq!(decoded.available_units, 4);
}

#[test]
fn test_missing_field_is_reported() {
    let registry = SchemaRegistry::emergency_response();
    let env = envelope(
        MessageKind::Propose,
        json!({"coordinate": {"row": 1, "col": 2}, "distance": 3}),
    );
    assert_eq!(
        registry.validate(&env),
        Err(MessageError::MissingField {
            kind: MessageKind::Propose,
            field: "available_units",
        })
    );
}

#[test]
fn test_null_field_counts_as_missing() {
    let registry = SchemaRegistry::emergency_response();
    let env = envelope(MessageKind::Alert, json!({"coordinate": null}));
    assert!(matches!(
        registry.validate(&env),
        Err(MessageError::MissingField { field: "coordinate", .. })
    ));
}

#[test]
fn test_payload_must_be_object() {
    let registry = SchemaRegistry::emergency_response();
    let env = envelope(MessageKind::Alert, json!([1, 2]));
    assert_eq!(
        registry.validate(&env),
        Err(MessageError::PayloadNotObject(MessageKind::Alert))
    );
}

#[test]
fn test_unregistered_kind_is_unknown() {
    let mut registry = SchemaRegistry::new();
    registry.register(MessageKind::Alert, &["coordinate"]);
    let env = envelope(MessageKind::Rescue, json!({"coordinate": {"row": 0, "col": 0}}));
    assert_eq!(
        registry.validate(&env),
        Err(MessageError::UnknownKind(MessageKind::Rescue))
    );
}

#[test]
fn test_decode_wrong_type_is_malformed() {
    let env = envelope(MessageKind::Alert, json!({"coordinate": "north"}));
    let result: Result<AlertPayload, MessageError> = env.decode();
    assert!(matches!(result, Err(MessageError::Malformed(_))));
}

#[test]
fn test_reply_swaps_addresses_and_keeps_correlation() {
    let c = Coordinate::new(4, 4);
    let request = Envelope::new(
        &AgentId::from("broker"),
        &AgentId::from("station"),
        MessageKind::CallForProposal,
        &CoordinatePayload { coordinate: c },
    )
    .with_correlation(c);

    let reply = request.reply(
        MessageKind::Propose,
        &ProposalPayload {
            coordinate: c,
            distance: 1,
            available_units: 2,
        },
    );
    assert_eq!(reply.sender, AgentId::from("station"));
    assert_eq!(reply.recipient, AgentId::from("broker"));
    assert_eq!(reply.correlation, Some(c));
    assert_ne!(reply.id, request.id);
}

#[test]
fn test_kind_serializes_kebab_case() {
    let value = serde_json::to_value(MessageKind::CallForProposal).unwrap();
    assert_eq!(value, json!("call-for-proposal"));
    assert_eq!(MessageKind::CasualtyPickedUp.to_string(), "casualty-picked-up");
}
