use super::*;

fn world() -> World {
    World::new(
        AgentId::from("world"),
        GridBounds::new(10, 10),
        WorldConfig::default(),
        Some(42),
    )
}

fn brokers() -> Vec<(ResponderKind, AgentId)> {
    vec![
        (ResponderKind::FireBrigade, AgentId::from("fire-broker")),
        (ResponderKind::Hospital, AgentId::from("hospital-broker")),
    ]
}

fn of_kind(messages: &[Envelope], kind: MessageKind) -> Vec<&Envelope> {
    messages.iter().filter(|m| m.kind == kind).collect()
}

#[test]
fn test_ignite_alerts_every_broker_once() {
    let mut world = world();
    world.set_brokers(brokers());
    let c = Coordinate::new(2, 3);

    let out = world.ignite(c, Severity::new(4, 1)).unwrap();

    let alerts = of_kind(&out, MessageKind::Alert);
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|m| m.correlation == Some(c)));
    assert_eq!(world.severity(&c), Some(Severity::new(4, 1)));
    assert_eq!(
        world.ignite(c, Severity::new(1, 0)).unwrap_err(),
        IgniteError::AlreadyBurning(c)
    );
}

#[test]
fn test_alert_only_categories_with_work() {
    let mut world = world();
    world.set_brokers(brokers());

    let out = world.ignite(Coordinate::new(1, 1), Severity::new(3, 0)).unwrap();
    let alerts = of_kind(&out, MessageKind::Alert);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].recipient, AgentId::from("fire-broker"));

    let out = world.ignite(Coordinate::new(2, 2), Severity::new(0, 2)).unwrap();
    let alerts = of_kind(&out, MessageKind::Alert);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].recipient, AgentId::from("hospital-broker"));

    // Nothing held back: both fires reached a broker
    assert!(world.set_brokers(brokers()).is_empty());
}

#[test]
fn test_alert_held_until_interested_broker_known() {
    let mut world = world();
    world.set_brokers(vec![(ResponderKind::FireBrigade, AgentId::from("fire-broker"))]);
    let c = Coordinate::new(4, 4);

    let out = world.ignite(c, Severity::new(0, 1)).unwrap();
    assert!(of_kind(&out, MessageKind::Alert).is_empty());

    let out = world.set_brokers(brokers());
    let alerts = of_kind(&out, MessageKind::Alert);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].recipient, AgentId::from("hospital-broker"));
}

#[test]
fn test_ignite_rejects_bad_requests() {
    let mut world = world();
    assert!(matches!(
        world.ignite(Coordinate::new(10, 0), Severity::new(1, 0)),
        Err(IgniteError::OutOfBounds { .. })
    ));
    assert!(matches!(
        world.ignite(Coordinate::new(-1, 0), Severity::new(1, 0)),
        Err(IgniteError::OutOfBounds { .. })
    ));
    assert_eq!(
        world.ignite(Coordinate::new(1, 1), Severity::new(0, 0)).unwrap_err(),
        IgniteError::NothingToBurn(Coordinate::new(1, 1))
    );
    assert_eq!(world.active_fires(), 0);
}

#[test]
fn test_alert_held_until_brokers_known() {
    let mut world = world();
    let c = Coordinate::new(5, 5);

    let out = world.ignite(c, Severity::new(2, 1)).unwrap();
    assert!(of_kind(&out, MessageKind::Alert).is_empty());

    let out = world.set_brokers(brokers());
    assert_eq!(of_kind(&out, MessageKind::Alert).len(), 2);
    // Only once
    assert!(world.set_brokers(brokers()).is_empty());
}

#[test]
fn test_extinguish_publishes_to_subscribers() {
    let mut world = world();
    world.status_feed().register(&AgentId::from("north"));
    let c = Coordinate::new(1, 1);
    world.ignite(c, Severity::new(2, 0)).unwrap();

    let out = world.on_extinguish(&AgentId::from("north/unit-00"), c);

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].recipient, AgentId::from("north"));
    let report: SeverityPayload = out[0].decode().unwrap();
    assert_eq!(report.severity(), Severity::new(1, 0));
}

#[test]
fn test_fire_resolved_when_both_attributes_zero() {
    let mut world = world();
    world.status_feed().register(&AgentId::from("north"));
    let c = Coordinate::new(1, 1);
    world.ignite(c, Severity::new(1, 1)).unwrap();
    world.drain_events();

    world.on_extinguish(&AgentId::from("engine"), c);
    assert!(world.severity(&c).is_some());

    let out = world.on_rescue(&AgentId::from("ambulance"), c);
    assert_eq!(
        out.iter().map(|m| m.kind).collect::<Vec<_>>(),
        vec![MessageKind::CasualtyPickedUp, MessageKind::IncidentSeverity]
    );
    assert_eq!(out[0].recipient, AgentId::from("ambulance"));
    assert!(out[1].decode::<SeverityPayload>().unwrap().severity().is_resolved());
    assert!(world.severity(&c).is_none());
    assert_eq!(
        world.drain_events(),
        vec![SimulationEvent::IncidentResolved { coordinate: c }]
    );

    // The cell can burn again
    assert!(world.ignite(c, Severity::new(1, 0)).is_ok());
}

#[test]
fn test_idle_work_answered_with_status() {
    let mut world = world();
    let c = Coordinate::new(4, 4);
    world.ignite(c, Severity::new(0, 2)).unwrap();

    let out = world.on_extinguish(&AgentId::from("engine"), c);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, MessageKind::IncidentSeverity);
    assert_eq!(out[0].recipient, AgentId::from("engine"));

    let out = world.on_rescue(&AgentId::from("ambulance"), Coordinate::new(9, 9));
    let report: SeverityPayload = out[0].decode().unwrap();
    assert!(report.severity().is_resolved());
}

#[test]
fn test_spawner_respects_limits() {
    let settings = WorldConfig {
        fire_spawn_probability: 1.0,
        max_active_fires: 3,
        max_intensity: 5,
        max_casualties: 2,
    };
    let mut world = World::new(AgentId::from("world"), GridBounds::new(4, 4), settings, Some(7));

    for _ in 0..20 {
        world.on_tick();
    }

    let snapshot = world.snapshot();
    assert_eq!(snapshot.fires.len(), 3);
    assert_eq!(snapshot.tick, 20);
    for fire in &snapshot.fires {
        assert!((1..=5).contains(&fire.severity.intensity));
        assert!(fire.severity.casualties <= 2);
        assert!(GridBounds::new(4, 4).contains(&fire.coordinate));
    }
}

#[test]
fn test_spawner_disabled_at_zero_probability() {
    let settings = WorldConfig {
        fire_spawn_probability: 0.0,
        ..WorldConfig::default()
    };
    let mut world = World::new(AgentId::from("world"), GridBounds::new(4, 4), settings, None);
    for _ in 0..100 {
        assert!(world.on_tick().is_empty());
    }
    assert_eq!(world.active_fires(), 0);
}

#[test]
fn test_same_seed_same_fires() {
    let settings = WorldConfig {
        fire_spawn_probability: 0.5,
        ..WorldConfig::default()
    };
    let run = || {
        let mut world = World::new(
            AgentId::from("world"),
            GridBounds::new(10, 10),
            settings.clone(),
            Some(1234),
        );
        for _ in 0..30 {
            world.on_tick();
        }
        world.snapshot().fires
    };
    assert_eq!(run(), run());
}
