// End-to-end runs of the whole agent society

use firecoord::agent::{AgentId, ResponderKind};
use firecoord::config::{FirecoordConfig, StationConfig};
use firecoord::grid::Coordinate;
use firecoord::message::{Envelope, IgnitePayload, MessageKind};
use firecoord::monitor::{AgentSnapshot, SimulationEvent, SimulationMonitor};
use firecoord::simulation::{broker_id, Simulation};
use std::time::Duration;
use tokio::sync::broadcast;

fn test_config() -> FirecoordConfig {
    let mut config = FirecoordConfig::default();
    config.simulation.grid_rows = 20;
    config.simulation.grid_cols = 20;
    config.simulation.tick_interval_ms = 5;
    config.simulation.seed = Some(1);
    config.world.fire_spawn_probability = 0.0;
    config.directory.lookup_backoff_ms = 5;
    config.directory.lookup_attempts = 200;
    config.stations = vec![
        StationConfig::new("north", ResponderKind::FireBrigade, 0, 0, 3),
        StationConfig::new("south", ResponderKind::FireBrigade, 19, 19, 2),
        StationConfig::new("clinic", ResponderKind::Hospital, 5, 5, 2),
    ];
    config
}

fn ignite(simulation: &Simulation, coordinate: Coordinate, intensity: u32, casualties: u32) {
    let envelope = Envelope::new(
        &AgentId::from("test"),
        &simulation.world_id(),
        MessageKind::Ignite,
        &IgnitePayload {
            coordinate,
            intensity,
            casualties,
        },
    );
    assert!(simulation.router().send(envelope));
}

/// Poll until every broker has `expected` subscribers.
async fn wait_for_subscribers(monitor: &SimulationMonitor, kind: ResponderKind, expected: usize) {
    let id = broker_id(kind);
    let ready = async {
        loop {
            if let Some(entry) = monitor.get(&id) {
                if let AgentSnapshot::Broker(snapshot) = entry.snapshot {
                    if snapshot.subscribers.len() == expected {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), ready)
        .await
        .expect("stations never subscribed");
}

async fn wait_for_event<F>(rx: &mut broadcast::Receiver<SimulationEvent>, mut matches: F) -> SimulationEvent
where
    F: FnMut(&SimulationEvent) -> bool,
{
    let found = async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), found)
        .await
        .expect("event never observed")
}

#[tokio::test]
async fn test_fire_negotiated_dispatched_and_resolved() {
    let simulation = Simulation::start(&test_config());
    let monitor = simulation.monitor();
    let mut events = monitor.subscribe();
    wait_for_subscribers(&monitor, ResponderKind::FireBrigade, 2).await;
    wait_for_subscribers(&monitor, ResponderKind::Hospital, 1).await;

    let fire = Coordinate::new(2, 2);
    ignite(&simulation, fire, 3, 1);

    // North bids 3 available units against south's 2
    let committed = wait_for_event(&mut events, |e| {
        matches!(e, SimulationEvent::NegotiationCommitted { broker, .. } if *broker == broker_id(ResponderKind::FireBrigade))
    })
    .await;
    match committed {
        SimulationEvent::NegotiationCommitted {
            coordinate,
            winner,
            proposals,
            forced,
            ..
        } => {
            assert_eq!(coordinate, fire);
            assert_eq!(winner, AgentId::from("north"));
            assert_eq!(proposals, 2);
            assert!(!forced);
        }
        other => panic!("unexpected event {:?}", other),
    }

    wait_for_event(&mut events, |e| {
        matches!(e, SimulationEvent::IncidentResolved { coordinate } if *coordinate == fire)
    })
    .await;

    simulation.shutdown().await;
}

#[tokio::test]
async fn test_whole_pool_sent_to_single_fire() {
    let simulation = Simulation::start(&test_config());
    let monitor = simulation.monitor();
    let mut events = monitor.subscribe();
    wait_for_subscribers(&monitor, ResponderKind::FireBrigade, 2).await;

    ignite(&simulation, Coordinate::new(18, 17), 50, 0);

    let assigned = wait_for_event(&mut events, |e| {
        matches!(e, SimulationEvent::UnitsAssigned { dispatcher, .. } if *dispatcher == AgentId::from("north"))
    })
    .await;
    match assigned {
        SimulationEvent::UnitsAssigned { assignments, .. } => {
            assert_eq!(assignments.len(), 3);
            assert!(assignments.iter().all(|(_, c)| *c == Coordinate::new(18, 17)));
        }
        other => panic!("unexpected event {:?}", other),
    }

    simulation.shutdown().await;
}

#[tokio::test]
async fn test_fire_without_bidders_is_unhandled() {
    let mut config = test_config();
    config.stations = vec![StationConfig::new("clinic", ResponderKind::Hospital, 5, 5, 1)];
    let simulation = Simulation::start(&config);
    let monitor = simulation.monitor();
    let mut events = monitor.subscribe();
    wait_for_subscribers(&monitor, ResponderKind::Hospital, 1).await;

    ignite(&simulation, Coordinate::new(3, 3), 2, 0);

    wait_for_event(&mut events, |e| {
        matches!(e, SimulationEvent::IncidentUnhandled { broker, .. } if *broker == broker_id(ResponderKind::FireBrigade))
    })
    .await;

    simulation.shutdown().await;
}

#[tokio::test]
async fn test_every_agent_publishes_a_snapshot() {
    let config = test_config();
    let simulation = Simulation::start(&config);
    let monitor = simulation.monitor();
    // world + 2 brokers + 3 stations + 7 units
    assert_eq!(simulation.agent_count(), 13);

    let all_published = async {
        while monitor.all().len() < 13 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), all_published)
        .await
        .expect("not every agent published");

    let unit = monitor.get(&AgentId::from("north/unit-00")).unwrap();
    assert!(matches!(unit.snapshot, AgentSnapshot::Unit(_)));

    simulation.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_agents() {
    let simulation = Simulation::start(&test_config());
    let router = simulation.router();
    wait_for_subscribers(&simulation.monitor(), ResponderKind::FireBrigade, 2).await;

    simulation.shutdown().await;

    assert!(router.is_empty());
}
