use crate::agent::AgentId;
use crate::grid::Coordinate;
use crate::message::MessageKind;
use serde::Serialize;

/// Noteworthy protocol step, broadcast to observers
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SimulationEvent {
    FireIgnited {
        coordinate: Coordinate,
        intensity: u32,
        casualties: u32,
    },
    NegotiationOpened {
        broker: AgentId,
        coordinate: Coordinate,
        invited: usize,
    },
    NegotiationCommitted {
        broker: AgentId,
        coordinate: Coordinate,
        winner: AgentId,
        proposals: usize,
        forced: bool,
    },
    IncidentUnhandled {
        broker: AgentId,
        coordinate: Coordinate,
    },
    StaleMessageDropped {
        agent: AgentId,
        coordinate: Coordinate,
        kind: MessageKind,
    },
    UnitsAssigned {
        dispatcher: AgentId,
        assignments: Vec<(AgentId, Coordinate)>,
    },
    UnitsRecalled {
        dispatcher: AgentId,
        units: Vec<AgentId>,
    },
    TargetRefused {
        dispatcher: AgentId,
        unit: AgentId,
        coordinate: Coordinate,
    },
    IncidentResolved {
        coordinate: Coordinate,
    },
}
