// Mobile units: fire engines and ambulances owned by one dispatch agent

mod agent;
mod role;

pub use agent::UnitAgent;
pub use role::UnitRole;

use crate::agent::AgentId;
use crate::grid::Coordinate;
use crate::incident::Severity;
use crate::message::{CoordinatePayload, Envelope, MessageKind, UnitStatusPayload};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitState {
    Idle,
    MovingToTarget,
    AtTarget,
}

/// Status a unit reports to its owner on every change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub unit: AgentId,
    pub position: Coordinate,
    pub home: Coordinate,
    pub assigned_incident: Option<Coordinate>,
    pub state: UnitState,
    pub accepting_target: bool,
}

impl UnitStatus {
    /// Parked at its station, free for assignment.
    pub fn at_home(unit: AgentId, home: Coordinate) -> Self {
        Self {
            unit,
            position: home,
            home,
            assigned_incident: None,
            state: UnitState::Idle,
            accepting_target: true,
        }
    }
}

/// Assignment arrived while the unit's accepting gate was closed
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRejected {
    pub unit: AgentId,
    pub coordinate: Coordinate,
}

impl fmt::Display for TargetRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unit {} is not accepting targets, assignment to {} refused",
            self.unit, self.coordinate
        )
    }
}

impl std::error::Error for TargetRejected {}

/// State of one mobile unit.
///
/// Position changes only on [`MobileUnit::on_move_tick`]; assignment and
/// the accepting gate change on owner commands and the role's own logic.
/// Every input returns the envelopes to send, including a status report to
/// the owner whenever the reported status changed.
pub struct MobileUnit {
    status: UnitStatus,
    owner: AgentId,
    role: UnitRole,
    environment: Option<AgentId>,
    carrying_casualty: bool,
    /// Cleared once the environment reports nothing left for this role
    work_remaining: bool,
    /// A `Rescue` is out and the environment has not answered yet
    rescue_pending: bool,
    delivered: u32,
}

impl MobileUnit {
    pub fn new(id: AgentId, owner: AgentId, role: UnitRole, home: Coordinate) -> Self {
        Self {
            status: UnitStatus::at_home(id, home),
            owner,
            role,
            environment: None,
            carrying_casualty: false,
            work_remaining: false,
            rescue_pending: false,
            delivered: 0,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.status.unit
    }

    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    pub fn role(&self) -> UnitRole {
        self.role
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn is_carrying_casualty(&self) -> bool {
        self.carrying_casualty
    }

    pub fn is_rescue_pending(&self) -> bool {
        self.rescue_pending
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn set_environment(&mut self, environment: AgentId) {
        self.environment = Some(environment);
    }

    /// Where the next movement tick heads.
    pub fn destination(&self) -> Coordinate {
        if self.carrying_casualty {
            return self.status.home;
        }
        self.status.assigned_incident.unwrap_or(self.status.home)
    }

    /// Current status addressed to the owner.
    pub fn status_report(&self) -> Envelope {
        Envelope::new(
            self.id(),
            &self.owner,
            MessageKind::UnitStatus,
            &UnitStatusPayload {
                status: self.status.clone(),
            },
        )
    }

    pub fn on_target_assignment(
        &mut self,
        coordinate: Coordinate,
    ) -> Result<Vec<Envelope>, TargetRejected> {
        if !self.status.accepting_target {
            return Err(TargetRejected {
                unit: self.id().clone(),
                coordinate,
            });
        }

        let before = self.status.clone();
        if self.status.assigned_incident != Some(coordinate) {
            self.work_remaining = true;
            self.rescue_pending = false;
        }
        self.status.assigned_incident = Some(coordinate);
        self.settle_state();
        info!(unit = %self.id(), coordinate = %coordinate, "Target assigned");

        let mut out = Vec::new();
        if self.status.state == UnitState::AtTarget {
            let role = self.role;
            out.extend(role.arrived_at_fire(self));
        }
        out.extend(self.report_if_changed(&before));
        Ok(out)
    }

    /// Drop the assignment and head home; a carried casualty is still delivered.
    pub fn on_recall(&mut self) -> Vec<Envelope> {
        let before = self.status.clone();
        if let Some(released) = self.status.assigned_incident.take() {
            debug!(unit = %self.id(), coordinate = %released, "Recalled");
        }
        self.work_remaining = false;
        self.rescue_pending = false;
        self.settle_state();
        self.report_if_changed(&before).into_iter().collect()
    }

    /// Environment report for a coordinate; only the assigned incident matters.
    pub fn on_incident_status(&mut self, coordinate: Coordinate, severity: Severity) -> Vec<Envelope> {
        if self.status.assigned_incident != Some(coordinate) {
            return Vec::new();
        }
        let role = self.role;
        role.on_incident_status(self, severity)
    }

    pub fn on_casualty_picked_up(&mut self, coordinate: Coordinate) -> Vec<Envelope> {
        if self.role != UnitRole::Ambulance || self.carrying_casualty {
            debug!(unit = %self.id(), coordinate = %coordinate, "Unexpected casualty hand-over ignored");
            return Vec::new();
        }

        let before = self.status.clone();
        self.carrying_casualty = true;
        self.rescue_pending = false;
        self.status.accepting_target = false;
        self.status.state = UnitState::MovingToTarget;
        info!(unit = %self.id(), coordinate = %coordinate, "Casualty picked up, heading home");
        self.report_if_changed(&before).into_iter().collect()
    }

    /// One movement step toward the destination, arrival handling, or the
    /// role's periodic action while parked at the assigned incident.
    pub fn on_move_tick(&mut self) -> Vec<Envelope> {
        let before = self.status.clone();
        let role = self.role;
        let destination = self.destination();
        let mut out = Vec::new();

        if self.status.position != destination {
            self.status.position = self.status.position.step_toward(&destination);
            if self.status.position == destination {
                out.extend(self.arrive(destination));
            }
        } else if self.carrying_casualty {
            out.extend(role.arrived_at_home(self));
            self.settle_state();
        } else if self.status.state == UnitState::AtTarget {
            out.extend(role.on_periodic_action(self));
        }

        out.extend(self.report_if_changed(&before));
        out
    }

    fn arrive(&mut self, destination: Coordinate) -> Vec<Envelope> {
        let role = self.role;
        if !self.carrying_casualty && self.status.assigned_incident == Some(destination) {
            self.status.state = UnitState::AtTarget;
            return role.arrived_at_fire(self);
        }
        let out = role.arrived_at_home(self);
        self.settle_state();
        out
    }

    /// Derive the movement state from position, assignment and load.
    fn settle_state(&mut self) {
        self.status.state = match self.status.assigned_incident {
            _ if self.carrying_casualty => UnitState::MovingToTarget,
            Some(target) if target == self.status.position => UnitState::AtTarget,
            Some(_) => UnitState::MovingToTarget,
            None => UnitState::Idle,
        };
    }

    fn report_if_changed(&self, before: &UnitStatus) -> Option<Envelope> {
        if &self.status == before {
            None
        } else {
            Some(self.status_report())
        }
    }

    /// Message to the environment about the assigned incident.
    fn to_environment(&self, kind: MessageKind) -> Option<Envelope> {
        let environment = self.environment.as_ref()?;
        let coordinate = self.status.assigned_incident?;
        Some(
            Envelope::new(
                self.id(),
                environment,
                kind,
                &CoordinatePayload { coordinate },
            )
            .with_correlation(coordinate),
        )
    }
}
