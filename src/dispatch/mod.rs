// Dispatch agent: bids for incidents and spreads its units across them

mod agent;
pub mod allocation;

pub use agent::DispatchAgent;
pub use allocation::{compute_targets, plan_assignments, AllocationPlan, AllocationTarget};

use crate::agent::{AgentId, ResponderKind};
use crate::grid::Coordinate;
use crate::incident::Severity;
use crate::message::{CoordinatePayload, Envelope, MessageKind, ProposalPayload, RecallPayload};
use crate::monitor::SimulationEvent;
use crate::unit::UnitStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};


#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub proposals: u64,
    pub won: u64,
    pub lost: u64,
    pub assignments_issued: u64,
    pub recalls_issued: u64,
    pub refusals: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct OwnedIncidentView {
    pub coordinate: Coordinate,
    pub severity: Option<Severity>,
    pub weight: u32,
    pub target: u32,
    pub assigned: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DispatchSnapshot {
    pub kind: ResponderKind,
    pub base: Coordinate,
    pub pool_size: u32,
    pub available_units: u32,
    pub owned_incidents: Vec<OwnedIncidentView>,
    pub units: Vec<UnitStatus>,
    pub shortfall: bool,
    pub stats: DispatchStats,
}

/// Station state: the unit pool and the incidents won from the broker.
///
/// Unit statuses are the last reports received and may be stale. Commands
/// are reflected in the local view as soon as they are issued; the unit's
/// next matching report confirms them and a refusal reverts them.
pub struct DispatchCenter {
    id: AgentId,
    kind: ResponderKind,
    base: Coordinate,
    /// Last reported status per unit, in pool order
    units: BTreeMap<AgentId, UnitStatus>,
    /// Assignment sent to a unit and not yet confirmed by its reports
    in_flight: BTreeMap<AgentId, Option<Coordinate>>,
    /// Owned incidents; `None` until the environment reported severity
    owned: BTreeMap<Coordinate, Option<Severity>>,
    /// Severity of every burning cell the environment reported
    observed: BTreeMap<Coordinate, Severity>,
    allocation_target: AllocationTarget,
    /// Last pass left demand unfilled
    shortfall: bool,
    stats: DispatchStats,
    events: Vec<SimulationEvent>,
}

impl DispatchCenter {
    pub fn new(id: AgentId, kind: ResponderKind, base: Coordinate, units: Vec<UnitStatus>) -> Self {
        Self {
            id,
            kind,
            base,
            units: units.into_iter().map(|u| (u.unit.clone(), u)).collect(),
            in_flight: BTreeMap::new(),
            owned: BTreeMap::new(),
            observed: BTreeMap::new(),
            allocation_target: AllocationTarget::new(),
            shortfall: false,
            stats: DispatchStats::default(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn kind(&self) -> ResponderKind {
        self.kind
    }

    pub fn base(&self) -> Coordinate {
        self.base
    }

    pub fn pool_size(&self) -> u32 {
        self.units.len() as u32
    }

    /// Each owned incident reserves one unit.
    pub fn available_units(&self) -> u32 {
        self.pool_size().saturating_sub(self.owned.len() as u32)
    }

    pub fn owns(&self, coordinate: &Coordinate) -> bool {
        self.owned.contains_key(coordinate)
    }

    pub fn allocation_target(&self) -> &AllocationTarget {
        &self.allocation_target
    }

    pub fn has_shortfall(&self) -> bool {
        self.shortfall
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn drain_events(&mut self) -> Vec<SimulationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Local view of a unit, including unconfirmed commands.
    pub fn unit(&self, id: &AgentId) -> Option<UnitStatus> {
        let mut status = self.units.get(id)?.clone();
        if let Some(expected) = self.in_flight.get(id) {
            status.assigned_incident = *expected;
        }
        Some(status)
    }

    fn unit_view(&self) -> BTreeMap<AgentId, UnitStatus> {
        self.units
            .keys()
            .filter_map(|id| self.unit(id).map(|status| (id.clone(), status)))
            .collect()
    }

    fn weights(&self) -> BTreeMap<Coordinate, u32> {
        self.owned
            .iter()
            .map(|(c, severity)| (*c, self.kind.weight(severity.as_ref())))
            .collect()
    }

    /// One bid per call, never withheld.
    pub fn on_call_for_proposal(&mut self, broker: &AgentId, coordinate: Coordinate) -> Envelope {
        self.stats.proposals += 1;
        let bid = ProposalPayload {
            coordinate,
            distance: self.base.distance(&coordinate),
            available_units: self.available_units(),
        };
        debug!(
            dispatcher = %self.id,
            coordinate = %coordinate,
            distance = bid.distance,
            available = bid.available_units,
            "Proposing"
        );
        Envelope::new(&self.id, broker, MessageKind::Propose, &bid).with_correlation(coordinate)
    }

    /// Won the incident: take ownership and redistribute.
    pub fn on_accept(&mut self, coordinate: Coordinate) -> Vec<Envelope> {
        if self.owned.contains_key(&coordinate) {
            debug!(dispatcher = %self.id, coordinate = %coordinate, "Already own incident");
            return Vec::new();
        }
        self.stats.won += 1;
        let severity = self.observed.get(&coordinate).copied();
        self.owned.insert(coordinate, severity);
        info!(dispatcher = %self.id, coordinate = %coordinate, owned = self.owned.len(), "Incident won");
        self.reallocate()
    }

    pub fn on_reject(&mut self, coordinate: Coordinate) {
        self.stats.lost += 1;
        debug!(dispatcher = %self.id, coordinate = %coordinate, "Proposal rejected");
    }

    pub fn on_unit_status(&mut self, status: UnitStatus) -> Vec<Envelope> {
        let id = status.unit.clone();
        let Some(previous) = self.units.get(&id) else {
            warn!(dispatcher = %self.id, unit = %id, "Status from unknown unit ignored");
            return Vec::new();
        };
        let reopened = !previous.accepting_target && status.accepting_target;

        if self.in_flight.get(&id) == Some(&status.assigned_incident) {
            self.in_flight.remove(&id);
        }
        self.units.insert(id.clone(), status);

        let mut out = Vec::new();
        if let Some(current) = self.unit(&id) {
            let stray = current
                .assigned_incident
                .filter(|c| current.accepting_target && !self.owned.contains_key(c));
            if let Some(released) = stray {
                out.push(self.recall(&id, released));
                self.events.push(SimulationEvent::UnitsRecalled {
                    dispatcher: self.id.clone(),
                    units: vec![id.clone()],
                });
            }
        }

        if reopened && self.shortfall {
            debug!(dispatcher = %self.id, unit = %id, "Unit reopened, filling shortfall");
            out.extend(self.reallocate());
        }
        out
    }

    /// Severity report from the environment's status feed.
    pub fn on_severity(&mut self, coordinate: Coordinate, severity: Severity) -> Vec<Envelope> {
        if severity.is_resolved() {
            self.observed.remove(&coordinate);
            if self.owned.remove(&coordinate).is_none() {
                return Vec::new();
            }
            info!(dispatcher = %self.id, coordinate = %coordinate, "Owned incident resolved");
            return self.reallocate();
        }

        self.observed.insert(coordinate, severity);
        match self.owned.get_mut(&coordinate) {
            Some(known) if *known == Some(severity) => Vec::new(),
            Some(known) => {
                *known = Some(severity);
                self.reallocate()
            }
            None => Vec::new(),
        }
    }

    /// A unit refused its assignment; it is closed for targeting.
    pub fn on_target_refused(&mut self, unit: &AgentId, coordinate: Coordinate) -> Vec<Envelope> {
        let Some(status) = self.units.get_mut(unit) else {
            warn!(dispatcher = %self.id, unit = %unit, "Refusal from unknown unit ignored");
            return Vec::new();
        };
        status.accepting_target = false;
        self.in_flight.remove(unit);
        self.stats.refusals += 1;
        self.shortfall = true;

        info!(dispatcher = %self.id, unit = %unit, coordinate = %coordinate, "Target refused");
        self.events.push(SimulationEvent::TargetRefused {
            dispatcher: self.id.clone(),
            unit: unit.clone(),
            coordinate,
        });
        self.reallocate()
    }

    /// Run the allocation pass.
    ///
    /// Skipped when the targets did not change and the previous pass filled
    /// every incident.
    pub fn reallocate(&mut self) -> Vec<Envelope> {
        let weights = self.weights();
        let targets = compute_targets(&weights, self.pool_size());
        if targets == self.allocation_target && !self.shortfall {
            debug!(dispatcher = %self.id, "Allocation unchanged");
            return Vec::new();
        }

        let plan = plan_assignments(&targets, &weights, &self.unit_view());
        self.allocation_target = targets;
        self.shortfall = !plan.unmet.is_empty();
        if self.shortfall {
            warn!(
                dispatcher = %self.id,
                unmet = plan.unmet.values().sum::<u32>(),
                "Not enough units for every incident"
            );
        }
        if plan.is_noop() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(plan.assignments.len() + plan.recalls.len());
        for (unit, coordinate) in &plan.assignments {
            self.in_flight.insert(unit.clone(), Some(*coordinate));
            out.push(
                Envelope::new(
                    &self.id,
                    unit,
                    MessageKind::TargetAssignment,
                    &CoordinatePayload {
                        coordinate: *coordinate,
                    },
                )
                .with_correlation(*coordinate),
            );
        }
        self.stats.assignments_issued += plan.assignments.len() as u64;

        for unit in &plan.recalls {
            if let Some(released) = self.unit(unit).and_then(|u| u.assigned_incident) {
                let recall = self.recall(unit, released);
                out.push(recall);
            }
        }

        info!(
            dispatcher = %self.id,
            incidents = self.allocation_target.len(),
            assigned = plan.assignments.len(),
            recalled = plan.recalls.len(),
            "Units redistributed"
        );
        if !plan.assignments.is_empty() {
            self.events.push(SimulationEvent::UnitsAssigned {
                dispatcher: self.id.clone(),
                assignments: plan.assignments,
            });
        }
        if !plan.recalls.is_empty() {
            self.events.push(SimulationEvent::UnitsRecalled {
                dispatcher: self.id.clone(),
                units: plan.recalls,
            });
        }
        out
    }

    fn recall(&mut self, unit: &AgentId, released: Coordinate) -> Envelope {
        self.in_flight.insert(unit.clone(), None);
        self.stats.recalls_issued += 1;
        Envelope::new(
            &self.id,
            unit,
            MessageKind::Recall,
            &RecallPayload {
                released: Some(released),
            },
        )
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let units = self.unit_view();
        let weights = self.weights();
        let owned_incidents = self
            .owned
            .iter()
            .map(|(c, severity)| OwnedIncidentView {
                coordinate: *c,
                severity: *severity,
                weight: weights.get(c).copied().unwrap_or(1),
                target: self.allocation_target.get(c).copied().unwrap_or(0),
                assigned: units
                    .values()
                    .filter(|u| u.assigned_incident == Some(*c))
                    .count() as u32,
            })
            .collect();

        DispatchSnapshot {
            kind: self.kind,
            base: self.base,
            pool_size: self.pool_size(),
            available_units: self.available_units(),
            owned_incidents,
            units: units.into_values().collect(),
            shortfall: self.shortfall,
            stats: self.stats.clone(),
        }
    }
}
