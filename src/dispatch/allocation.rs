// Proportional distribution of a unit pool across owned incidents

use crate::agent::AgentId;
use crate::grid::Coordinate;
use crate::unit::UnitStatus;
use std::collections::{BTreeMap, BTreeSet};

/// Desired unit count per owned incident
pub type AllocationTarget = BTreeMap<Coordinate, u32>;

/// Target allocation for `weights` with `pool_size` units.
///
/// Every incident gets one unit; the remaining `pool_size - incidents`
/// are shared by `round(weight / total * spare)`. Rounding may request
/// more units than exist, and so does a pool smaller than the incident
/// count. When every weight is zero the spare units are split evenly,
/// the remainder going to the lowest coordinates.
pub fn compute_targets(weights: &BTreeMap<Coordinate, u32>, pool_size: u32) -> AllocationTarget {
    if weights.is_empty() {
        return AllocationTarget::new();
    }

    let incidents = weights.len() as u32;
    let spare = pool_size.saturating_sub(incidents);
    let total: u64 = weights.values().map(|w| *w as u64).sum();

    if total == 0 {
        let share = spare / incidents;
        let remainder = (spare % incidents) as usize;
        return weights
            .keys()
            .enumerate()
            .map(|(i, c)| (*c, 1 + share + u32::from(i < remainder)))
            .collect();
    }

    weights
        .iter()
        .map(|(c, w)| {
            let extra = (*w as f64 / total as f64 * spare as f64).round() as u32;
            (*c, 1 + extra)
        })
        .collect()
}

/// Commands that move the pool from its current assignment to a target
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationPlan {
    /// Units to send to a new incident
    pub assignments: Vec<(AgentId, Coordinate)>,
    /// Units holding an assignment nobody needs any more
    pub recalls: Vec<AgentId>,
    /// Demand left unfilled, per incident
    pub unmet: BTreeMap<Coordinate, u32>,
}

impl AllocationPlan {
    pub fn is_noop(&self) -> bool {
        self.assignments.is_empty() && self.recalls.is_empty()
    }
}

/// Plan the commands reaching `targets` with the least churn.
///
/// 1. Units closed for targeting stay where they are and count for their
///    incident, if it is still targeted.
/// 2. Accepting units keep their incident while it needs them.
/// 3. Remaining demand is filled from the free accepting units in pool
///    order, heaviest incident first (ties by coordinate), so a shortfall
///    hits the lightest incidents.
/// 4. Free units still holding an assignment are recalled.
pub fn plan_assignments(
    targets: &AllocationTarget,
    weights: &BTreeMap<Coordinate, u32>,
    units: &BTreeMap<AgentId, UnitStatus>,
) -> AllocationPlan {
    let mut filled: BTreeMap<Coordinate, u32> = targets.keys().map(|c| (*c, 0)).collect();
    let mut retained: BTreeSet<&AgentId> = BTreeSet::new();

    for (id, unit) in units.iter().filter(|(_, u)| !u.accepting_target) {
        retained.insert(id);
        if let Some(count) = unit.assigned_incident.and_then(|c| filled.get_mut(&c)) {
            *count += 1;
        }
    }

    for (id, unit) in units.iter().filter(|(_, u)| u.accepting_target) {
        let Some(incident) = unit.assigned_incident else {
            continue;
        };
        let (Some(target), Some(count)) = (targets.get(&incident), filled.get_mut(&incident))
        else {
            continue;
        };
        if *count < *target {
            *count += 1;
            retained.insert(id);
        }
    }

    let mut free = units
        .iter()
        .filter(|(id, _)| !retained.contains(id))
        .peekable();

    let mut order: Vec<Coordinate> = targets.keys().copied().collect();
    order.sort_by(|a, b| {
        let wa = weights.get(a).copied().unwrap_or(1);
        let wb = weights.get(b).copied().unwrap_or(1);
        wb.cmp(&wa).then(a.cmp(b))
    });

    let mut plan = AllocationPlan::default();
    for incident in order {
        let target = targets[&incident];
        let count = filled.entry(incident).or_default();
        while *count < target {
            let Some((id, _)) = free.next() else {
                break;
            };
            plan.assignments.push((id.clone(), incident));
            *count += 1;
        }
        if *count < target {
            plan.unmet.insert(incident, target - *count);
        }
    }

    plan.recalls = free
        .filter(|(_, unit)| unit.assigned_incident.is_some())
        .map(|(id, _)| id.clone())
        .collect();

    plan
}
