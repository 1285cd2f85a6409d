use super::MobileUnit;
use crate::incident::Severity;
use crate::message::{Envelope, MessageKind};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What a unit does on the job.
///
/// The movement core calls these hooks; everything else about a unit is
/// shared between roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitRole {
    FireEngine,
    Ambulance,
}

impl UnitRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitRole::FireEngine => "fire-engine",
            UnitRole::Ambulance => "ambulance",
        }
    }

    /// Reached the station. An ambulance hands over its casualty and opens
    /// for new targets again.
    pub fn arrived_at_home(&self, unit: &mut MobileUnit) -> Vec<Envelope> {
        if *self == UnitRole::Ambulance && unit.carrying_casualty {
            unit.carrying_casualty = false;
            unit.status.accepting_target = true;
            unit.delivered += 1;
            info!(unit = %unit.id(), delivered = unit.delivered, "Casualty delivered");
        }
        Vec::new()
    }

    /// Reached the assigned incident; work starts right away.
    pub fn arrived_at_fire(&self, unit: &mut MobileUnit) -> Vec<Envelope> {
        info!(unit = %unit.id(), role = self.as_str(), position = %unit.status.position, "Arrived at incident");
        self.on_periodic_action(unit)
    }

    /// Action repeated on every tick spent at the incident.
    pub fn on_periodic_action(&self, unit: &mut MobileUnit) -> Vec<Envelope> {
        if !unit.work_remaining {
            return Vec::new();
        }
        match self {
            UnitRole::FireEngine => unit.to_environment(MessageKind::Extinguish).into_iter().collect(),
            // One casualty at a time: wait for the hand-over before asking again
            UnitRole::Ambulance if unit.carrying_casualty || unit.rescue_pending => Vec::new(),
            UnitRole::Ambulance => {
                let rescue = unit.to_environment(MessageKind::Rescue);
                unit.rescue_pending = rescue.is_some();
                rescue.into_iter().collect()
            }
        }
    }

    /// Severity of the assigned incident changed.
    pub fn on_incident_status(&self, unit: &mut MobileUnit, severity: Severity) -> Vec<Envelope> {
        unit.work_remaining = match self {
            UnitRole::FireEngine => severity.intensity > 0,
            UnitRole::Ambulance => severity.casualties > 0,
        };
        if severity.casualties == 0 {
            unit.rescue_pending = false;
        }
        Vec::new()
    }
}
