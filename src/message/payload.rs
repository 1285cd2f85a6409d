use crate::grid::Coordinate;
use crate::incident::Severity;
use crate::unit::UnitStatus;
use serde::{Deserialize, Serialize};

/// Environment -> broker: a fire was detected at `coordinate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub coordinate: Coordinate,
}

/// Subscribe / unsubscribe request and its agreement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPayload {
    pub feed: String,
}

/// Refusal or not-understood notice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasonPayload {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<String>,
}

impl ReasonPayload {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            feed: None,
        }
    }

    pub fn for_feed(reason: impl Into<String>, feed: &str) -> Self {
        Self {
            reason: reason.into(),
            feed: Some(feed.to_string()),
        }
    }
}

/// Any message that only names an incident: call-for-proposal, accept,
/// reject, target assignment, extinguish, rescue, casualty pick-up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatePayload {
    pub coordinate: Coordinate,
}

/// Dispatch agent's bid for an incident.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalPayload {
    pub coordinate: Coordinate,
    pub distance: u32,
    pub available_units: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStatusPayload {
    pub status: UnitStatus,
}

/// Current severity of a burning cell; 0/0 means the incident is over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeverityPayload {
    pub coordinate: Coordinate,
    pub intensity: u32,
    pub casualties: u32,
}

impl SeverityPayload {
    pub fn severity(&self) -> Severity {
        Severity::new(self.intensity, self.casualties)
    }
}

/// Owner -> unit: drop the current assignment and head home.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<Coordinate>,
}

/// Start a fire by hand (API or tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IgnitePayload {
    pub coordinate: Coordinate,
    pub intensity: u32,
    pub casualties: u32,
}
