use crate::agent::AgentId;
use crate::grid::Coordinate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// One dispatch agent's bid, alive for a single negotiation round
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub coordinate: Coordinate,
    pub bidder: AgentId,
    pub distance: u32,
    pub available_units: u32,
}

/// Open call-for-proposals round for one incident
#[derive(Clone, Debug)]
pub struct Negotiation {
    pub coordinate: Coordinate,
    /// Subscribers at the moment the round opened
    pub invited: Vec<AgentId>,
    pub responded: HashSet<AgentId>,
    /// Bids in arrival order
    pub proposals: Vec<Proposal>,
    pub opened_at_tick: u64,
    pub opened_at: DateTime<Utc>,
}

impl Negotiation {
    pub fn new(coordinate: Coordinate, invited: Vec<AgentId>, opened_at_tick: u64) -> Self {
        Self {
            coordinate,
            invited,
            responded: HashSet::new(),
            proposals: Vec::new(),
            opened_at_tick,
            opened_at: Utc::now(),
        }
    }

    fn is_invited(&self, bidder: &AgentId) -> bool {
        self.invited.contains(bidder)
    }

    /// Record a bid. Only the first response of an invited bidder counts.
    pub fn record_proposal(&mut self, proposal: Proposal) -> bool {
        if !self.is_invited(&proposal.bidder) || !self.responded.insert(proposal.bidder.clone()) {
            return false;
        }
        self.proposals.push(proposal);
        true
    }

    /// Record a response that carries no bid (refusal, not-understood).
    pub fn record_decline(&mut self, bidder: &AgentId) -> bool {
        self.is_invited(bidder) && self.responded.insert(bidder.clone())
    }

    /// Every invited bidder has answered.
    pub fn is_complete(&self) -> bool {
        self.responded.len() >= self.invited.len()
    }

    pub fn age(&self, now_tick: u64) -> u64 {
        now_tick.saturating_sub(self.opened_at_tick)
    }

    pub fn is_expired(&self, now_tick: u64, timeout_ticks: u64) -> bool {
        self.age(now_tick) > timeout_ticks
    }
}

/// Pick the winning bid.
///
/// Most available units wins; equal counts go to the shorter distance; a
/// full tie keeps the bid that arrived first.
pub fn select_winner(proposals: &[Proposal]) -> Option<&Proposal> {
    let mut best: Option<&Proposal> = None;

    for candidate in proposals {
        best = match best {
            Some(current)
                if candidate.available_units > current.available_units
                    || (candidate.available_units == current.available_units
                        && candidate.distance < current.distance) =>
            {
                Some(candidate)
            }
            None => Some(candidate),
            keep => keep,
        };
    }

    best
}
