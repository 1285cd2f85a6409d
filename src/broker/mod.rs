// Incident broker: call-for-proposals negotiation per incident

mod agent;
mod negotiation;

pub use agent::BrokerAgent;
pub use negotiation::{select_winner, Negotiation, Proposal};

use crate::agent::{AgentId, ResponderKind, INCIDENT_ALERTS_FEED};
use crate::grid::Coordinate;
use crate::incident::Severity;
use crate::message::{CoordinatePayload, Envelope, MessageKind, ProposalPayload};
use crate::monitor::SimulationEvent;
use crate::subscription::SubscriptionRegistry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};


/// Negotiation timeout used when none is configured, in scheduler ticks
pub const DEFAULT_NEGOTIATION_TIMEOUT_TICKS: u64 = 50;

/// Lifetime counters
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BrokerStats {
    pub committed: u64,
    pub forced: u64,
    pub unhandled: u64,
    pub stale_dropped: u64,
    pub duplicate_alerts: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct NegotiationView {
    pub coordinate: Coordinate,
    pub invited: usize,
    pub responded: usize,
    pub proposals: Vec<Proposal>,
    pub age_ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct BrokerSnapshot {
    pub kind: ResponderKind,
    pub tick: u64,
    pub subscribers: Vec<AgentId>,
    pub known_incidents: Vec<Coordinate>,
    pub open_negotiations: Vec<NegotiationView>,
    pub stats: BrokerStats,
}

/// Coordinator state for one responder category.
///
/// Pure state machine: every input returns the envelopes to send, and the
/// owning [`BrokerAgent`] delivers them. Time is measured in scheduler ticks.
///
/// A negotiation is `Open` until every invited subscriber answered or its
/// age exceeds the timeout, then it is committed exactly once and removed.
pub struct IncidentBroker {
    id: AgentId,
    kind: ResponderKind,
    subscribers: SubscriptionRegistry,
    /// Coordinates already alerted, suppresses duplicate rounds
    known_incidents: BTreeSet<Coordinate>,
    open: BTreeMap<Coordinate, Negotiation>,
    timeout_ticks: u64,
    tick: u64,
    stats: BrokerStats,
    events: Vec<SimulationEvent>,
}

impl IncidentBroker {
    pub fn new(id: AgentId, kind: ResponderKind, timeout_ticks: u64) -> Self {
        Self {
            id,
            kind,
            subscribers: SubscriptionRegistry::new(INCIDENT_ALERTS_FEED),
            known_incidents: BTreeSet::new(),
            open: BTreeMap::new(),
            timeout_ticks,
            tick: 0,
            stats: BrokerStats::default(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn kind(&self) -> ResponderKind {
        self.kind
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn subscribers(&self) -> &SubscriptionRegistry {
        &self.subscribers
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }

    pub fn is_known(&self, coordinate: &Coordinate) -> bool {
        self.known_incidents.contains(coordinate)
    }

    pub fn negotiation(&self, coordinate: &Coordinate) -> Option<&Negotiation> {
        self.open.get(coordinate)
    }

    pub fn open_negotiations(&self) -> usize {
        self.open.len()
    }

    /// Events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<SimulationEvent> {
        std::mem::take(&mut self.events)
    }

    /// First-time alert for `coordinate` opens a round; repeats are ignored.
    pub fn on_alert(&mut self, coordinate: Coordinate) -> Vec<Envelope> {
        if !self.known_incidents.insert(coordinate) {
            self.stats.duplicate_alerts += 1;
            debug!(broker = %self.id, coordinate = %coordinate, "Duplicate alert ignored");
            return Vec::new();
        }

        // Late subscribers are not part of this round
        let invited = self.subscribers.snapshot();
        if invited.is_empty() {
            self.mark_unhandled(coordinate);
            return Vec::new();
        }

        info!(
            broker = %self.id,
            coordinate = %coordinate,
            invited = invited.len(),
            "Opening negotiation"
        );

        let messages = invited
            .iter()
            .map(|bidder| {
                Envelope::new(
                    &self.id,
                    bidder,
                    MessageKind::CallForProposal,
                    &CoordinatePayload { coordinate },
                )
                .with_correlation(coordinate)
            })
            .collect();

        self.events.push(SimulationEvent::NegotiationOpened {
            broker: self.id.clone(),
            coordinate,
            invited: invited.len(),
        });
        self.open
            .insert(coordinate, Negotiation::new(coordinate, invited, self.tick));

        messages
    }

    pub fn on_proposal(&mut self, bidder: &AgentId, bid: &ProposalPayload) -> Vec<Envelope> {
        let coordinate = bid.coordinate;
        let Some(negotiation) = self.open.get_mut(&coordinate) else {
            self.drop_stale(coordinate, MessageKind::Propose);
            return Vec::new();
        };

        let accepted = negotiation.record_proposal(Proposal {
            coordinate,
            bidder: bidder.clone(),
            distance: bid.distance,
            available_units: bid.available_units,
        });
        if !accepted {
            debug!(broker = %self.id, bidder = %bidder, coordinate = %coordinate, "Repeated or uninvited proposal ignored");
            return Vec::new();
        }

        if negotiation.is_complete() {
            self.commit(coordinate, false)
        } else {
            Vec::new()
        }
    }

    /// A correlated refusal or not-understood: the bidder answered without a bid.
    pub fn on_decline(&mut self, bidder: &AgentId, coordinate: Coordinate) -> Vec<Envelope> {
        let Some(negotiation) = self.open.get_mut(&coordinate) else {
            self.drop_stale(coordinate, MessageKind::Refuse);
            return Vec::new();
        };

        if negotiation.record_decline(bidder) && negotiation.is_complete() {
            self.commit(coordinate, false)
        } else {
            Vec::new()
        }
    }

    /// Scheduler tick: force-commit every round older than the timeout.
    pub fn on_tick(&mut self) -> Vec<Envelope> {
        self.tick += 1;

        let expired: Vec<Coordinate> = self
            .open
            .values()
            .filter(|n| n.is_expired(self.tick, self.timeout_ticks))
            .map(|n| n.coordinate)
            .collect();

        expired
            .into_iter()
            .flat_map(|coordinate| self.commit(coordinate, true))
            .collect()
    }

    /// A fire that has burnt out may later be reported again at the same cell.
    pub fn on_severity(&mut self, coordinate: Coordinate, severity: Severity) {
        if severity.is_resolved() && self.known_incidents.remove(&coordinate) {
            debug!(broker = %self.id, coordinate = %coordinate, "Incident resolved, location released");
        }
    }

    pub fn on_subscription_request(&mut self, request: &Envelope, feed: &str) -> Envelope {
        self.subscribers.handle_request(request, feed)
    }

    fn commit(&mut self, coordinate: Coordinate, forced: bool) -> Vec<Envelope> {
        let Some(negotiation) = self.open.remove(&coordinate) else {
            return Vec::new();
        };

        let Some(winner) = select_winner(&negotiation.proposals) else {
            self.mark_unhandled(coordinate);
            return Vec::new();
        };
        let winner = winner.bidder.clone();

        self.stats.committed += 1;
        if forced {
            self.stats.forced += 1;
        }

        info!(
            broker = %self.id,
            coordinate = %coordinate,
            winner = %winner,
            proposals = negotiation.proposals.len(),
            invited = negotiation.invited.len(),
            forced = forced,
            "Incident committed"
        );

        let payload = CoordinatePayload { coordinate };
        let messages = negotiation
            .proposals
            .iter()
            .map(|p| {
                let kind = if p.bidder == winner {
                    MessageKind::AcceptProposal
                } else {
                    MessageKind::RejectProposal
                };
                Envelope::new(&self.id, &p.bidder, kind, &payload).with_correlation(coordinate)
            })
            .collect();

        self.events.push(SimulationEvent::NegotiationCommitted {
            broker: self.id.clone(),
            coordinate,
            winner,
            proposals: negotiation.proposals.len(),
            forced,
        });

        messages
    }

    fn mark_unhandled(&mut self, coordinate: Coordinate) {
        self.stats.unhandled += 1;
        warn!(broker = %self.id, coordinate = %coordinate, "No proposals, incident left unhandled");
        self.events.push(SimulationEvent::IncidentUnhandled {
            broker: self.id.clone(),
            coordinate,
        });
    }

    fn drop_stale(&mut self, coordinate: Coordinate, kind: MessageKind) {
        self.stats.stale_dropped += 1;
        debug!(broker = %self.id, coordinate = %coordinate, kind = %kind, "Reply for closed negotiation dropped");
        self.events.push(SimulationEvent::StaleMessageDropped {
            agent: self.id.clone(),
            coordinate,
            kind,
        });
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        BrokerSnapshot {
            kind: self.kind,
            tick: self.tick,
            subscribers: self.subscribers.snapshot(),
            known_incidents: self.known_incidents.iter().copied().collect(),
            open_negotiations: self
                .open
                .values()
                .map(|n| NegotiationView {
                    coordinate: n.coordinate,
                    invited: n.invited.len(),
                    responded: n.responded.len(),
                    proposals: n.proposals.clone(),
                    age_ticks: n.age(self.tick),
                })
                .collect(),
            stats: self.stats.clone(),
        }
    }
}
