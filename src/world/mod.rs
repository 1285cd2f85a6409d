// Environment: burning cells, fire spawning and the incident status feed

mod agent;

pub use agent::WorldAgent;

use crate::agent::{AgentId, ResponderKind, INCIDENT_STATUS_FEED};
use crate::config::WorldConfig;
use crate::grid::{Coordinate, GridBounds};
use crate::incident::{Incident, Severity};
use crate::message::{AlertPayload, CoordinatePayload, Envelope, MessageKind, SeverityPayload};
use crate::monitor::SimulationEvent;
use crate::subscription::SubscriptionRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Free cells tried per spawn before giving up for this tick
const SPAWN_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum IgniteError {
    OutOfBounds { coordinate: Coordinate, bounds: GridBounds },
    AlreadyBurning(Coordinate),
    NothingToBurn(Coordinate),
}

impl fmt::Display for IgniteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgniteError::OutOfBounds { coordinate, bounds } => write!(
                f,
                "{} is outside the {}x{} grid",
                coordinate, bounds.rows, bounds.cols
            ),
            IgniteError::AlreadyBurning(c) => write!(f, "{} is already burning", c),
            IgniteError::NothingToBurn(c) => {
                write!(f, "fire at {} needs intensity or casualties", c)
            }
        }
    }
}

impl std::error::Error for IgniteError {}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WorldStats {
    pub ignited: u64,
    pub resolved: u64,
    pub extinguished: u64,
    pub rescued: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorldSnapshot {
    pub bounds: GridBounds,
    pub tick: u64,
    pub fires: Vec<Incident>,
    pub status_subscribers: Vec<AgentId>,
    pub brokers: Vec<AgentId>,
    pub stats: WorldStats,
}

/// Grid state of the environment agent.
///
/// Each fire is alerted once to the brokers of every category it has work
/// for; every later change goes out on the `incident-status` feed until both
/// severity attributes reach zero.
pub struct World {
    id: AgentId,
    bounds: GridBounds,
    settings: WorldConfig,
    fires: BTreeMap<Coordinate, Severity>,
    rng: StdRng,
    status_feed: SubscriptionRegistry,
    brokers: Vec<(ResponderKind, AgentId)>,
    /// Fires not yet alerted because no interested broker was known
    unalerted: BTreeSet<Coordinate>,
    tick: u64,
    stats: WorldStats,
    events: Vec<SimulationEvent>,
}

impl World {
    pub fn new(id: AgentId, bounds: GridBounds, settings: WorldConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            id,
            bounds,
            settings,
            fires: BTreeMap::new(),
            rng,
            status_feed: SubscriptionRegistry::new(INCIDENT_STATUS_FEED),
            brokers: Vec::new(),
            unalerted: BTreeSet::new(),
            tick: 0,
            stats: WorldStats::default(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn severity(&self, coordinate: &Coordinate) -> Option<Severity> {
        self.fires.get(coordinate).copied()
    }

    pub fn active_fires(&self) -> usize {
        self.fires.len()
    }

    pub fn status_feed(&self) -> &SubscriptionRegistry {
        &self.status_feed
    }

    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn drain_events(&mut self) -> Vec<SimulationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replace the broker list; alerts held back for lack of brokers go out now.
    pub fn set_brokers(&mut self, brokers: Vec<(ResponderKind, AgentId)>) -> Vec<Envelope> {
        self.brokers = brokers;
        if self.brokers.is_empty() {
            return Vec::new();
        }
        let pending = std::mem::take(&mut self.unalerted);
        let mut out = Vec::new();
        for coordinate in pending {
            if let Some(severity) = self.severity(&coordinate) {
                out.extend(self.alert(coordinate, severity));
            }
        }
        out
    }

    pub fn ignite(
        &mut self,
        coordinate: Coordinate,
        severity: Severity,
    ) -> Result<Vec<Envelope>, IgniteError> {
        if !self.bounds.contains(&coordinate) {
            return Err(IgniteError::OutOfBounds {
                coordinate,
                bounds: self.bounds,
            });
        }
        if self.fires.contains_key(&coordinate) {
            return Err(IgniteError::AlreadyBurning(coordinate));
        }
        if severity.is_resolved() {
            return Err(IgniteError::NothingToBurn(coordinate));
        }

        self.fires.insert(coordinate, severity);
        self.stats.ignited += 1;
        info!(
            coordinate = %coordinate,
            intensity = severity.intensity,
            casualties = severity.casualties,
            "Fire ignited"
        );
        self.events.push(SimulationEvent::FireIgnited {
            coordinate,
            intensity: severity.intensity,
            casualties: severity.casualties,
        });

        let mut out = self.alert(coordinate, severity);
        out.extend(self.publish(coordinate, severity));
        Ok(out)
    }

    /// Scheduler tick: maybe start a fire in a free cell.
    pub fn on_tick(&mut self) -> Vec<Envelope> {
        self.tick += 1;
        if self.bounds.cell_count() == 0
            || self.fires.len() >= self.settings.max_active_fires
            || self.rng.gen::<f64>() >= self.settings.fire_spawn_probability
        {
            return Vec::new();
        }

        for _ in 0..SPAWN_ATTEMPTS {
            let coordinate = Coordinate::new(
                self.rng.gen_range(0..self.bounds.rows) as i32,
                self.rng.gen_range(0..self.bounds.cols) as i32,
            );
            if self.fires.contains_key(&coordinate) {
                continue;
            }
            let severity = Severity::new(
                self.rng.gen_range(1..=self.settings.max_intensity.max(1)),
                self.rng.gen_range(0..=self.settings.max_casualties),
            );
            return self.ignite(coordinate, severity).unwrap_or_default();
        }
        debug!(tick = self.tick, "No free cell found for a new fire");
        Vec::new()
    }

    /// A fire engine works the cell: intensity drops by one.
    pub fn on_extinguish(&mut self, sender: &AgentId, coordinate: Coordinate) -> Vec<Envelope> {
        let Some(severity) = self.fires.get_mut(&coordinate) else {
            return vec![self.status_reply(sender, coordinate)];
        };
        if severity.intensity == 0 {
            return vec![self.status_reply(sender, coordinate)];
        }
        severity.intensity -= 1;
        let severity = *severity;
        self.stats.extinguished += 1;
        self.changed(coordinate, severity)
    }

    /// An ambulance takes one casualty away.
    pub fn on_rescue(&mut self, sender: &AgentId, coordinate: Coordinate) -> Vec<Envelope> {
        let Some(severity) = self.fires.get_mut(&coordinate) else {
            return vec![self.status_reply(sender, coordinate)];
        };
        if severity.casualties == 0 {
            return vec![self.status_reply(sender, coordinate)];
        }
        severity.casualties -= 1;
        let severity = *severity;
        self.stats.rescued += 1;

        let mut out = vec![Envelope::new(
            &self.id,
            sender,
            MessageKind::CasualtyPickedUp,
            &CoordinatePayload { coordinate },
        )
        .with_correlation(coordinate)];
        out.extend(self.changed(coordinate, severity));
        out
    }

    pub fn on_subscription_request(&mut self, request: &Envelope, feed: &str) -> Envelope {
        self.status_feed.handle_request(request, feed)
    }

    fn changed(&mut self, coordinate: Coordinate, severity: Severity) -> Vec<Envelope> {
        let out = self.publish(coordinate, severity);
        if severity.is_resolved() {
            self.fires.remove(&coordinate);
            self.unalerted.remove(&coordinate);
            self.stats.resolved += 1;
            info!(coordinate = %coordinate, "Fire out, incident resolved");
            self.events
                .push(SimulationEvent::IncidentResolved { coordinate });
        }
        out
    }

    /// Alert the brokers whose category has work at `coordinate`; held back
    /// while none of them is known.
    fn alert(&mut self, coordinate: Coordinate, severity: Severity) -> Vec<Envelope> {
        let out: Vec<Envelope> = self
            .brokers
            .iter()
            .filter(|(kind, _)| kind.weight(Some(&severity)) > 0)
            .map(|(_, broker)| {
                Envelope::new(&self.id, broker, MessageKind::Alert, &AlertPayload { coordinate })
                    .with_correlation(coordinate)
            })
            .collect();
        if out.is_empty() {
            self.unalerted.insert(coordinate);
        }
        out
    }

    /// Severity to every status subscriber.
    fn publish(&self, coordinate: Coordinate, severity: Severity) -> Vec<Envelope> {
        let payload = SeverityPayload {
            coordinate,
            intensity: severity.intensity,
            casualties: severity.casualties,
        };
        self.status_feed
            .snapshot()
            .iter()
            .map(|subscriber| {
                Envelope::new(&self.id, subscriber, MessageKind::IncidentSeverity, &payload)
                    .with_correlation(coordinate)
            })
            .collect()
    }

    /// Current severity to a unit whose action found nothing to do.
    fn status_reply(&self, recipient: &AgentId, coordinate: Coordinate) -> Envelope {
        let severity = self.severity(&coordinate).unwrap_or_default();
        Envelope::new(
            &self.id,
            recipient,
            MessageKind::IncidentSeverity,
            &SeverityPayload {
                coordinate,
                intensity: severity.intensity,
                casualties: severity.casualties,
            },
        )
        .with_correlation(coordinate)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            bounds: self.bounds,
            tick: self.tick,
            fires: self
                .fires
                .iter()
                .map(|(c, s)| Incident {
                    coordinate: *c,
                    severity: *s,
                })
                .collect(),
            status_subscribers: self.status_feed.snapshot(),
            brokers: self.brokers.iter().map(|(_, broker)| broker.clone()).collect(),
            stats: self.stats.clone(),
        }
    }
}
