use super::SimulationEvent;
use crate::agent::AgentId;
use crate::broker::BrokerSnapshot;
use crate::dispatch::DispatchSnapshot;
use crate::unit::UnitStatus;
use crate::world::WorldSnapshot;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Last published view of one agent's private state
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum AgentSnapshot {
    Broker(BrokerSnapshot),
    Dispatch(DispatchSnapshot),
    Unit(UnitStatus),
    Environment(WorldSnapshot),
}

#[derive(Clone, Debug, Serialize)]
pub struct SnapshotEntry {
    pub id: AgentId,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub snapshot: AgentSnapshot,
}

/// Read side of the simulation.
///
/// Each agent writes only its own entry, after it has finished handling a
/// message or tick. Readers (API, tests) never touch agent state directly.
pub struct SimulationMonitor {
    /// Lock-free concurrent map for fast reads
    agents: Arc<DashMap<AgentId, SnapshotEntry>>,

    /// Broadcast channel for protocol events
    events_tx: broadcast::Sender<SimulationEvent>,
}

impl SimulationMonitor {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(1000);

        Self {
            agents: Arc::new(DashMap::new()),
            events_tx,
        }
    }

    pub fn publish(&self, id: &AgentId, snapshot: AgentSnapshot) {
        self.agents.insert(
            id.clone(),
            SnapshotEntry {
                id: id.clone(),
                last_updated: Utc::now(),
                snapshot,
            },
        );
    }

    pub fn remove(&self, id: &AgentId) -> Option<SnapshotEntry> {
        self.agents.remove(id).map(|(_, entry)| entry)
    }

    pub fn get(&self, id: &AgentId) -> Option<SnapshotEntry> {
        self.agents.get(id).map(|e| e.clone())
    }

    /// All entries sorted by agent id.
    pub fn all(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<SnapshotEntry> =
            self.agents.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    pub fn emit(&self, event: SimulationEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.events_tx.subscribe()
    }
}

impl Default for SimulationMonitor {
    fn default() -> Self {
        Self::new()
    }
}
