// Process setup: builds the shared substrate and spawns every agent

use crate::agent::{AgentContext, AgentId, ResponderKind};
use crate::broker::{BrokerAgent, IncidentBroker};
use crate::config::FirecoordConfig;
use crate::dispatch::{DispatchAgent, DispatchCenter};
use crate::grid::GridBounds;
use crate::message::SchemaRegistry;
use crate::monitor::SimulationMonitor;
use crate::transport::{Directory, Mailbox, MessageRouter};
use crate::unit::{MobileUnit, UnitAgent, UnitStatus};
use crate::world::{World, WorldAgent};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Router name of the environment agent
pub const WORLD_ID: &str = "world";

/// Router name of a category's broker.
pub fn broker_id(kind: ResponderKind) -> AgentId {
    AgentId::new(format!("{}-broker", kind.as_str()))
}

/// Router name of a station's `index`-th unit.
pub fn unit_id(station: &str, index: u32) -> AgentId {
    AgentId::new(format!("{}/unit-{:02}", station, index))
}

/// Running simulation.
///
/// Every agent is a tokio task with its own mailbox. Dropping the handle
/// aborts the tasks; [`Simulation::shutdown`] stops them cleanly.
pub struct Simulation {
    router: MessageRouter,
    directory: Directory,
    monitor: Arc<SimulationMonitor>,
    bounds: GridBounds,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Build every agent from `config` and spawn it. Config is expected to
    /// be validated.
    pub fn start(config: &FirecoordConfig) -> Self {
        let router = MessageRouter::new();
        let directory = Directory::new();
        let schemas = Arc::new(SchemaRegistry::emergency_response());
        let monitor = Arc::new(SimulationMonitor::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tick = config.simulation.tick_interval();
        let lookup = config.directory.policy();
        let bounds = config.simulation.bounds();

        // Mailboxes exist before any agent runs, so early sends are queued
        let context = |id: AgentId| -> (AgentContext, Mailbox) {
            let mailbox = router.register(&id);
            let ctx = AgentContext::new(
                id,
                router.clone(),
                directory.clone(),
                Arc::clone(&schemas),
                Arc::clone(&monitor),
            );
            (ctx, mailbox)
        };

        let mut handles = Vec::new();

        let world_id = AgentId::from(WORLD_ID);
        let (ctx, mailbox) = context(world_id.clone());
        let world = World::new(
            world_id,
            bounds,
            config.world.clone(),
            config.simulation.seed,
        );
        handles.push(tokio::spawn(
            WorldAgent::new(world, ctx, mailbox, tick).run(shutdown_rx.clone()),
        ));

        for kind in ResponderKind::ALL {
            let id = broker_id(kind);
            let (ctx, mailbox) = context(id.clone());
            let broker = IncidentBroker::new(id, kind, config.broker.negotiation_timeout_ticks);
            handles.push(tokio::spawn(
                BrokerAgent::new(broker, ctx, mailbox, tick, lookup).run(shutdown_rx.clone()),
            ));
        }

        let mut unit_count = 0;
        for station in &config.stations {
            let station_id = AgentId::new(station.name.clone());
            let base = station.base();

            let mut pool = Vec::new();
            for index in 0..station.units {
                let id = unit_id(&station.name, index);
                let (ctx, mailbox) = context(id.clone());
                let unit = MobileUnit::new(id.clone(), station_id.clone(), station.kind.unit_role(), base);
                pool.push(UnitStatus::at_home(id, base));
                handles.push(tokio::spawn(
                    UnitAgent::new(unit, ctx, mailbox, tick, lookup).run(shutdown_rx.clone()),
                ));
            }
            unit_count += pool.len();

            let (ctx, mailbox) = context(station_id.clone());
            let center = DispatchCenter::new(station_id, station.kind, base, pool);
            handles.push(tokio::spawn(
                DispatchAgent::new(center, ctx, mailbox, lookup).run(shutdown_rx.clone()),
            ));
        }

        info!(
            rows = bounds.rows,
            cols = bounds.cols,
            stations = config.stations.len(),
            units = unit_count,
            agents = handles.len(),
            "Simulation started"
        );

        Self {
            router,
            directory,
            monitor,
            bounds,
            shutdown_tx,
            handles,
        }
    }

    pub fn monitor(&self) -> Arc<SimulationMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn router(&self) -> MessageRouter {
        self.router.clone()
    }

    pub fn directory(&self) -> Directory {
        self.directory.clone()
    }

    pub fn world_id(&self) -> AgentId {
        AgentId::from(WORLD_ID)
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn agent_count(&self) -> usize {
        self.handles.len()
    }

    /// Signal every agent and wait for all of them to stop.
    pub async fn shutdown(mut self) {
        info!(agents = self.handles.len(), "Shutting down simulation");
        // Receivers only gone if every agent already stopped
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = self.handles.drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Agent task ended abnormally");
            }
        }
        info!("Simulation stopped");
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}
