// Observation of the running simulation

mod board;
mod event;

pub use board::{AgentSnapshot, SimulationMonitor, SnapshotEntry};
pub use event::SimulationEvent;
