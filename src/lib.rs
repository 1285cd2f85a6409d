// Grid model and distance metric
pub mod grid;

// Incident severity
pub mod incident;

// Agent identity and per-agent context
pub mod agent;

// Envelopes, payloads and the schema registry
pub mod message;

// In-process message router and capability directory
pub mod transport;

// Subscription registry for named feeds
pub mod subscription;

// Incident broker: call-for-proposals negotiation
pub mod broker;

// Dispatch agents and vehicle allocation
pub mod dispatch;

// Mobile units
pub mod unit;

// Environment: fires and the incident status feed
pub mod world;

// Snapshots and protocol events
pub mod monitor;

// Configuration
pub mod config;

// Process setup
pub mod simulation;

// HTTP inspection API
pub mod api;
