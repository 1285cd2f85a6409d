use crate::agent::ResponderKind;
use crate::grid::{Coordinate, GridBounds};
use crate::transport::LookupPolicy;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Complete firecoord configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FirecoordConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_stations")]
    pub stations: Vec<StationConfig>,
}

/// Grid and scheduler
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_grid_rows")]
    pub grid_rows: u32,
    #[serde(default = "default_grid_cols")]
    pub grid_cols: u32,
    /// Length of one scheduler tick (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Fire spawner seed; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_grid_rows() -> u32 {
    50
}

fn default_grid_cols() -> u32 {
    50
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_rows: default_grid_rows(),
            grid_cols: default_grid_cols(),
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.grid_rows, self.grid_cols)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Ticks a negotiation waits for stragglers before force-committing
    #[serde(default = "default_negotiation_timeout_ticks")]
    pub negotiation_timeout_ticks: u64,
}

fn default_negotiation_timeout_ticks() -> u64 {
    crate::broker::DEFAULT_NEGOTIATION_TIMEOUT_TICKS
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout_ticks: default_negotiation_timeout_ticks(),
        }
    }
}

/// Fire spawner
#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    /// Chance per tick that a new fire starts
    #[serde(default = "default_fire_spawn_probability")]
    pub fire_spawn_probability: f64,
    #[serde(default = "default_max_active_fires")]
    pub max_active_fires: usize,
    #[serde(default = "default_max_intensity")]
    pub max_intensity: u32,
    #[serde(default = "default_max_casualties")]
    pub max_casualties: u32,
}

fn default_fire_spawn_probability() -> f64 {
    0.02
}

fn default_max_active_fires() -> usize {
    8
}

fn default_max_intensity() -> u32 {
    10
}

fn default_max_casualties() -> u32 {
    3
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fire_spawn_probability: default_fire_spawn_probability(),
            max_active_fires: default_max_active_fires(),
            max_intensity: default_max_intensity(),
            max_casualties: default_max_casualties(),
        }
    }
}

/// Capability lookup retries
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_lookup_backoff_ms")]
    pub lookup_backoff_ms: u64,
    #[serde(default = "default_lookup_attempts")]
    pub lookup_attempts: u32,
}

fn default_lookup_backoff_ms() -> u64 {
    100
}

fn default_lookup_attempts() -> u32 {
    50
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            lookup_backoff_ms: default_lookup_backoff_ms(),
            lookup_attempts: default_lookup_attempts(),
        }
    }
}

impl DirectoryConfig {
    pub fn policy(&self) -> LookupPolicy {
        LookupPolicy {
            backoff: Duration::from_millis(self.lookup_backoff_ms),
            attempts: self.lookup_attempts,
        }
    }
}

/// Inspection API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    3000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
        }
    }
}

/// One dispatch agent and its units
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationConfig {
    pub name: String,
    pub kind: ResponderKind,
    pub row: i32,
    pub col: i32,
    pub units: u32,
}

impl StationConfig {
    pub fn new(name: &str, kind: ResponderKind, row: i32, col: i32, units: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            row,
            col,
            units,
        }
    }

    pub fn base(&self) -> Coordinate {
        Coordinate::new(self.row, self.col)
    }
}

fn default_stations() -> Vec<StationConfig> {
    vec![
        StationConfig::new("fire-brigade-north", ResponderKind::FireBrigade, 10, 10, 5),
        StationConfig::new("fire-brigade-south", ResponderKind::FireBrigade, 40, 40, 5),
        StationConfig::new("hospital-central", ResponderKind::Hospital, 25, 25, 4),
    ]
}

impl Default for FirecoordConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            broker: BrokerConfig::default(),
            world: WorldConfig::default(),
            directory: DirectoryConfig::default(),
            api: ApiConfig::default(),
            stations: default_stations(),
        }
    }
}

/// Configuration the simulation cannot start with
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyGrid,
    ZeroTickInterval,
    ZeroNegotiationTimeout,
    InvalidSpawnProbability(f64),
    DuplicateStation(String),
    StationOutsideGrid { name: String, base: Coordinate },
    StationWithoutUnits(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyGrid => write!(f, "grid must have at least one row and column"),
            ConfigError::ZeroTickInterval => write!(f, "tick_interval_ms must be positive"),
            ConfigError::ZeroNegotiationTimeout => {
                write!(f, "negotiation_timeout_ticks must be positive")
            }
            ConfigError::InvalidSpawnProbability(p) => {
                write!(f, "fire_spawn_probability {} is not within [0, 1]", p)
            }
            ConfigError::DuplicateStation(name) => write!(f, "station '{}' defined twice", name),
            ConfigError::StationOutsideGrid { name, base } => {
                write!(f, "station '{}' at {} is outside the grid", name, base)
            }
            ConfigError::StationWithoutUnits(name) => {
                write!(f, "station '{}' has no units", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl FirecoordConfig {
    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = self.simulation.bounds();
        if bounds.cell_count() == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.simulation.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.broker.negotiation_timeout_ticks == 0 {
            return Err(ConfigError::ZeroNegotiationTimeout);
        }
        let p = self.world.fire_spawn_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidSpawnProbability(p));
        }

        let mut seen = std::collections::HashSet::new();
        for station in &self.stations {
            if !seen.insert(station.name.as_str()) {
                return Err(ConfigError::DuplicateStation(station.name.clone()));
            }
            if !bounds.contains(&station.base()) {
                return Err(ConfigError::StationOutsideGrid {
                    name: station.name.clone(),
                    base: station.base(),
                });
            }
            if station.units == 0 {
                return Err(ConfigError::StationWithoutUnits(station.name.clone()));
            }
        }
        Ok(())
    }

    /// Apply `FIRECOORD_API_PORT` and `FIRECOORD_SEED` when set and parseable.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FIRECOORD_API_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.api.port = port;
            }
        }
        if let Ok(v) = std::env::var("FIRECOORD_SEED") {
            if let Ok(seed) = v.parse::<u64>() {
                self.simulation.seed = Some(seed);
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<FirecoordConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: FirecoordConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FirecoordConfig::default();
        assert_eq!(config.simulation.grid_rows, 50);
        assert_eq!(config.simulation.tick_interval_ms, 100);
        assert_eq!(config.broker.negotiation_timeout_ticks, 50);
        assert_eq!(config.directory.lookup_attempts, 50);
        assert_eq!(config.api.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [simulation]
            grid_rows = 20
            grid_cols = 30
            tick_interval_ms = 10
            seed = 7

            [broker]
            negotiation_timeout_ticks = 5

            [world]
            fire_spawn_probability = 0.5
            max_active_fires = 2

            [api]
            enabled = false
            port = 8080

            [[stations]]
            name = "east"
            kind = "fire-brigade"
            row = 3
            col = 4
            units = 2

            [[stations]]
            name = "clinic"
            kind = "hospital"
            row = 0
            col = 0
            units = 1
        "#;

        let config: FirecoordConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.simulation.bounds(), GridBounds::new(20, 30));
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.broker.negotiation_timeout_ticks, 5);
        assert_eq!(config.world.max_active_fires, 2);
        assert_eq!(config.world.max_intensity, 10);
        assert!(!config.api.enabled);
        assert_eq!(
            config.stations,
            vec![
                StationConfig::new("east", ResponderKind::FireBrigade, 3, 4, 2),
                StationConfig::new("clinic", ResponderKind::Hospital, 0, 0, 1),
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [world]
            max_casualties = 0
        "#;

        let config: FirecoordConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.world.max_casualties, 0);
        assert_eq!(config.simulation.grid_cols, 50);
        assert_eq!(config.stations.len(), 3);
    }

    #[test]
    fn test_validate_rejects_station_outside_grid() {
        let mut config = FirecoordConfig::default();
        config.simulation.grid_rows = 20;
        assert_eq!(
            config.validate(),
            Err(ConfigError::StationOutsideGrid {
                name: "fire-brigade-south".to_string(),
                base: Coordinate::new(40, 40),
            })
        );
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = FirecoordConfig::default();
        config.simulation.grid_cols = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyGrid));

        let mut config = FirecoordConfig::default();
        config.broker.negotiation_timeout_ticks = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroNegotiationTimeout));

        let mut config = FirecoordConfig::default();
        config.world.fire_spawn_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpawnProbability(_))
        ));

        let mut config = FirecoordConfig::default();
        config.stations[1].name = config.stations[0].name.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateStation(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/firecoord.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
