//! Configuration management for the junction controller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use junction_common::constants::{
    DEFAULT_HINTS_DIR, DEFAULT_STARTUP_DELAY_MS, DEFAULT_TICK_INTERVAL_MS,
    DEFAULT_WORLD_STATE_SOCKET,
};
use junction_common::{Direction, JunctionError, JunctionId, NeighbourMap, Protections};

use crate::world_state::WorldStateEndpoint;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Junction this process controls (CLI `-j` wins)
    #[serde(default)]
    pub junction_id: Option<JunctionId>,

    /// Directory holding every junction's hint record
    #[serde(default = "default_hints_dir")]
    pub hints_dir: String,

    /// Pause between the end of one tick and the start of the next
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Pause before the first tick
    #[serde(default = "default_startup_delay")]
    pub startup_delay_ms: u64,

    /// World-state store connection
    #[serde(default)]
    pub world_state: WorldStateConfig,

    /// Hint-protocol hardening
    #[serde(default)]
    pub protections: Protections,

    /// Adjacency of every junction in the mesh
    #[serde(default, rename = "junction")]
    pub junctions: Vec<JunctionConfig>,
}

/// World-state connection target; exactly one field must be set
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorldStateConfig {
    /// Unix domain socket path
    #[serde(default)]
    pub socket: Option<String>,

    /// TCP `host:port`
    #[serde(default)]
    pub address: Option<String>,
}

impl WorldStateConfig {
    pub fn endpoint(&self) -> Result<WorldStateEndpoint, JunctionError> {
        match (&self.socket, &self.address) {
            (Some(path), None) => Ok(WorldStateEndpoint::Unix(path.clone())),
            (None, Some(addr)) => Ok(WorldStateEndpoint::Tcp(addr.clone())),
            (None, None) => Ok(WorldStateEndpoint::Unix(DEFAULT_WORLD_STATE_SOCKET.to_string())),
            (Some(_), Some(_)) => Err(JunctionError::Config(
                "world_state takes either `socket` or `address`, not both".to_string(),
            )),
        }
    }
}

/// One junction's neighbours, keyed by the approach they sit on
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JunctionConfig {
    pub id: JunctionId,

    #[serde(default)]
    pub neighbours: BTreeMap<String, JunctionId>,
}

impl JunctionConfig {
    pub fn neighbour_map(&self) -> Result<NeighbourMap, JunctionError> {
        let mut map = NeighbourMap::isolated();
        for (direction, &neighbour) in &self.neighbours {
            let direction: Direction = direction.parse()?;
            if neighbour == 0 {
                return Err(JunctionError::Config(format!(
                    "junction {}: neighbour ids must be positive ({} = 0)",
                    self.id, direction
                )));
            }
            if neighbour == self.id {
                return Err(JunctionError::Config(format!(
                    "junction {} lists itself as its {} neighbour",
                    self.id, direction
                )));
            }
            map = map.with(direction, neighbour);
        }
        Ok(map)
    }
}

// Default value functions
fn default_hints_dir() -> String { DEFAULT_HINTS_DIR.to_string() }
fn default_tick_interval() -> u64 { DEFAULT_TICK_INTERVAL_MS }
fn default_startup_delay() -> u64 { DEFAULT_STARTUP_DELAY_MS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(id) = args.junction_id {
            config.junction_id = Some(id);
        }
        if let Some(ref hints_dir) = args.hints_dir {
            config.hints_dir = hints_dir.clone();
        }
        if let Some(ref socket) = args.world_state {
            config.world_state = WorldStateConfig {
                socket: Some(socket.clone()),
                address: None,
            };
        }

        Ok(config)
    }

    /// Junction id, which must be supplied and positive
    pub fn junction_id(&self) -> Result<JunctionId, JunctionError> {
        match self.junction_id {
            Some(0) => Err(JunctionError::Config("junction id must be positive".to_string())),
            Some(id) => Ok(id),
            None => Err(JunctionError::Config("No junction ID specified".to_string())),
        }
    }

    /// Neighbours of `id`; a junction without an entry is isolated
    pub fn neighbours_of(&self, id: JunctionId) -> Result<NeighbourMap, JunctionError> {
        match self.junctions.iter().find(|j| j.id == id) {
            Some(junction) => junction.neighbour_map(),
            None => Ok(NeighbourMap::isolated()),
        }
    }

    /// Check everything the controller relies on
    pub fn validate(&self) -> Result<(), JunctionError> {
        self.junction_id()?;
        self.world_state.endpoint()?;
        for junction in &self.junctions {
            junction.neighbour_map()?;
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            junction_id: None,
            hints_dir: default_hints_dir(),
            tick_interval_ms: default_tick_interval(),
            startup_delay_ms: default_startup_delay(),
            world_state: WorldStateConfig::default(),
            protections: Protections::default(),
            junctions: Vec::new(),
        }
    }
}
