//! Configuration loading and typed config structures for kubesim.
//!
//! The configuration lives in `kubesim-config.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure, a loader, and the
//! conversions from raw configuration into simulation values (start clock,
//! tick duration, nodes).
//!
//! ```yaml
//! tick: 10
//! start_clock: "2019-01-01T00:00:00Z"
//! logging:
//!   level: debug
//! scheduler:
//!   strategy: least_allocated
//! simulation:
//!   max_ticks: 100
//! cluster:
//!   nodes:
//!     - name: node-1
//!       capacity: { cpu: "4", memory: "8Gi" }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::TimeDelta;
use kubesim_types::{NodeName, QuantityError, parse_resource_list};
use serde::Deserialize;

use crate::clock::{Clock, ClockError};
use crate::node::Node;
use crate::scheduler::{Scheduler, ScoringStrategy};

/// Log levels accepted in `logging.level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// A node capacity quantity could not be parsed.
    #[error("node {node}: {source}")]
    Quantity {
        /// The node whose capacity is malformed.
        node: String,
        /// The underlying quantity error.
        source: QuantityError,
    },

    /// The start clock could not be parsed.
    #[error("start clock: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Simulated seconds per tick.
    #[serde(default = "default_tick")]
    pub tick: u64,

    /// RFC 3339 start instant. Empty means the wall-clock time at startup.
    #[serde(default)]
    pub start_clock: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// The simulated cluster.
    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            start_clock: String::new(),
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
            simulation: SimulationBoundsConfig::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and node name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick == 0 {
            return Err(ConfigError::Invalid {
                reason: "tick must be at least 1 second".to_owned(),
            });
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid {
                reason: format!("log level {:?} not supported", self.logging.level),
            });
        }

        let mut seen = BTreeSet::new();
        for node in &self.cluster.nodes {
            if node.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    reason: "node name must not be empty".to_owned(),
                });
            }
            if !seen.insert(node.name.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate node name {:?}", node.name),
                });
            }
        }

        Ok(())
    }

    /// The simulated duration of one tick.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the tick is zero or too large.
    pub fn tick_duration(&self) -> Result<TimeDelta, ConfigError> {
        i64::try_from(self.tick)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ConfigError::Invalid {
                reason: format!("tick of {} seconds is out of range", self.tick),
            })
    }

    /// The clock value of the first tick.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Clock`] if `start_clock` is not RFC 3339.
    pub fn start_clock(&self) -> Result<Clock, ConfigError> {
        Ok(Clock::parse_rfc3339(&self.start_clock)?)
    }

    /// Build the scheduler described by the `scheduler` section.
    pub const fn build_scheduler(&self) -> Scheduler {
        Scheduler::new(self.scheduler.strategy)
    }

    /// Build the initial node set from the `cluster` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Quantity`] if a capacity quantity is malformed.
    pub fn build_nodes(&self) -> Result<Vec<Node>, ConfigError> {
        self.cluster.nodes.iter().map(NodeConfig::build).collect()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// How feasible nodes are ranked.
    #[serde(default)]
    pub strategy: ScoringStrategy,
}

/// Simulation boundary parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Maximum number of ticks before the simulation ends (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,
}

/// The simulated cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    /// Node specifications.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// A single node specification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// Unique node name.
    pub name: String,

    /// Capacity per resource dimension, in Kubernetes quantity notation.
    #[serde(default)]
    pub capacity: BTreeMap<String, String>,
}

impl NodeConfig {
    /// Build an empty node with this specification's capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Quantity`] if a quantity is malformed.
    pub fn build(&self) -> Result<Node, ConfigError> {
        let capacity = parse_resource_list(&self.capacity).map_err(|source| {
            ConfigError::Quantity {
                node: self.name.clone(),
                source,
            }
        })?;
        Ok(Node::new(NodeName::new(self.name.clone()), capacity))
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}
