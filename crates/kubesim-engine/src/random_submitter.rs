//! Random workload generator.
//!
//! [`RandomSubmitter`] submits a fixed number of pods per tick with demands
//! drawn uniformly from configured cpu and memory ranges and a priority
//! picked from a configured list. With a seed the workload is reproducible.

use kubesim_core::clock::Clock;
use kubesim_core::node::NodeSnapshot;
use kubesim_core::submitter::{Submitter, SubmitterError};
use kubesim_types::{CPU, MEMORY, Pod, ResourceList, parse_quantity};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Configuration for the random submitter, read from the `submitter`
/// section of `kubesim-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitterConfig {
    /// RNG seed. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Pods submitted on every tick.
    #[serde(default = "default_pods_per_tick")]
    pub pods_per_tick: u32,

    /// Pod names are `<prefix>-<n>`.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// CPU demand range, in quantity notation.
    #[serde(default = "default_cpu")]
    pub cpu: QuantityRange,

    /// Memory demand range, in quantity notation.
    #[serde(default = "default_memory")]
    pub memory: QuantityRange,

    /// Priorities to pick from, uniformly.
    #[serde(default = "default_priorities")]
    pub priorities: Vec<i32>,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pods_per_tick: default_pods_per_tick(),
            name_prefix: default_name_prefix(),
            cpu: default_cpu(),
            memory: default_memory(),
            priorities: default_priorities(),
        }
    }
}

impl SubmitterConfig {
    /// Extract the `submitter` section from a full config file.
    ///
    /// A missing section yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Submitter`] if the YAML or the section is
    /// malformed.
    pub fn from_yaml(contents: &str) -> Result<Self, EngineError> {
        let raw: serde_yml::Value =
            serde_yml::from_str(contents).map_err(|e| EngineError::Submitter {
                message: format!("failed to parse config YAML: {e}"),
            })?;

        raw.get("submitter").map_or_else(
            || Ok(Self::default()),
            |section| {
                serde_yml::from_value(section.clone()).map_err(|e| EngineError::Submitter {
                    message: format!("failed to parse submitter config: {e}"),
                })
            },
        )
    }
}

/// Inclusive range of resource quantities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuantityRange {
    /// Smallest demand.
    pub min: String,
    /// Largest demand.
    pub max: String,
}

impl QuantityRange {
    fn parse(&self, dimension: &str) -> Result<(u64, u64), EngineError> {
        let parse = |raw: &str| {
            parse_quantity(dimension, raw).map_err(|e| EngineError::Submitter {
                message: e.to_string(),
            })
        };
        let (min, max) = (parse(&self.min)?, parse(&self.max)?);
        if min > max {
            return Err(EngineError::Submitter {
                message: format!("{dimension} range is empty: {} > {}", self.min, self.max),
            });
        }
        Ok((min, max))
    }
}

const fn default_pods_per_tick() -> u32 {
    1
}

fn default_name_prefix() -> String {
    String::from("pod")
}

fn default_cpu() -> QuantityRange {
    QuantityRange {
        min: String::from("100m"),
        max: String::from("1"),
    }
}

fn default_memory() -> QuantityRange {
    QuantityRange {
        min: String::from("64Mi"),
        max: String::from("1Gi"),
    }
}

fn default_priorities() -> Vec<i32> {
    vec![0]
}

// -----------------------------------------------------------------------
// Submitter
// -----------------------------------------------------------------------

/// Submits randomly sized pods every tick.
#[derive(Debug)]
pub struct RandomSubmitter {
    rng: StdRng,
    pods_per_tick: u32,
    name_prefix: String,
    cpu: (u64, u64),
    memory: (u64, u64),
    priorities: Vec<i32>,
    submitted: u64,
}

impl RandomSubmitter {
    /// Build a submitter from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Submitter`] if a range is malformed or empty,
    /// or no priorities are configured.
    pub fn from_config(config: &SubmitterConfig) -> Result<Self, EngineError> {
        if config.priorities.is_empty() {
            return Err(EngineError::Submitter {
                message: String::from("at least one priority is required"),
            });
        }

        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        info!(
            seed = config.seed,
            pods_per_tick = config.pods_per_tick,
            cpu_min = config.cpu.min,
            cpu_max = config.cpu.max,
            memory_min = config.memory.min,
            memory_max = config.memory.max,
            priorities = ?config.priorities,
            "Random submitter configured"
        );

        Ok(Self {
            rng,
            pods_per_tick: config.pods_per_tick,
            name_prefix: config.name_prefix.clone(),
            cpu: config.cpu.parse(CPU)?,
            memory: config.memory.parse(MEMORY)?,
            priorities: config.priorities.clone(),
            submitted: 0,
        })
    }

    fn next_pod(&mut self) -> Pod {
        let demand = ResourceList::new()
            .with(CPU, self.rng.random_range(self.cpu.0..=self.cpu.1))
            .with(MEMORY, self.rng.random_range(self.memory.0..=self.memory.1));
        let index = self.rng.random_range(0..self.priorities.len());
        let priority = self.priorities.get(index).copied().unwrap_or_default();

        let name = format!("{}-{}", self.name_prefix, self.submitted);
        self.submitted = self.submitted.saturating_add(1);
        Pod::new(name, demand, priority)
    }
}

impl Submitter for RandomSubmitter {
    fn name(&self) -> &'static str {
        "random"
    }

    fn submit(&mut self, clock: &Clock, nodes: &[NodeSnapshot]) -> Result<Vec<Pod>, SubmitterError> {
        let pods: Vec<Pod> = (0..self.pods_per_tick).map(|_| self.next_pod()).collect();
        debug!(clock = %clock, nodes = nodes.len(), pods = pods.len(), "Random workload generated");
        Ok(pods)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn clock() -> Clock {
        Clock::parse_rfc3339("2019-01-01T00:00:00Z").unwrap()
    }

    fn seeded(seed: u64) -> SubmitterConfig {
        SubmitterConfig {
            seed: Some(seed),
            pods_per_tick: 3,
            priorities: vec![1, 5, 10],
            ..SubmitterConfig::default()
        }
    }

    #[test]
    fn same_seed_same_workload() {
        let mut a = RandomSubmitter::from_config(&seeded(7)).unwrap();
        let mut b = RandomSubmitter::from_config(&seeded(7)).unwrap();

        for _ in 0..5 {
            let left = a.submit(&clock(), &[]).unwrap();
            let right = b.submit(&clock(), &[]).unwrap();
            let shape = |pods: &[Pod]| {
                pods.iter()
                    .map(|p| (p.name.clone(), p.demand.clone(), p.priority))
                    .collect::<Vec<_>>()
            };
            assert_eq!(shape(&left), shape(&right));
        }
    }

    #[test]
    fn demands_stay_in_range() {
        let mut submitter = RandomSubmitter::from_config(&seeded(1)).unwrap();
        for _ in 0..50 {
            for pod in submitter.submit(&clock(), &[]).unwrap() {
                let cpu = pod.demand.get(CPU);
                let memory = pod.demand.get(MEMORY);
                assert!((100..=1000).contains(&cpu), "cpu {cpu}");
                assert!((67_108_864..=1_073_741_824).contains(&memory), "memory {memory}");
                assert!([1, 5, 10].contains(&pod.priority));
            }
        }
    }

    #[test]
    fn names_are_sequential() {
        let mut submitter = RandomSubmitter::from_config(&seeded(3)).unwrap();
        let first = submitter.submit(&clock(), &[]).unwrap();
        let second = submitter.submit(&clock(), &[]).unwrap();
        let names: Vec<String> = first.into_iter().chain(second).map(|p| p.name).collect();
        assert_eq!(names, vec!["pod-0", "pod-1", "pod-2", "pod-3", "pod-4", "pod-5"]);
    }

    #[test]
    fn empty_range_rejected() {
        let config = SubmitterConfig {
            cpu: QuantityRange {
                min: String::from("2"),
                max: String::from("500m"),
            },
            ..SubmitterConfig::default()
        };
        assert!(matches!(
            RandomSubmitter::from_config(&config),
            Err(EngineError::Submitter { .. })
        ));
    }

    #[test]
    fn no_priorities_rejected() {
        let config = SubmitterConfig {
            priorities: Vec::new(),
            ..SubmitterConfig::default()
        };
        assert!(RandomSubmitter::from_config(&config).is_err());
    }

    #[test]
    fn section_read_from_full_config() {
        let yaml = r#"
tick: 10
submitter:
  seed: 99
  pods_per_tick: 2
  cpu: { min: "250m", max: "500m" }
  priorities: [0, 100]
"#;
        let config = SubmitterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.pods_per_tick, 2);
        assert_eq!(config.cpu.min, "250m");
        assert_eq!(config.memory, default_memory());
        assert_eq!(config.priorities, vec![0, 100]);
    }

    #[test]
    fn missing_section_uses_defaults() {
        let config = SubmitterConfig::from_yaml("tick: 5\n").unwrap();
        assert_eq!(config, SubmitterConfig::default());
    }
}
