//! Shared type definitions for the kubesim cluster scheduler simulator.
//!
//! # Modules
//!
//! - [`ids`] -- Pod identifiers and node names
//! - [`resources`] -- Resource vectors and Kubernetes quantity parsing
//! - [`pod`] -- Workload requests and their placement status

pub mod ids;
pub mod pod;
pub mod resources;

pub use ids::{NodeName, PodId};
pub use pod::{Pod, PodStatus};
pub use resources::{
    CPU, MEMORY, QuantityError, ResourceList, parse_quantity, parse_resource_list,
};
