//! The container runtime seam.
//!
//! Everything stackyard asks of the cluster goes through [`ClusterRuntime`].
//! Real implementation: [`DockerCli`]. Test double: `mock::MockRuntime`.

mod docker;
#[cfg(test)]
pub(crate) mod mock;

pub use docker::DockerCli;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::StackDefinition;
use crate::errors::RuntimeError;

/// Local swarm membership, as reported by `docker info` (`LocalNodeState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmState {
    Inactive,
    Pending,
    Active,
    Error,
    Locked,
}

impl fmt::Display for SwarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmState::Inactive => write!(f, "inactive"),
            SwarmState::Pending => write!(f, "pending"),
            SwarmState::Active => write!(f, "active"),
            SwarmState::Error => write!(f, "error"),
            SwarmState::Locked => write!(f, "locked"),
        }
    }
}

impl FromStr for SwarmState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inactive" => Ok(SwarmState::Inactive),
            "pending" => Ok(SwarmState::Pending),
            "active" => Ok(SwarmState::Active),
            "error" => Ok(SwarmState::Error),
            "locked" => Ok(SwarmState::Locked),
            other => Err(format!("unknown swarm state '{}'", other)),
        }
    }
}

/// A fully resolved stack ready to hand to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentUnit {
    /// `kind_name`
    pub deploy_name: String,
    pub definition_path: PathBuf,
    /// Present only when the stack has a non-empty override file.
    pub override_path: Option<PathBuf>,
}

impl DeploymentUnit {
    pub fn new(definition: &StackDefinition, override_path: Option<PathBuf>) -> Self {
        Self {
            deploy_name: definition.reference.deploy_name(),
            definition_path: definition.path.clone(),
            override_path,
        }
    }
}

/// Operations stackyard needs from the container runtime.
///
/// Implementations own their per-call timeout; expiry is reported as
/// [`RuntimeError::Timeout`] from the call that ran out of time.
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    /// Current swarm membership of the local node.
    async fn swarm_state(&self) -> Result<SwarmState, RuntimeError>;

    /// IPv4 addresses of the local host, in interface order.
    async fn local_ipv4_addresses(&self) -> Result<Vec<Ipv4Addr>, RuntimeError>;

    /// Initialize a new swarm advertising `advertise_addr`.
    async fn init_swarm(&self, advertise_addr: Ipv4Addr) -> Result<(), RuntimeError>;

    /// Names of all networks known to the local node.
    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError>;

    /// Create an attachable overlay network.
    async fn create_overlay_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// Create or update a stack. Repeated calls with the same deploy name
    /// update in place.
    async fn deploy_stack(&self, unit: &DeploymentUnit) -> Result<(), RuntimeError>;
}
