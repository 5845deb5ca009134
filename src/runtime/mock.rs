//! In-memory [`ClusterRuntime`] double that records every call.

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use super::{ClusterRuntime, DeploymentUnit, SwarmState};
use crate::errors::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    SwarmState,
    LocalAddresses,
    InitSwarm(Ipv4Addr),
    ListNetworks,
    CreateNetwork(String),
    Deploy(DeploymentUnit),
}

impl Call {
    pub(crate) fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::InitSwarm(_) | Call::CreateNetwork(_) | Call::Deploy(_)
        )
    }
}

struct MockState {
    swarm: SwarmState,
    networks: Vec<String>,
    addresses: Vec<Ipv4Addr>,
    failing_deploys: HashSet<String>,
    fail_swarm_init: bool,
    fail_network_create: bool,
    fail_swarm_query: bool,
    fail_address_query: bool,
    fail_network_list: bool,
    /// Override file contents observed at deploy time, by deploy name.
    seen_overrides: Vec<(String, String)>,
}

pub(crate) struct MockRuntime {
    state: Mutex<MockState>,
    calls: Mutex<Vec<Call>>,
}

fn failure(command: &str) -> RuntimeError {
    RuntimeError::NonZeroExit {
        command: command.to_string(),
        code: 1,
        stderr: "scripted failure".to_string(),
    }
}

impl MockRuntime {
    /// A node with swarm inactive, no networks, and one LAN address.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                swarm: SwarmState::Inactive,
                networks: vec!["bridge".to_string(), "host".to_string()],
                addresses: vec![Ipv4Addr::new(192, 168, 1, 20)],
                failing_deploys: HashSet::new(),
                fail_swarm_init: false,
                fail_network_create: false,
                fail_swarm_query: false,
                fail_address_query: false,
                fail_network_list: false,
                seen_overrides: Vec::new(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A node that already has swarm active and the given network.
    pub(crate) fn converged(network: &str) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            state.swarm = SwarmState::Active;
            state.networks.push(network.to_string());
        }
        mock
    }

    pub(crate) fn with_swarm_state(self, swarm: SwarmState) -> Self {
        self.state.lock().unwrap().swarm = swarm;
        self
    }

    pub(crate) fn with_addresses(self, addresses: Vec<Ipv4Addr>) -> Self {
        self.state.lock().unwrap().addresses = addresses;
        self
    }

    pub(crate) fn failing_deploy(self, deploy_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deploys
            .insert(deploy_name.to_string());
        self
    }

    pub(crate) fn failing_swarm_init(self) -> Self {
        self.state.lock().unwrap().fail_swarm_init = true;
        self
    }

    pub(crate) fn failing_network_create(self) -> Self {
        self.state.lock().unwrap().fail_network_create = true;
        self
    }

    pub(crate) fn failing_swarm_query(self) -> Self {
        self.state.lock().unwrap().fail_swarm_query = true;
        self
    }

    pub(crate) fn failing_address_query(self) -> Self {
        self.state.lock().unwrap().fail_address_query = true;
        self
    }

    pub(crate) fn failing_network_list(self) -> Self {
        self.state.lock().unwrap().fail_network_list = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub(crate) fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_mutating)
            .collect()
    }

    pub(crate) fn deploys(&self) -> Vec<DeploymentUnit> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Deploy(unit) => Some(unit),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn seen_overrides(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().seen_overrides.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterRuntime for MockRuntime {
    async fn swarm_state(&self) -> Result<SwarmState, RuntimeError> {
        self.record(Call::SwarmState);
        let state = self.state.lock().unwrap();
        if state.fail_swarm_query {
            return Err(failure("docker info"));
        }
        Ok(state.swarm)
    }

    async fn local_ipv4_addresses(&self) -> Result<Vec<Ipv4Addr>, RuntimeError> {
        self.record(Call::LocalAddresses);
        let state = self.state.lock().unwrap();
        if state.fail_address_query {
            return Err(failure("hostname -I"));
        }
        Ok(state.addresses.clone())
    }

    async fn init_swarm(&self, advertise_addr: Ipv4Addr) -> Result<(), RuntimeError> {
        self.record(Call::InitSwarm(advertise_addr));
        let mut state = self.state.lock().unwrap();
        if state.fail_swarm_init {
            return Err(failure("docker swarm init"));
        }
        state.swarm = SwarmState::Active;
        Ok(())
    }

    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        self.record(Call::ListNetworks);
        let state = self.state.lock().unwrap();
        if state.fail_network_list {
            return Err(failure("docker network ls"));
        }
        Ok(state.networks.clone())
    }

    async fn create_overlay_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::CreateNetwork(name.to_string()));
        let mut state = self.state.lock().unwrap();
        if state.fail_network_create {
            return Err(failure("docker network create"));
        }
        state.networks.push(name.to_string());
        Ok(())
    }

    async fn deploy_stack(&self, unit: &DeploymentUnit) -> Result<(), RuntimeError> {
        self.record(Call::Deploy(unit.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(path) = &unit.override_path {
            let content = std::fs::read_to_string(path).unwrap_or_default();
            state
                .seen_overrides
                .push((unit.deploy_name.clone(), content));
        }
        if state.failing_deploys.contains(&unit.deploy_name) {
            return Err(failure("docker stack deploy"));
        }
        Ok(())
    }
}
