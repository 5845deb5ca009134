//! Cluster prerequisites: an active swarm and the shared overlay network.
//!
//! Both steps check before they mutate, so running against an already
//! converged cluster issues only queries. Either step failing is fatal for
//! the whole run.

use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::BootstrapError;
use crate::runtime::{ClusterRuntime, SwarmState};

/// What a bootstrap step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    AlreadyPresent,
    Created,
    /// Dry run: the resource is missing and would have been created.
    WouldCreate,
}

impl StepAction {
    pub fn describe(self) -> &'static str {
        match self {
            StepAction::AlreadyPresent => "already present",
            StepAction::Created => "created",
            StepAction::WouldCreate => "would be created",
        }
    }
}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub swarm: StepAction,
    /// Address the swarm was (or would be) initialized with.
    pub advertise_addr: Option<Ipv4Addr>,
    pub network: StepAction,
    pub network_name: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Name of the shared overlay network.
    pub network: String,
    /// Explicit advertise address; when unset the first non-loopback local
    /// IPv4 address is used.
    pub advertise_addr: Option<Ipv4Addr>,
    pub dry_run: bool,
}

/// Ensures swarm mode and the shared network exist, in that order.
pub struct ClusterBootstrapper {
    runtime: Arc<dyn ClusterRuntime>,
    options: BootstrapOptions,
}

impl ClusterBootstrapper {
    pub fn new(runtime: Arc<dyn ClusterRuntime>, options: BootstrapOptions) -> Self {
        Self { runtime, options }
    }

    pub async fn ensure(&self) -> Result<BootstrapReport, BootstrapError> {
        let (swarm, advertise_addr) = self.ensure_swarm().await?;
        let network = self.ensure_network().await?;

        Ok(BootstrapReport {
            swarm,
            advertise_addr,
            network,
            network_name: self.options.network.clone(),
        })
    }

    async fn ensure_swarm(&self) -> Result<(StepAction, Option<Ipv4Addr>), BootstrapError> {
        let state = self
            .runtime
            .swarm_state()
            .await
            .map_err(BootstrapError::SwarmQuery)?;

        match state {
            SwarmState::Active => {
                debug!("swarm already active");
                return Ok((StepAction::AlreadyPresent, None));
            }
            SwarmState::Inactive => {}
            other => return Err(BootstrapError::SwarmState(other.to_string())),
        }

        let addr = self.advertise_address().await?;

        if self.options.dry_run {
            info!(%addr, "dry run: would initialize swarm");
            return Ok((StepAction::WouldCreate, Some(addr)));
        }

        info!(%addr, "initializing swarm");
        self.runtime
            .init_swarm(addr)
            .await
            .map_err(|source| BootstrapError::SwarmInit { addr, source })?;
        Ok((StepAction::Created, Some(addr)))
    }

    async fn advertise_address(&self) -> Result<Ipv4Addr, BootstrapError> {
        if let Some(addr) = self.options.advertise_addr {
            return Ok(addr);
        }
        let addresses = self
            .runtime
            .local_ipv4_addresses()
            .await
            .map_err(BootstrapError::AddressQuery)?;
        first_advertisable(&addresses).ok_or(BootstrapError::NoAdvertiseAddress)
    }

    async fn ensure_network(&self) -> Result<StepAction, BootstrapError> {
        let name = &self.options.network;
        let networks = self
            .runtime
            .list_networks()
            .await
            .map_err(BootstrapError::NetworkQuery)?;

        if networks.iter().any(|n| n == name) {
            debug!(network = %name, "network already present");
            return Ok(StepAction::AlreadyPresent);
        }

        if self.options.dry_run {
            info!(network = %name, "dry run: would create overlay network");
            return Ok(StepAction::WouldCreate);
        }

        info!(network = %name, "creating attachable overlay network");
        self.runtime
            .create_overlay_network(name)
            .await
            .map_err(|source| BootstrapError::NetworkCreate {
                name: name.clone(),
                source,
            })?;
        Ok(StepAction::Created)
    }
}

/// First address that is neither loopback nor unspecified.
fn first_advertisable(addresses: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    addresses
        .iter()
        .copied()
        .find(|addr| !addr.is_loopback() && !addr.is_unspecified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::{Call, MockRuntime};

    const NETWORK: &str = "stackyard-net";

    fn options() -> BootstrapOptions {
        BootstrapOptions {
            network: NETWORK.to_string(),
            advertise_addr: None,
            dry_run: false,
        }
    }

    fn bootstrapper(mock: &Arc<MockRuntime>, options: BootstrapOptions) -> ClusterBootstrapper {
        ClusterBootstrapper::new(mock.clone(), options)
    }

    #[tokio::test]
    async fn test_fresh_node_is_bootstrapped() {
        let mock = Arc::new(MockRuntime::new());
        let report = bootstrapper(&mock, options()).ensure().await.unwrap();

        assert_eq!(report.swarm, StepAction::Created);
        assert_eq!(report.advertise_addr, Some(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(report.network, StepAction::Created);
        assert_eq!(
            mock.mutating_calls(),
            vec![
                Call::InitSwarm(Ipv4Addr::new(192, 168, 1, 20)),
                Call::CreateNetwork(NETWORK.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_run_issues_no_mutating_calls() {
        let mock = Arc::new(MockRuntime::new());
        let bootstrapper = bootstrapper(&mock, options());
        bootstrapper.ensure().await.unwrap();
        mock.clear_calls();

        let report = bootstrapper.ensure().await.unwrap();
        assert_eq!(report.swarm, StepAction::AlreadyPresent);
        assert_eq!(report.network, StepAction::AlreadyPresent);
        assert!(mock.mutating_calls().is_empty());
        assert_eq!(mock.calls(), vec![Call::SwarmState, Call::ListNetworks]);
    }

    #[tokio::test]
    async fn test_loopback_addresses_are_skipped() {
        let mock = Arc::new(MockRuntime::new().with_addresses(vec![
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::new(127, 0, 1, 1),
            Ipv4Addr::new(10, 0, 0, 5),
        ]));
        let report = bootstrapper(&mock, options()).ensure().await.unwrap();
        assert_eq!(report.advertise_addr, Some(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[tokio::test]
    async fn test_explicit_advertise_address_wins() {
        let mock = Arc::new(MockRuntime::new());
        let mut options = options();
        options.advertise_addr = Some(Ipv4Addr::new(172, 16, 0, 9));
        let report = bootstrapper(&mock, options).ensure().await.unwrap();

        assert_eq!(report.advertise_addr, Some(Ipv4Addr::new(172, 16, 0, 9)));
        assert!(!mock.calls().contains(&Call::LocalAddresses));
    }

    #[tokio::test]
    async fn test_no_address_is_fatal_before_network() {
        let mock = Arc::new(MockRuntime::new().with_addresses(vec![Ipv4Addr::LOCALHOST]));
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();

        assert!(matches!(err, BootstrapError::NoAdvertiseAddress));
        assert!(!mock.calls().contains(&Call::ListNetworks));
    }

    #[tokio::test]
    async fn test_swarm_init_failure_is_fatal() {
        let mock = Arc::new(MockRuntime::new().failing_swarm_init());
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        assert!(matches!(err, BootstrapError::SwarmInit { .. }));
        assert!(!mock.calls().contains(&Call::ListNetworks));
    }

    #[tokio::test]
    async fn test_network_create_failure_is_fatal() {
        let mock = Arc::new(MockRuntime::converged("other-net").failing_network_create());
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        match err {
            BootstrapError::NetworkCreate { name, .. } => assert_eq!(name, NETWORK),
            other => panic!("Expected NetworkCreate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_failures_are_fatal_and_never_mutate() {
        let mock = Arc::new(MockRuntime::new().failing_swarm_query());
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        assert!(matches!(err, BootstrapError::SwarmQuery(_)));
        assert_eq!(mock.calls(), vec![Call::SwarmState]);

        let mock = Arc::new(MockRuntime::new().failing_address_query());
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        assert!(matches!(err, BootstrapError::AddressQuery(_)));
        assert_eq!(mock.calls(), vec![Call::SwarmState, Call::LocalAddresses]);

        let mock = Arc::new(MockRuntime::converged("other-net").failing_network_list());
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        assert!(matches!(err, BootstrapError::NetworkQuery(_)));
        assert_eq!(mock.calls(), vec![Call::SwarmState, Call::ListNetworks]);
    }

    #[tokio::test]
    async fn test_locked_swarm_is_fatal() {
        let mock = Arc::new(MockRuntime::new().with_swarm_state(SwarmState::Locked));
        let err = bootstrapper(&mock, options()).ensure().await.unwrap_err();
        assert!(matches!(err, BootstrapError::SwarmState(ref s) if s == "locked"));
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let mock = Arc::new(MockRuntime::new());
        let mut options = options();
        options.dry_run = true;
        let report = bootstrapper(&mock, options).ensure().await.unwrap();

        assert_eq!(report.swarm, StepAction::WouldCreate);
        assert_eq!(report.network, StepAction::WouldCreate);
        assert!(mock.mutating_calls().is_empty());
    }

    #[test]
    fn test_first_advertisable() {
        assert_eq!(first_advertisable(&[]), None);
        assert_eq!(
            first_advertisable(&[Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(10, 1, 2, 3)]),
            Some(Ipv4Addr::new(10, 1, 2, 3))
        );
    }
}
