//! One convergence pass: decode → bootstrap → deploy → report.
//!
//! Bootstrap is a hard barrier. No stack is resolved, written or deployed
//! until the swarm and the shared network are confirmed.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapOptions, ClusterBootstrapper};
use crate::catalog::StackCatalog;
use crate::cluster::{ConfigDecoder, Decoded, DocumentParser, JsonDocumentParser};
use crate::deployer::{DeployOptions, StackDeployer};
use crate::events::RunEvent;
use crate::overrides::EnvOverrideWriter;
use crate::report::RunReport;
use crate::runtime::ClusterRuntime;
use crate::settings::Settings;

/// Everything a run needs besides the blob and the runtime.
#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    pub catalog_root: PathBuf,
    pub definition_ext: String,
    pub overrides_dir: PathBuf,
    pub network: String,
    pub advertise_addr: Option<Ipv4Addr>,
    pub max_parallel: usize,
    pub dry_run: bool,
}

impl ConvergeOptions {
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Self {
        Self {
            catalog_root: settings.catalog_root(),
            definition_ext: settings.definition_ext().to_string(),
            overrides_dir: settings.overrides_dir(),
            network: settings.network().to_string(),
            advertise_addr: settings.advertise_addr(),
            max_parallel: settings.max_parallel(),
            dry_run,
        }
    }
}

/// Drives a single run against a [`ClusterRuntime`].
pub struct Converger<P: DocumentParser> {
    decoder: ConfigDecoder<P>,
    runtime: Arc<dyn ClusterRuntime>,
    options: ConvergeOptions,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Converger<JsonDocumentParser> {
    /// A converger that parses the blob as JSON.
    pub fn json(runtime: Arc<dyn ClusterRuntime>, options: ConvergeOptions) -> Self {
        Self::new(ConfigDecoder::json(), runtime, options)
    }
}

impl<P: DocumentParser> Converger<P> {
    pub fn new(
        decoder: ConfigDecoder<P>,
        runtime: Arc<dyn ClusterRuntime>,
        options: ConvergeOptions,
    ) -> Self {
        Self {
            decoder,
            runtime,
            options,
            event_tx: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run once. Never fails: fatal problems become an aborted report.
    pub async fn run(&self, raw: Option<&str>) -> RunReport {
        let mut report = RunReport::start(self.options.dry_run);
        info!(run_id = %report.run_id, dry_run = self.options.dry_run, "starting convergence run");

        let config = match self.decoder.decode(raw) {
            Ok(Decoded::NoConfiguration) => {
                info!("no configuration supplied, nothing to do");
                self.emit(RunEvent::NoConfiguration);
                report.record_no_configuration();
                report.finish();
                return report;
            }
            Ok(Decoded::Config { config, warnings }) => {
                for warning in &warnings {
                    warn!(%warning, "configuration warning");
                    self.emit(RunEvent::ConfigWarning(warning.clone()));
                }
                report.record_warnings(warnings);
                config
            }
            Err(e) => {
                warn!(error = %e, "configuration could not be decoded");
                report.abort_configuration(&e);
                report.finish();
                return report;
            }
        };

        debug!(
            nodes = config.nodes.len(),
            stacks = config.stacks.len(),
            overrides = config.overrides.len(),
            "decoded cluster configuration"
        );

        let bootstrapper = ClusterBootstrapper::new(
            Arc::clone(&self.runtime),
            BootstrapOptions {
                network: self.options.network.clone(),
                advertise_addr: self.options.advertise_addr,
                dry_run: self.options.dry_run,
            },
        );
        match bootstrapper.ensure().await {
            Ok(bootstrap) => {
                self.emit(RunEvent::Bootstrapped(bootstrap.clone()));
                report.record_bootstrap(bootstrap);
            }
            Err(e) => {
                warn!(error = %e, "bootstrap failed");
                report.abort_bootstrap(&e);
                report.finish();
                return report;
            }
        }

        let mut deployer = StackDeployer::new(
            Arc::clone(&self.runtime),
            StackCatalog::new(&self.options.catalog_root, &self.options.definition_ext),
            EnvOverrideWriter::new(&self.options.overrides_dir),
            DeployOptions {
                max_parallel: self.options.max_parallel,
                dry_run: self.options.dry_run,
            },
        );
        if let Some(tx) = &self.event_tx {
            deployer = deployer.with_event_channel(tx.clone());
        }

        let records = deployer.deploy_all(&config).await;
        report.record_stacks(records);
        report.finish();

        let summary = report.summary();
        info!(
            total = summary.total,
            deployed = summary.deployed,
            failures = summary.failures(),
            "convergence run finished"
        );
        report
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
