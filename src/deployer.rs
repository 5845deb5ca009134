//! Per-stack deployment with failure isolation.
//!
//! Every entry of `stacks` yields exactly one [`StackRecord`], in input
//! order, no matter what happens to the entries around it.
//!
//! Work is split in two passes:
//! - Preparation (parse, resolve, write overrides) runs sequentially, so
//!   override writes never race.
//! - Deploys start in input order and run at most `max_parallel` at a time.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::catalog::{StackCatalog, StackReference};
use crate::cluster::{ClusterConfig, StackOverrideSpec};
use crate::events::RunEvent;
use crate::overrides::EnvOverrideWriter;
use crate::runtime::{ClusterRuntime, DeploymentUnit};

/// Final outcome for one `stacks` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StackOutcome {
    Deployed,
    DeployFailed { reason: String },
    NotFound { path: PathBuf },
    InvalidReference { reason: String },
}

impl StackOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, StackOutcome::Deployed)
    }
}

/// Everything the report needs to know about one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRecord {
    /// The token exactly as it appeared in `stacks`.
    pub token: String,
    /// `kind_name`, once the token parsed.
    pub deploy_name: Option<String>,
    pub outcome: StackOutcome,
    /// Override file handed to the deploy call, if any.
    pub override_path: Option<PathBuf>,
    /// Set when the override file could not be written and the stack was
    /// deployed without it.
    pub override_error: Option<String>,
    /// The deploy call was skipped because this is a dry run.
    pub dry_run: bool,
}

impl StackRecord {
    fn unresolved(token: &str, deploy_name: Option<String>, outcome: StackOutcome) -> Self {
        Self {
            token: token.to_string(),
            deploy_name,
            outcome,
            override_path: None,
            override_error: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Upper bound on concurrent deploy calls. Clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub max_parallel: usize,
    pub dry_run: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            dry_run: false,
        }
    }
}

/// A resolved entry waiting for its deploy call.
struct Pending {
    index: usize,
    unit: DeploymentUnit,
    record: StackRecord,
}

enum Prepared {
    Done(StackRecord),
    Ready(Pending),
}

/// Resolves, materializes and deploys each stack reference.
pub struct StackDeployer {
    runtime: Arc<dyn ClusterRuntime>,
    catalog: StackCatalog,
    writer: EnvOverrideWriter,
    options: DeployOptions,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl StackDeployer {
    pub fn new(
        runtime: Arc<dyn ClusterRuntime>,
        catalog: StackCatalog,
        writer: EnvOverrideWriter,
        options: DeployOptions,
    ) -> Self {
        Self {
            runtime,
            catalog,
            writer,
            options,
            event_tx: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Process every entry of `config.stacks`; returns one record per entry,
    /// in input order.
    pub async fn deploy_all(&self, config: &ClusterConfig) -> Vec<StackRecord> {
        let mut records: Vec<Option<StackRecord>> = vec![None; config.stacks.len()];
        let mut pending = Vec::new();

        for (index, token) in config.stacks.iter().enumerate() {
            match self.prepare(index, token, config) {
                Prepared::Done(record) => {
                    self.emit(RunEvent::StackFinished {
                        index,
                        record: record.clone(),
                    });
                    records[index] = Some(record);
                }
                Prepared::Ready(entry) => pending.push(entry),
            }
        }

        let semaphore = Arc::new(Semaphore::new(
            self.options.max_parallel.clamp(1, Semaphore::MAX_PERMITS),
        ));
        let mut tasks = JoinSet::new();

        for Pending {
            index,
            unit,
            mut record,
        } in pending
        {
            // Placeholder until the task reports back; only survives if the
            // task panics.
            records[index] = Some(StackRecord {
                outcome: StackOutcome::DeployFailed {
                    reason: "deploy task did not complete".to_string(),
                },
                ..record.clone()
            });

            // Acquiring here, not inside the task, keeps start order equal
            // to input order.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let runtime = Arc::clone(&self.runtime);
            let dry_run = self.options.dry_run;

            tasks.spawn(async move {
                let _permit = permit;
                record.outcome = if dry_run {
                    StackOutcome::Deployed
                } else {
                    match runtime.deploy_stack(&unit).await {
                        Ok(()) => StackOutcome::Deployed,
                        Err(e) => StackOutcome::DeployFailed {
                            reason: e.to_string(),
                        },
                    }
                };
                (index, record)
            });

            self.drain_finished(&mut tasks, &mut records);
        }

        while let Some(joined) = tasks.join_next().await {
            self.store_finished(joined, &mut records);
        }

        records.into_iter().flatten().collect()
    }

    /// Collect any tasks that already completed, without waiting.
    fn drain_finished(
        &self,
        tasks: &mut JoinSet<(usize, StackRecord)>,
        records: &mut [Option<StackRecord>],
    ) {
        while let Some(joined) = tasks.try_join_next() {
            self.store_finished(joined, records);
        }
    }

    fn store_finished(
        &self,
        joined: Result<(usize, StackRecord), tokio::task::JoinError>,
        records: &mut [Option<StackRecord>],
    ) {
        match joined {
            Ok((index, record)) => {
                match &record.outcome {
                    StackOutcome::Deployed if record.dry_run => {
                        info!(token = %record.token, "dry run: deploy skipped")
                    }
                    StackOutcome::Deployed => info!(token = %record.token, "deployed"),
                    StackOutcome::DeployFailed { reason } => {
                        warn!(token = %record.token, %reason, "deploy failed")
                    }
                    _ => {}
                }
                self.emit(RunEvent::StackFinished {
                    index,
                    record: record.clone(),
                });
                records[index] = Some(record);
            }
            Err(e) => error!(error = %e, "deploy task failed to complete"),
        }
    }

    /// Parse, resolve and materialize overrides for one entry.
    fn prepare(&self, index: usize, token: &str, config: &ClusterConfig) -> Prepared {
        let reference = match StackReference::parse(token) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(token, reason = %e.reason, "invalid stack reference");
                return Prepared::Done(StackRecord::unresolved(
                    token,
                    None,
                    StackOutcome::InvalidReference { reason: e.reason },
                ));
            }
        };
        let deploy_name = reference.deploy_name();

        // A miss must not touch the override directory.
        let definition = match self.catalog.resolve(&reference) {
            Ok(definition) => definition,
            Err(miss) => {
                warn!(token, path = %miss.path.display(), "stack definition not found");
                return Prepared::Done(StackRecord::unresolved(
                    token,
                    Some(deploy_name),
                    StackOutcome::NotFound { path: miss.path },
                ));
            }
        };

        let empty = StackOverrideSpec::default();
        let spec = config.overrides_for(&reference.name).unwrap_or(&empty);
        let (override_path, override_error) = self.materialize(&reference, spec);

        let unit = DeploymentUnit::new(&definition, override_path.clone());
        self.emit(RunEvent::StackResolved {
            index,
            deploy_name: unit.deploy_name.clone(),
            definition: unit.definition_path.clone(),
            override_path: override_path.clone(),
        });

        Prepared::Ready(Pending {
            index,
            unit,
            record: StackRecord {
                token: token.to_string(),
                deploy_name: Some(deploy_name),
                outcome: StackOutcome::Deployed,
                override_path,
                override_error,
                dry_run: self.options.dry_run,
            },
        })
    }

    /// Write-best-effort: a failed write degrades to "no override" and is
    /// recorded, it never fails the stack.
    fn materialize(
        &self,
        reference: &StackReference,
        spec: &StackOverrideSpec,
    ) -> (Option<PathBuf>, Option<String>) {
        if self.options.dry_run {
            let path = (!spec.is_empty()).then(|| self.writer.override_path(&reference.name));
            return (path, None);
        }

        match self.writer.write(&reference.name, spec) {
            Ok(path) => (path, None),
            Err(e) => {
                warn!(stack = %reference, error = %e, "deploying without override file");
                (None, Some(e.to_string()))
            }
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            // A dropped listener only loses progress output.
            let _ = tx.send(event);
        }
    }
}
