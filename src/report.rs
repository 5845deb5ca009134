//! Run-level aggregation and the process exit signal.
//!
//! The report, not the individual steps, decides whether the run failed:
//! only a configuration decode failure or a bootstrap failure is fatal.
//! Stack-level failures are counted and reported but leave the exit code at
//! success.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::bootstrap::BootstrapReport;
use crate::cluster::DecodeWarning;
use crate::deployer::{StackOutcome, StackRecord};
use crate::errors::{BootstrapError, ConfigError};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_BOOTSTRAP_ERROR: u8 = 3;

/// Which stage stopped the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortStage {
    Configuration,
    Bootstrap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Abort {
    pub stage: AbortStage,
    pub cause: String,
}

/// Counts per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub deployed: usize,
    pub deploy_failed: usize,
    pub not_found: usize,
    pub invalid_reference: usize,
    /// Stacks deployed without their override file.
    pub degraded_overrides: usize,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.deploy_failed + self.not_found + self.invalid_reference
    }
}

/// One-word judgement of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    NothingToDo,
    FullyConverged,
    ConvergedWithFailures { failures: usize },
    Aborted { stage: AbortStage },
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// `false` when no configuration blob was supplied.
    pub configured: bool,
    pub warnings: Vec<DecodeWarning>,
    pub bootstrap: Option<BootstrapReport>,
    pub abort: Option<Abort>,
    pub stacks: Vec<StackRecord>,
}

impl RunReport {
    pub fn start(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            configured: true,
            warnings: Vec::new(),
            bootstrap: None,
            abort: None,
            stacks: Vec::new(),
        }
    }

    pub fn record_no_configuration(&mut self) {
        self.configured = false;
    }

    pub fn record_warnings(&mut self, warnings: Vec<DecodeWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn abort_configuration(&mut self, err: &ConfigError) {
        self.abort = Some(Abort {
            stage: AbortStage::Configuration,
            cause: err.to_string(),
        });
    }

    pub fn record_bootstrap(&mut self, report: BootstrapReport) {
        self.bootstrap = Some(report);
    }

    pub fn abort_bootstrap(&mut self, err: &BootstrapError) {
        self.abort = Some(Abort {
            stage: AbortStage::Bootstrap,
            cause: err.to_string(),
        });
    }

    pub fn record_stacks(&mut self, records: Vec<StackRecord>) {
        self.stacks.extend(records);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.stacks.len(),
            ..Default::default()
        };
        for record in &self.stacks {
            match record.outcome {
                StackOutcome::Deployed => summary.deployed += 1,
                StackOutcome::DeployFailed { .. } => summary.deploy_failed += 1,
                StackOutcome::NotFound { .. } => summary.not_found += 1,
                StackOutcome::InvalidReference { .. } => summary.invalid_reference += 1,
            }
            if record.override_error.is_some() {
                summary.degraded_overrides += 1;
            }
        }
        summary
    }

    pub fn verdict(&self) -> Verdict {
        if let Some(abort) = &self.abort {
            return Verdict::Aborted { stage: abort.stage };
        }
        if !self.configured {
            return Verdict::NothingToDo;
        }
        match self.summary().failures() {
            0 => Verdict::FullyConverged,
            failures => Verdict::ConvergedWithFailures { failures },
        }
    }

    /// Process exit code: non-zero only for fatal aborts.
    pub fn exit_code(&self) -> u8 {
        match &self.abort {
            None => EXIT_SUCCESS,
            Some(Abort {
                stage: AbortStage::Configuration,
                ..
            }) => EXIT_CONFIG_ERROR,
            Some(Abort {
                stage: AbortStage::Bootstrap,
                ..
            }) => EXIT_BOOTSTRAP_ERROR,
        }
    }

    pub fn headline(&self) -> String {
        let prefix = if self.dry_run { "dry run: " } else { "" };
        let text = match self.verdict() {
            Verdict::NothingToDo => "no configuration supplied, nothing to do".to_string(),
            Verdict::FullyConverged => "fully converged".to_string(),
            Verdict::ConvergedWithFailures { failures: 1 } => {
                "converged with 1 stack failure".to_string()
            }
            Verdict::ConvergedWithFailures { failures } => {
                format!("converged with {} stack failures", failures)
            }
            Verdict::Aborted { .. } => "aborted before stack processing".to_string(),
        };
        format!("{}{}", prefix, text)
    }

    /// Plain-text rendering of the whole report, without styling.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {}: {}", self.run_id, self.headline());

        if let Some(abort) = &self.abort {
            let _ = writeln!(out, "  cause: {}", abort.cause);
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "  warning: {}", warning);
        }

        if let Some(bootstrap) = &self.bootstrap {
            let _ = writeln!(out, "  swarm: {}", bootstrap.swarm.describe());
            let _ = writeln!(
                out,
                "  network {}: {}",
                bootstrap.network_name,
                bootstrap.network.describe()
            );
        }

        if self.configured && self.abort.is_none() {
            let s = self.summary();
            let _ = writeln!(
                out,
                "  stacks: {} total, {} deployed, {} failed, {} not found, {} invalid",
                s.total, s.deployed, s.deploy_failed, s.not_found, s.invalid_reference
            );
            if s.degraded_overrides > 0 {
                let _ = writeln!(
                    out,
                    "  {} stack(s) deployed without their override file",
                    s.degraded_overrides
                );
            }
            for record in self.stacks.iter().filter(|r| r.outcome.is_failure()) {
                let _ = writeln!(out, "    {}: {}", record.token, describe_outcome(&record.outcome));
            }
        }

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            #[serde(flatten)]
            report: &'a RunReport,
            summary: RunSummary,
            verdict: Verdict,
            exit_code: u8,
        }

        serde_json::to_string_pretty(&Document {
            report: self,
            summary: self.summary(),
            verdict: self.verdict(),
            exit_code: self.exit_code(),
        })
    }
}

pub fn describe_outcome(outcome: &StackOutcome) -> String {
    match outcome {
        StackOutcome::Deployed => "deployed".to_string(),
        StackOutcome::DeployFailed { reason } => format!("deploy failed: {}", reason),
        StackOutcome::NotFound { path } => format!("not found at {}", path.display()),
        StackOutcome::InvalidReference { reason } => format!("invalid reference: {}", reason),
    }
}
