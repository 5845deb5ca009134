//! Status lines for a convergence run.
//!
//! Events arrive from the run over a channel and are printed one line each.
//! In JSON mode nothing is printed until the final report.

use console::{Term, style};
use std::io::Write as _;
use std::time::Duration;

use crate::bootstrap::{BootstrapReport, StepAction};
use crate::deployer::{StackOutcome, StackRecord};
use crate::events::RunEvent;
use crate::report::{RunReport, Verdict, describe_outcome};
use crate::ui::icons::{
    CHECK, CLUSTER, CROSS, FILE_NEW, NETWORK, RUNNING, SEARCH, SKIP, SPARKLE, WARN,
};

/// Output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Human-readable status lines and summary
    #[default]
    Text,
    /// A single JSON document on stdout
    Json,
}

/// Console renderer for run events and the final report.
pub struct StatusUI {
    mode: OutputMode,
    verbose: bool,
    term: Term,
}

impl StatusUI {
    pub fn new(mode: OutputMode, verbose: bool) -> Self {
        Self {
            mode,
            verbose,
            term: Term::stdout(),
        }
    }

    /// Handle a RunEvent.
    pub fn handle_event(&self, event: &RunEvent) {
        if self.mode == OutputMode::Json {
            return;
        }
        if let Some(line) = self.format_event(event) {
            let _ = writeln!(&self.term, "{}", line);
        }
    }

    fn format_event(&self, event: &RunEvent) -> Option<String> {
        match event {
            RunEvent::ConfigWarning(warning) => Some(format!(
                "{}{} {}",
                WARN,
                style("config:").yellow(),
                warning
            )),
            RunEvent::NoConfiguration => Some(format!(
                "{}{}",
                SKIP,
                style("No cluster configuration supplied, nothing to do").dim()
            )),
            RunEvent::Bootstrapped(report) => Some(format_bootstrap(report)),
            RunEvent::StackResolved {
                deploy_name,
                definition,
                override_path,
                ..
            } => {
                if !self.verbose {
                    return None;
                }
                let mut line = format!(
                    "  {}{} {}",
                    SEARCH,
                    style(deploy_name).cyan(),
                    style(definition.display()).dim()
                );
                if let Some(path) = override_path {
                    line.push_str(&format!(" {}{}", FILE_NEW, style(path.display()).dim()));
                }
                Some(line)
            }
            RunEvent::StackFinished { record, .. } => Some(format_record(record)),
        }
    }

    /// Print the final report: a styled summary on a terminal, the plain
    /// rendering when stdout is piped, or JSON in JSON mode.
    pub fn print_report(&self, report: &RunReport) -> anyhow::Result<()> {
        match self.mode {
            OutputMode::Json => {
                let json = report.to_json()?;
                writeln!(&self.term, "{}", json)?;
            }
            OutputMode::Text => {
                writeln!(&self.term)?;
                if self.term.is_term() {
                    write!(&self.term, "{}", format_summary(report))?;
                } else {
                    write!(&self.term, "{}", report.render())?;
                }
            }
        }
        Ok(())
    }
}

fn format_bootstrap(report: &BootstrapReport) -> String {
    let swarm = match (report.swarm, report.advertise_addr) {
        (StepAction::Created, Some(addr)) => format!("initialized on {}", addr),
        (StepAction::WouldCreate, Some(addr)) => format!("would initialize on {}", addr),
        (action, _) => action.describe().to_string(),
    };
    format!(
        "{}swarm {}\n{}network {} {}",
        CLUSTER,
        style(swarm).green(),
        NETWORK,
        style(&report.network_name).cyan(),
        style(report.network.describe()).green()
    )
}

fn format_record(record: &StackRecord) -> String {
    let name = record.deploy_name.as_deref().unwrap_or(&record.token);
    let mut line = match &record.outcome {
        StackOutcome::Deployed if record.dry_run => format!(
            "  {}{} {}",
            RUNNING,
            style(name).cyan(),
            style("would deploy").dim()
        ),
        StackOutcome::Deployed => format!(
            "  {}{} {}",
            CHECK,
            style(name).green().bold(),
            style("deployed").green()
        ),
        StackOutcome::DeployFailed { .. } => format!(
            "  {}{} {}",
            CROSS,
            style(name).red().bold(),
            style(describe_outcome(&record.outcome)).red()
        ),
        StackOutcome::NotFound { .. } | StackOutcome::InvalidReference { .. } => format!(
            "  {}{} {}",
            WARN,
            style(&record.token).yellow().bold(),
            style(describe_outcome(&record.outcome)).yellow()
        ),
    };
    if let Some(err) = &record.override_error {
        line.push_str(&format!(" {}", style(format!("(override skipped: {})", err)).dim()));
    }
    line
}

fn format_summary(report: &RunReport) -> String {
    let mut out = format!("{}\n", format_headline(report));
    if let Some(abort) = &report.abort {
        out.push_str(&format!("  {}\n", style(&abort.cause).red()));
    }
    if report.configured && report.abort.is_none() {
        let s = report.summary();
        out.push_str(&format!(
            "  {} stacks: {} deployed, {} failed, {} not found, {} invalid ({})\n",
            s.total,
            style(s.deployed).green(),
            style(s.deploy_failed).red(),
            style(s.not_found).yellow(),
            style(s.invalid_reference).yellow(),
            format_elapsed(report)
        ));
        if s.degraded_overrides > 0 {
            out.push_str(&format!(
                "  {}{} stack(s) deployed without their override file\n",
                WARN, s.degraded_overrides
            ));
        }
    }
    out
}

fn format_headline(report: &RunReport) -> String {
    let headline = report.headline();
    match report.verdict() {
        Verdict::FullyConverged => format!("{}{}", SPARKLE, style(headline).green().bold()),
        Verdict::NothingToDo => format!("{}{}", CHECK, style(headline).dim()),
        Verdict::ConvergedWithFailures { .. } => {
            format!("{}{}", WARN, style(headline).yellow().bold())
        }
        Verdict::Aborted { .. } => format!("{}{}", CROSS, style(headline).red().bold()),
    }
}

fn format_elapsed(report: &RunReport) -> String {
    let elapsed = report
        .finished_at
        .and_then(|end| (end - report.started_at).to_std().ok())
        .unwrap_or_default();
    format_duration(elapsed)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}
