//! One convergence pass (`stackyard converge`).

use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;

use stackyard::converge::{ConvergeOptions, Converger};
use stackyard::events::RunEvent;
use stackyard::runtime::DockerCli;
use stackyard::settings::{CliOverrides, Settings};
use stackyard::ui::{OutputMode, StatusUI};

use super::super::{Cli, ConvergeArgs};

pub async fn cmd_converge(project_dir: PathBuf, cli: &Cli, args: &ConvergeArgs) -> Result<ExitCode> {
    let settings = Settings::with_cli_args(
        project_dir,
        CliOverrides {
            network: args.network.clone(),
            advertise_addr: args.advertise_addr,
            docker_bin: args.docker_bin.clone(),
            max_parallel: args.max_parallel,
            call_timeout_secs: args.call_timeout,
            config_env: args.config_env.clone(),
        },
    )?;

    let warnings = settings.validate();
    if !warnings.is_empty() {
        anyhow::bail!("Invalid settings:\n  - {}", warnings.join("\n  - "));
    }

    // Non-UTF-8 content is passed through lossily and fails base64 decoding.
    let raw = std::env::var_os(settings.config_env()).map(|v| v.to_string_lossy().into_owned());

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let ui = Arc::new(StatusUI::new(mode, cli.verbose));

    if mode == OutputMode::Text {
        println!();
        println!(
            "{}",
            console::style(if args.dry_run {
                "Stackyard convergence (dry run)"
            } else {
                "Stackyard convergence"
            })
            .bold()
            .cyan()
        );
        println!("─────────────────────────");
        println!("Catalog: {}", settings.catalog_root().display());
        println!("Network: {}", settings.network());
        println!("Max parallel: {}", settings.max_parallel());
        println!();
    }

    let runtime = DockerCli::new(settings.docker_bin(), settings.call_timeout())
        .with_registry_auth(settings.with_registry_auth());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();

    let ui_clone = ui.clone();
    let display_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            ui_clone.handle_event(&event);
        }
    });

    let converger = Converger::json(
        Arc::new(runtime),
        ConvergeOptions::from_settings(&settings, args.dry_run),
    )
    .with_event_channel(event_tx);

    let report = converger.run(raw.as_deref()).await;

    // Closes the channel so the display task drains and exits.
    drop(converger);
    let _ = display_handle.await;

    ui.print_report(&report)?;
    Ok(ExitCode::from(report.exit_code()))
}
