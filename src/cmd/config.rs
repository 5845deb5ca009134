//! Settings view and validation commands (`stackyard config`).

use anyhow::Result;
use std::path::PathBuf;

use stackyard::settings::Settings;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: PathBuf, command: Option<ConfigCommands>) -> Result<()> {
    let settings = Settings::new(project_dir)?;
    let settings_file = settings.settings_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Stackyard Settings");
            println!("==================");
            println!();

            if settings_file.exists() {
                println!("Settings file: {}", settings_file.display());
            } else {
                println!("No stackyard.toml found at {}", settings_file.display());
                println!("Using default settings.");
            }
            println!();

            println!("Effective values (with env overrides):");
            println!("  catalog root = \"{}\"", settings.catalog_root().display());
            println!("  extension = \"{}\"", settings.definition_ext());
            println!("  overrides dir = \"{}\"", settings.overrides_dir().display());
            println!("  network = \"{}\"", settings.network());
            match settings.advertise_addr() {
                Some(addr) => println!("  advertise_addr = \"{}\"", addr),
                None => println!("  advertise_addr = (auto-detect)"),
            }
            println!("  docker_bin = \"{}\"", settings.docker_bin());
            println!("  max_parallel = {}", settings.max_parallel());
            println!("  call_timeout_secs = {}", settings.call_timeout().as_secs());
            println!("  with_registry_auth = {}", settings.with_registry_auth());
            println!("  config variable = {}", settings.config_env());
            println!();

            print_warnings(&settings.validate());
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating settings...");
            println!();

            if !settings_file.exists() {
                println!("No stackyard.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = settings.validate();
            if warnings.is_empty() {
                println!("Settings are valid.");
            } else {
                print_warnings(&warnings);
            }
            println!();
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("Settings warnings:");
    for warning in warnings {
        println!("  - {}", warning);
    }
}
