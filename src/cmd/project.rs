//! Project scaffolding (`stackyard init`).

use anyhow::Result;
use std::path::PathBuf;

use stackyard::init::init_project;
use stackyard::settings::Settings;

pub fn cmd_init(project_dir: PathBuf) -> Result<()> {
    let settings = Settings::new(project_dir)?;
    let result = init_project(&settings)?;

    if result.already_initialized() {
        println!(
            "Stackyard project already initialized at {}",
            settings.project_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(());
    }

    println!(
        "Initialized stackyard project at {}",
        settings.project_dir.display()
    );
    println!();
    println!("Created:");
    for path in &result.created {
        let shown = path.strip_prefix(&settings.project_dir).unwrap_or(path);
        println!("  {}", shown.display());
    }
    println!();
    println!("Next steps:");
    println!(
        "  1. Add stack definitions as {}/<kind>/<name>.{}",
        result.catalog_root.display(),
        settings.definition_ext()
    );
    println!("  2. Export CLUSTER_CONFIG with the base64 cluster configuration");
    println!("  3. Run `stackyard converge`");

    Ok(())
}
