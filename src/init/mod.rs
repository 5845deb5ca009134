//! First-run scaffolding for a stackyard project.
//!
//! `stackyard init` lays out the directories a convergence run expects:
//!
//! ```text
//! stackyard.toml       # Settings with every default spelled out
//! stacks/              # Stack catalog
//! ├── infra/
//! ├── db/
//! └── app/
//! .stackyard/env/      # Materialized override files
//! ```
//!
//! Running it again only fills in what is missing.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::catalog::DEFAULT_KINDS;
use crate::settings::{Settings, StackyardToml};

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub catalog_root: PathBuf,
    pub overrides_dir: PathBuf,
    /// Paths that did not exist before this call
    pub created: Vec<PathBuf>,
}

impl InitResult {
    /// `true` when nothing had to be created.
    pub fn already_initialized(&self) -> bool {
        self.created.is_empty()
    }
}

/// Create the catalog, its kind directories, the overrides directory and a
/// default `stackyard.toml`. Existing files are never touched.
pub fn init_project(settings: &Settings) -> Result<InitResult> {
    let catalog_root = settings.catalog_root();
    let overrides_dir = settings.overrides_dir();
    let mut created = Vec::new();

    let settings_file = settings.settings_file();
    if !settings_file.exists() {
        let content = StackyardToml::default().to_toml_string()?;
        std::fs::write(&settings_file, content).with_context(|| {
            format!("Failed to create settings file: {}", settings_file.display())
        })?;
        created.push(settings_file);
    }

    ensure_dir(&catalog_root, &mut created)?;
    for kind in DEFAULT_KINDS {
        ensure_dir(&catalog_root.join(kind), &mut created)?;
    }
    ensure_dir(&overrides_dir, &mut created)?;

    Ok(InitResult {
        catalog_root,
        overrides_dir,
        created,
    })
}

fn ensure_dir(dir: &Path, created: &mut Vec<PathBuf>) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    created.push(dir.to_path_buf());
    Ok(())
}
