//! Tool settings, read from `stackyard.toml` in the project directory.
//!
//! Layered as file → environment → CLI. Every field is optional in the file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [catalog]
//! root = "stacks"
//! extension = "yml"
//!
//! [overrides]
//! dir = ".stackyard/env"
//!
//! [cluster]
//! network = "stackyard-net"
//! advertise_addr = "10.0.0.5"
//! docker_bin = "docker"
//!
//! [deploy]
//! max_parallel = 1
//! call_timeout_secs = 300
//! with_registry_auth = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "stackyard.toml";

/// Environment variable that carries the base64 cluster configuration.
pub const DEFAULT_CONFIG_ENV: &str = "CLUSTER_CONFIG";

/// Environment override for the docker binary.
pub const DOCKER_BIN_ENV: &str = "STACKYARD_DOCKER";

/// Upper bound for `deploy.max_parallel`.
pub const MAX_PARALLEL_LIMIT: usize = 64;

/// Where stack definitions live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default = "default_catalog_root")]
    pub root: PathBuf,
    /// Definition file extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_catalog_root() -> PathBuf {
    PathBuf::from("stacks")
}

fn default_extension() -> String {
    "yml".to_string()
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            root: default_catalog_root(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridesSection {
    #[serde(default = "default_overrides_dir")]
    pub dir: PathBuf,
}

fn default_overrides_dir() -> PathBuf {
    PathBuf::from(".stackyard/env")
}

impl Default for OverridesSection {
    fn default() -> Self {
        Self {
            dir: default_overrides_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Shared attachable overlay network
    #[serde(default = "default_network")]
    pub network: String,
    /// Fixed swarm advertise address (auto-detected when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_addr: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_bin: Option<String>,
}

fn default_network() -> String {
    "stackyard-net".to_string()
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            advertise_addr: None,
            docker_bin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySection {
    /// Concurrent `stack deploy` calls
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Timeout applied to every runtime call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default)]
    pub with_registry_auth: bool,
}

fn default_max_parallel() -> usize {
    1
}

fn default_call_timeout_secs() -> u64 {
    300
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            call_timeout_secs: default_call_timeout_secs(),
            with_registry_auth: false,
        }
    }
}

/// Contents of `stackyard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackyardToml {
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub overrides: OverridesSection,
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub deploy: DeploySection,
}

impl StackyardToml {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse stackyard.toml")
    }

    /// Load `stackyard.toml` from the project directory, or defaults when
    /// the file doesn't exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(SETTINGS_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }

    /// Docker binary: environment wins over the file.
    pub fn docker_bin(&self) -> String {
        std::env::var(DOCKER_BIN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.cluster.docker_bin.clone())
            .unwrap_or_else(|| "docker".to_string())
    }

    /// Validate the settings and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        validate_values(
            self.deploy.max_parallel,
            self.deploy.call_timeout_secs,
            &self.cluster.network,
            &self.catalog.extension,
        )
    }
}

fn validate_values(
    max_parallel: usize,
    call_timeout_secs: u64,
    network: &str,
    extension: &str,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if max_parallel == 0 {
        warnings.push("Invalid max_parallel 0: must be at least 1".to_string());
    } else if max_parallel > MAX_PARALLEL_LIMIT {
        warnings.push(format!(
            "Invalid max_parallel {}: must be at most {}",
            max_parallel, MAX_PARALLEL_LIMIT
        ));
    }
    if call_timeout_secs == 0 {
        warnings.push("Invalid call_timeout_secs 0: must be at least 1".to_string());
    }
    if network.trim().is_empty() {
        warnings.push("Network name must not be empty".to_string());
    }
    if extension.trim().is_empty() {
        warnings.push("Catalog extension must not be empty".to_string());
    } else if extension.starts_with('.') {
        warnings.push(format!(
            "Catalog extension '{}' should not start with a dot",
            extension
        ));
    }

    warnings
}

/// Values given on the command line; each one beats the file and the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub network: Option<String>,
    pub advertise_addr: Option<Ipv4Addr>,
    pub docker_bin: Option<String>,
    pub max_parallel: Option<usize>,
    pub call_timeout_secs: Option<u64>,
    pub config_env: Option<String>,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub toml: StackyardToml,
    pub cli: CliOverrides,
}

impl Settings {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory: {}", project_dir.display()))?;
        let toml = StackyardToml::load_or_default(&project_dir)?;

        Ok(Self {
            project_dir,
            toml,
            cli: CliOverrides::default(),
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, cli: CliOverrides) -> Result<Self> {
        let mut settings = Self::new(project_dir)?;
        settings.cli = cli;
        Ok(settings)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.project_dir.join(SETTINGS_FILE)
    }

    pub fn catalog_root(&self) -> PathBuf {
        self.resolve_path(&self.toml.catalog.root)
    }

    pub fn definition_ext(&self) -> &str {
        &self.toml.catalog.extension
    }

    pub fn overrides_dir(&self) -> PathBuf {
        self.resolve_path(&self.toml.overrides.dir)
    }

    pub fn network(&self) -> &str {
        self.cli
            .network
            .as_deref()
            .unwrap_or(&self.toml.cluster.network)
    }

    pub fn advertise_addr(&self) -> Option<Ipv4Addr> {
        self.cli.advertise_addr.or(self.toml.cluster.advertise_addr)
    }

    pub fn docker_bin(&self) -> String {
        self.cli
            .docker_bin
            .clone()
            .unwrap_or_else(|| self.toml.docker_bin())
    }

    pub fn max_parallel(&self) -> usize {
        self.cli.max_parallel.unwrap_or(self.toml.deploy.max_parallel)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(
            self.cli
                .call_timeout_secs
                .unwrap_or(self.toml.deploy.call_timeout_secs),
        )
    }

    pub fn with_registry_auth(&self) -> bool {
        self.toml.deploy.with_registry_auth
    }

    pub fn config_env(&self) -> &str {
        self.cli.config_env.as_deref().unwrap_or(DEFAULT_CONFIG_ENV)
    }

    /// Validate the effective values, CLI overrides included.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = validate_values(
            self.max_parallel(),
            self.call_timeout().as_secs(),
            self.network(),
            self.definition_ext(),
        );
        if self.config_env().trim().is_empty() {
            warnings.push("Configuration variable name must not be empty".to_string());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let toml = StackyardToml::default();
        assert_eq!(toml.catalog.root, PathBuf::from("stacks"));
        assert_eq!(toml.catalog.extension, "yml");
        assert_eq!(toml.overrides.dir, PathBuf::from(".stackyard/env"));
        assert_eq!(toml.cluster.network, "stackyard-net");
        assert_eq!(toml.cluster.advertise_addr, None);
        assert_eq!(toml.deploy.max_parallel, 1);
        assert_eq!(toml.deploy.call_timeout_secs, 300);
        assert!(!toml.deploy.with_registry_auth);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let content = r#"
[cluster]
network = "edge"
advertise_addr = "10.0.0.5"

[deploy]
max_parallel = 4
"#;
        let toml = StackyardToml::parse(content).unwrap();
        assert_eq!(toml.cluster.network, "edge");
        assert_eq!(toml.cluster.advertise_addr, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(toml.deploy.max_parallel, 4);
        assert_eq!(toml.deploy.call_timeout_secs, 300);
        assert_eq!(toml.catalog.extension, "yml");
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        let content = r#"
[cluster]
advertise_addr = "not-an-ip"
"#;
        assert!(StackyardToml::parse(content).is_err());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let content = r#"
[catalog]
extension = ".yml"

[cluster]
network = "  "

[deploy]
max_parallel = 0
call_timeout_secs = 0
"#;
        let warnings = StackyardToml::parse(content).unwrap().validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("max_parallel")));
        assert!(warnings.iter().any(|w| w.contains("call_timeout_secs")));
        assert!(warnings.iter().any(|w| w.contains("Network")));
        assert!(warnings.iter().any(|w| w.contains("dot")));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = StackyardToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.cluster.network, "stackyard-net");
    }

    #[test]
    fn test_load_or_default_reports_broken_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "[deploy\nmax_parallel =").unwrap();
        let err = StackyardToml::load_or_default(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("stackyard.toml"));
    }

    #[test]
    fn test_relative_paths_resolve_against_project_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "[catalog]\nroot = \"defs\"\n[overrides]\ndir = \"/var/lib/stackyard/env\"\n",
        )
        .unwrap();

        let settings = Settings::new(dir.path().to_path_buf()).unwrap();
        let project = dir.path().canonicalize().unwrap();
        assert_eq!(settings.catalog_root(), project.join("defs"));
        assert_eq!(
            settings.overrides_dir(),
            PathBuf::from("/var/lib/stackyard/env")
        );
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "[cluster]\nnetwork = \"from-file\"\n[deploy]\nmax_parallel = 2\ncall_timeout_secs = 60\n",
        )
        .unwrap();

        let settings = Settings::with_cli_args(
            dir.path().to_path_buf(),
            CliOverrides {
                network: Some("from-cli".to_string()),
                max_parallel: Some(8),
                config_env: Some("MY_CONFIG".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(settings.network(), "from-cli");
        assert_eq!(settings.max_parallel(), 8);
        assert_eq!(settings.call_timeout(), Duration::from_secs(60));
        assert_eq!(settings.config_env(), "MY_CONFIG");
    }

    #[test]
    fn test_cli_values_are_validated() {
        let dir = tempdir().unwrap();
        let settings = Settings::with_cli_args(
            dir.path().to_path_buf(),
            CliOverrides {
                max_parallel: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.validate().len(), 1);
    }

    #[test]
    fn test_validate_rejects_oversized_max_parallel() {
        let toml = StackyardToml::parse("[deploy]\nmax_parallel = 9223372036854775807\n").unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("at most 64"));

        let toml = StackyardToml::parse("[deploy]\nmax_parallel = 64\n").unwrap();
        assert!(toml.validate().is_empty());

        let dir = tempdir().unwrap();
        let settings = Settings::with_cli_args(
            dir.path().to_path_buf(),
            CliOverrides {
                max_parallel: Some(MAX_PARALLEL_LIMIT + 1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.validate().len(), 1);
    }

    #[test]
    fn test_missing_project_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(Settings::new(missing).is_err());
    }

    #[test]
    fn test_docker_bin_priority() {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved = std::env::var(DOCKER_BIN_ENV).ok();
        unsafe { std::env::remove_var(DOCKER_BIN_ENV) };

        let toml = StackyardToml::default();
        assert_eq!(toml.docker_bin(), "docker");

        let toml = StackyardToml::parse("[cluster]\ndocker_bin = \"/opt/docker\"\n").unwrap();
        assert_eq!(toml.docker_bin(), "/opt/docker");

        unsafe { std::env::set_var(DOCKER_BIN_ENV, "/env/docker") };
        assert_eq!(toml.docker_bin(), "/env/docker");

        let dir = tempdir().unwrap();
        let settings = Settings::with_cli_args(
            dir.path().to_path_buf(),
            CliOverrides {
                docker_bin: Some("/cli/docker".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.docker_bin(), "/cli/docker");

        unsafe { std::env::remove_var(DOCKER_BIN_ENV) };
        if let Some(val) = saved {
            unsafe { std::env::set_var(DOCKER_BIN_ENV, val) };
        }
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut toml = StackyardToml::default();
        toml.cluster.advertise_addr = Some(Ipv4Addr::new(10, 1, 1, 1));
        let text = toml.to_toml_string().unwrap();
        assert!(text.contains("[deploy]"));
        let parsed = StackyardToml::parse(&text).unwrap();
        assert_eq!(parsed.cluster.advertise_addr, toml.cluster.advertise_addr);
    }
}
