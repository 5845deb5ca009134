//! [`ClusterRuntime`] backed by the `docker` CLI.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{ClusterRuntime, DeploymentUnit, SwarmState};
use crate::errors::RuntimeError;
use crate::overrides::read_override_file;

/// Runs `docker` subcommands, each bounded by `call_timeout`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    call_timeout: Duration,
    with_registry_auth: bool,
}

impl DockerCli {
    pub fn new(program: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            call_timeout,
            with_registry_auth: false,
        }
    }

    /// Pass `--with-registry-auth` to `docker stack deploy`.
    pub fn with_registry_auth(mut self, enabled: bool) -> Self {
        self.with_registry_auth = enabled;
        self
    }

    async fn docker<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run(&self.program, args, Vec::new(), self.call_timeout).await
    }
}

/// Run a program to completion and return its stdout.
///
/// The child is killed if the timeout expires before it exits.
async fn run<I, S>(
    program: &str,
    args: I,
    envs: Vec<(String, String)>,
    call_timeout: Duration,
) -> Result<String, RuntimeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let command = std::iter::once(program.to_string())
        .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");

    debug!(%command, env_vars = envs.len(), "running");

    let child = Command::new(program)
        .args(&args)
        .envs(envs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RuntimeError::Io {
            command: command.clone(),
            source,
        })?;

    let output = match timeout(call_timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| RuntimeError::Io {
            command: command.clone(),
            source,
        })?,
        Err(_) => {
            return Err(RuntimeError::Timeout {
                command,
                after: call_timeout,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RuntimeError::NonZeroExit {
            command,
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `hostname -I` output, keeping IPv4 addresses in order.
fn parse_host_addresses(output: &str) -> Vec<Ipv4Addr> {
    output
        .split_whitespace()
        .filter_map(|token| match token.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) => Some(addr),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl ClusterRuntime for DockerCli {
    async fn swarm_state(&self) -> Result<SwarmState, RuntimeError> {
        let output = self
            .docker(["info", "--format", "{{.Swarm.LocalNodeState}}"])
            .await?;
        output
            .trim()
            .parse()
            .map_err(|_| RuntimeError::UnexpectedOutput {
                command: format!("{} info", self.program),
                output: output.trim().to_string(),
            })
    }

    async fn local_ipv4_addresses(&self) -> Result<Vec<Ipv4Addr>, RuntimeError> {
        let output = run("hostname", ["-I"], Vec::new(), self.call_timeout).await?;
        Ok(parse_host_addresses(&output))
    }

    async fn init_swarm(&self, advertise_addr: Ipv4Addr) -> Result<(), RuntimeError> {
        self.docker([
            "swarm".to_string(),
            "init".to_string(),
            "--advertise-addr".to_string(),
            advertise_addr.to_string(),
        ])
        .await
        .map(|_| ())
    }

    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        let output = self.docker(["network", "ls", "--format", "{{.Name}}"]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn create_overlay_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker([
            "network",
            "create",
            "--driver",
            "overlay",
            "--attachable",
            name,
        ])
        .await
        .map(|_| ())
    }

    async fn deploy_stack(&self, unit: &DeploymentUnit) -> Result<(), RuntimeError> {
        // `docker stack deploy` has no env-file flag; compose interpolation
        // reads the client's environment instead.
        let envs = match &unit.override_path {
            Some(path) => {
                read_override_file(path).map_err(|source| RuntimeError::OverrideLoad {
                    path: path.clone(),
                    source,
                })?
            }
            None => Vec::new(),
        };

        let mut args: Vec<OsString> = vec![
            "stack".into(),
            "deploy".into(),
            "--compose-file".into(),
            unit.definition_path.clone().into_os_string(),
        ];
        if self.with_registry_auth {
            args.push("--with-registry-auth".into());
        }
        args.push(unit.deploy_name.clone().into());

        run(&self.program, args, envs, self.call_timeout)
            .await
            .map(|_| ())
    }
}
