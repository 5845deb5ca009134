//! Typed error hierarchy for stackyard.
//!
//! Fatal categories abort the run before any stack work:
//! - `ConfigError`: the configuration blob could not be decoded
//! - `BootstrapError`: swarm activation or shared network creation failed
//!
//! Local categories only ever affect a single stack entry:
//! - `OverrideWriteError`: the override file could not be materialized
//! - `RuntimeError`: an external runtime call failed (deploys surface it as
//!   a `DeployFailed` outcome, bootstrap wraps it in `BootstrapError`)

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from decoding the configuration blob.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration blob is not valid base64: {0}")]
    Encoding(String),

    #[error("Configuration blob is not a valid document: {0}")]
    Parse(String),
}

/// Errors from a single call into the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("Failed to load override file {path}: {source}")]
    OverrideLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected output from `{command}`: {output}")]
    UnexpectedOutput { command: String, output: String },
}

/// Errors that make cluster bootstrap, and therefore the whole run, fail.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to query swarm state: {0}")]
    SwarmQuery(#[source] RuntimeError),

    #[error("Swarm is in state '{0}' and cannot be initialized")]
    SwarmState(String),

    #[error("Failed to list local addresses: {0}")]
    AddressQuery(#[source] RuntimeError),

    #[error("No non-loopback IPv4 address available to advertise")]
    NoAdvertiseAddress,

    #[error("Failed to initialize swarm advertising {addr}: {source}")]
    SwarmInit {
        addr: Ipv4Addr,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to list networks: {0}")]
    NetworkQuery(#[source] RuntimeError),

    #[error("Failed to create overlay network '{name}': {source}")]
    NetworkCreate {
        name: String,
        #[source]
        source: RuntimeError,
    },
}

/// Errors from materializing a stack's override file.
#[derive(Debug, Error)]
pub enum OverrideWriteError {
    #[error("Failed to create override directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid override entry '{key}' for stack '{stack}': {reason}")]
    InvalidEntry {
        stack: String,
        key: String,
        reason: String,
    },

    #[error("Failed to write override file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
