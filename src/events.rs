//! Progress events emitted while a run is in flight.

use std::path::PathBuf;

use crate::bootstrap::BootstrapReport;
use crate::cluster::DecodeWarning;
use crate::deployer::StackRecord;

/// Events sent to an optional listener (the CLI prints them as status lines).
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A lenient decode policy kicked in.
    ConfigWarning(DecodeWarning),
    /// No configuration blob was supplied.
    NoConfiguration,
    /// Swarm and shared network are in place.
    Bootstrapped(BootstrapReport),
    /// A stack resolved and is queued for deploy.
    StackResolved {
        index: usize,
        deploy_name: String,
        definition: PathBuf,
        override_path: Option<PathBuf>,
    },
    /// A stack reached its final outcome.
    StackFinished { index: usize, record: StackRecord },
}
