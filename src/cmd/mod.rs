//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `converge` | `Converge`       |
//! | `project`  | `Init`           |
//! | `config`   | `Config`         |

pub mod config;
pub mod converge;
pub mod project;

pub use config::cmd_config;
pub use converge::cmd_converge;
pub use project::cmd_init;
