pub mod bootstrap;
pub mod catalog;
pub mod cluster;
pub mod converge;
pub mod deployer;
pub mod errors;
pub mod events;
pub mod init;
pub mod overrides;
pub mod report;
pub mod runtime;
pub mod settings;
pub mod ui;
