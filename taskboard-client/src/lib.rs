/// Taskboard client: REST persistence, config loading, logging and the CLI.
pub mod cli;
pub mod config;
pub mod dto;
pub mod log_bridge;
pub mod rest;

pub use cli::{run, Cli};
pub use config::{ClientConfig, ConfigError};
pub use rest::RestApi;
