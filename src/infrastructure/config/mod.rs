//! Loader configuration.

pub mod args;
pub mod loader_config;

pub use args::CliArgs;
pub use loader_config::{ConfigError, ExecutionContext, LoaderConfig, LogLevel};
