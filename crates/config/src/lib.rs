//! Wayfarer configuration: a TOML file with defaults for every field.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{ConfigError, Result},
    loader::{CONFIG_FILE_NAME, load, load_file, parse_str},
    schema::{ServerConfig, SsrfConfig, UpstreamConfig, WayfarerConfig},
};
