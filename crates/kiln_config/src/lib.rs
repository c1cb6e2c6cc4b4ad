//! Configuration loading for Kiln workspaces.
//!
//! Parses `kiln.toml` files into strongly-typed Rust structures,
//! validates required fields and cross-references between projects.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{find_config, load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::{ExtraFileConfig, KilnConfig, LicenseConfig, OutputKind, ProjectConfig, WorkspaceConfig};
