//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{KilnConfig, OutputKind};
use std::path::{Path, PathBuf};

/// Name of the workspace configuration file.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a workspace directory.
///
/// Reads `<workspace_dir>/kiln.toml`, parses it, and validates it.
pub fn load_config(workspace_dir: &Path) -> Result<KilnConfig, ConfigError> {
    load_config_file(&workspace_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<KilnConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Finds the nearest `kiln.toml` in `start` or one of its ancestors.
pub fn find_config(start: &Path) -> Result<PathBuf, ConfigError> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound(start.to_path_buf()))
}

/// Validates names, numeric ranges and archive destinations.
///
/// Dependencies that are not projects are allowed: they name external
/// artifacts.
fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    let ws = &config.workspace;
    if ws.jobs == Some(0) {
        return Err(ConfigError::ValidationError(
            "workspace.jobs must be at least 1".to_string(),
        ));
    }
    if !(0..=9).contains(&ws.compression_level) {
        return Err(ConfigError::ValidationError(format!(
            "workspace.compression_level must be between 0 and 9, got {}",
            ws.compression_level
        )));
    }
    if ws.output_dir.is_empty() {
        return Err(ConfigError::MissingField("workspace.output_dir".to_string()));
    }

    for (name, project) in &config.projects {
        if name.is_empty() || name.contains(&['/', '\\'][..]) || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "invalid project name '{name}'"
            )));
        }
        for dep in &project.dependencies {
            if dep.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "projects.{name}.dependencies"
                )));
            }
            if dep == name {
                return Err(ConfigError::ValidationError(format!(
                    "project '{name}' depends on itself"
                )));
            }
        }
        if project.kind == OutputKind::Directory && project.main_class.is_some() {
            return Err(ConfigError::ValidationError(format!(
                "project '{name}': main_class requires kind = \"jar\""
            )));
        }
        for extra in &project.extra_files {
            if !is_relative_entry(&extra.destination) {
                return Err(ConfigError::ValidationError(format!(
                    "project '{name}': extra file destination '{}' must be a relative path",
                    extra.destination
                )));
            }
        }
        if project.licenses.iter().any(|l| l.name.is_empty()) {
            return Err(ConfigError::MissingField(format!(
                "projects.{name}.licenses.name"
            )));
        }
    }
    Ok(())
}

fn is_relative_entry(dest: &str) -> bool {
    !dest.is_empty()
        && !dest.starts_with('/')
        && !dest.contains('\\')
        && dest.split('/').all(|seg| !seg.is_empty() && seg != "..")
}
