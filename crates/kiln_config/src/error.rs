//! Errors raised while locating, reading and checking `kiln.toml`.
//!
//! The CLI prefixes load errors with the configuration path, so messages
//! here name the offending key or project rather than the file.

/// A `kiln.toml` that cannot be turned into a [`KilnConfig`](crate::KilnConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `kiln.toml` exists but could not be read.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the workspace schema.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A project requested on the command line is not declared under
    /// `[projects]`.
    #[error("unknown project '{0}'")]
    UnknownProject(String),

    /// A key that kiln cannot default is empty, for example
    /// `workspace.output_dir` or a license `name`.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A value is out of range or contradicts another setting, such as a
    /// compression level above 9 or a project that depends on itself.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Discovery walked from the given directory to the filesystem root
    /// without finding `kiln.toml`.
    #[error("no kiln.toml found in {0} or any parent directory")]
    NotFound(std::path::PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{find_config, load_config, load_config_from_str};

    #[test]
    fn out_of_range_compression_level_names_the_key() {
        let err = load_config_from_str("[workspace]\ncompression_level = 12\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: workspace.compression_level must be between 0 and 9, got 12"
        );
    }

    #[test]
    fn self_dependency_names_the_project() {
        let err = load_config_from_str("[projects.core]\ndependencies = [\"core\"]\n").unwrap_err();
        assert_eq!(err.to_string(), "validation error: project 'core' depends on itself");
    }

    #[test]
    fn empty_license_name_is_a_missing_field() {
        let toml = "[projects.core]\nlicenses = [{ name = \"\" }]\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: projects.core.licenses.name");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_config_from_str("[projects.core\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().starts_with("failed to parse configuration: "));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(ref e) if e.kind() == std::io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("failed to read configuration: "));
    }

    #[test]
    fn discovery_failure_names_the_start_directory() {
        let dir = tempfile::tempdir().unwrap();
        let start = dir.path().join("nested");
        std::fs::create_dir(&start).unwrap();
        match find_config(&start) {
            // A kiln.toml above the temp directory would be found instead.
            Ok(found) => assert!(!found.starts_with(dir.path())),
            Err(err) => assert_eq!(
                err.to_string(),
                format!("no kiln.toml found in {} or any parent directory", start.display())
            ),
        }
    }

    #[test]
    fn unknown_project_is_quoted() {
        let err = ConfigError::UnknownProject("ghost".to_string());
        assert_eq!(err.to_string(), "unknown project 'ghost'");
    }
}
