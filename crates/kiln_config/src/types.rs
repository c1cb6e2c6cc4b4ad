//! Configuration types deserialized from `kiln.toml`.

use indexmap::IndexMap;
use serde::Deserialize;

/// The top-level workspace configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct KilnConfig {
    /// Workspace-wide settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Build units, in declaration order.
    #[serde(default)]
    pub projects: IndexMap<String, ProjectConfig>,
}

/// Workspace-wide build settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory receiving unit artifacts, relative to the workspace root.
    pub output_dir: String,
    /// Directory holding per-unit staging trees.
    pub staging_dir: String,
    /// Location of the fingerprint store.
    pub store: String,
    /// Maximum number of units built concurrently. Defaults to the number
    /// of available CPUs.
    pub jobs: Option<usize>,
    /// Run the archive normalizer on every jar.
    pub normalize: bool,
    /// Deflate level for jar entries (0-9).
    pub compression_level: i64,
    /// Stamp archive entries with the build time instead of file mtimes.
    pub timestamps_now: bool,
    /// Compiler executable.
    pub javac: String,
    /// Extra arguments passed to every compiler invocation.
    pub javac_args: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            output_dir: "build".to_string(),
            staging_dir: "build/staging".to_string(),
            store: ".kiln/fingerprints.properties".to_string(),
            jobs: None,
            normalize: false,
            compression_level: 6,
            timestamps_now: false,
            javac: "javac".to_string(),
            javac_args: Vec::new(),
        }
    }
}

/// Configuration of one build unit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Names of units (or external artifacts) this unit depends on.
    pub dependencies: Vec<String>,
    /// Source directories or patterns.
    pub sources: Vec<String>,
    /// Resource directories copied verbatim into the staging tree.
    pub resources: Vec<String>,
    /// Patterns deciding staleness. Defaults to sources plus resources.
    pub watch: Option<Vec<String>>,
    /// Entry point written to the manifest.
    pub main_class: Option<String>,
    /// Manifest `Class-Path` entries.
    pub runtime_classpath: Vec<String>,
    /// Explicit artifact path overriding the derived one.
    pub output: Option<String>,
    /// Artifact kind.
    pub kind: OutputKind,
    /// Embed the unit's sources in its jar.
    pub embed_sources: bool,
    /// Files copied into the jar from outside the staging tree.
    pub extra_files: Vec<ExtraFileConfig>,
    /// File holding plain license text for `META-INF/LICENSE.txt`.
    pub license: Option<String>,
    /// Structured licenses handed to the license installer.
    pub licenses: Vec<LicenseConfig>,
}

/// The kind of artifact a unit produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// A jar file.
    #[default]
    Jar,
    /// A directory of compiled output.
    Directory,
}

/// A file added to a jar from outside the staging tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtraFileConfig {
    /// Path on disk, relative to the workspace root.
    pub source: String,
    /// Entry name inside the jar.
    pub destination: String,
}

/// A license declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LicenseConfig {
    /// Short identifier such as `Apache-2.0`.
    pub name: String,
    /// Canonical URL.
    #[serde(default)]
    pub url: Option<String>,
    /// File containing the full text, relative to the workspace root.
    #[serde(default)]
    pub file: Option<String>,
}

impl ProjectConfig {
    /// Returns the staleness patterns: `watch` when set, otherwise the
    /// sources followed by the resources.
    pub fn watched_patterns(&self) -> Vec<String> {
        match &self.watch {
            Some(watch) => watch.clone(),
            None => self.sources.iter().chain(&self.resources).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_defaults_to_sources_and_resources() {
        let project = ProjectConfig {
            sources: vec!["src".to_string()],
            resources: vec!["res".to_string()],
            ..Default::default()
        };
        assert_eq!(project.watched_patterns(), vec!["src", "res"]);
    }

    #[test]
    fn explicit_watch_wins() {
        let project = ProjectConfig {
            sources: vec!["src".to_string()],
            watch: Some(vec!["src/**/*.java".to_string()]),
            ..Default::default()
        };
        assert_eq!(project.watched_patterns(), vec!["src/**/*.java"]);
    }

    #[test]
    fn workspace_defaults() {
        let ws = WorkspaceConfig::default();
        assert_eq!(ws.output_dir, "build");
        assert_eq!(ws.store, ".kiln/fingerprints.properties");
        assert_eq!(ws.compression_level, 6);
        assert!(ws.jobs.is_none());
    }
}
