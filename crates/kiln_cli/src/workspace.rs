//! Shared workspace plumbing for CLI commands.
//!
//! Locates `kiln.toml`, turns each configured project into a registered
//! build unit, and prepares the build context and self-invalidation guard.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_archive::{ExtraFile, LicenseDescriptor};
use kiln_build::{
    ArtifactKind, BuildContext, BuildOptions, BuildUnit, JavaUnitBuilder, JavacCompiler, UnitSpec,
};
use kiln_cache::{FingerprintStore, PathPattern, SelfInvalidationGuard};
use kiln_config::{ConfigError, KilnConfig, OutputKind, ProjectConfig, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// A loaded `kiln.toml` and the directory it lives in.
#[derive(Debug)]
pub struct Workspace {
    /// Directory containing `kiln.toml`; all configured paths are relative
    /// to it.
    pub root: PathBuf,
    /// The configuration file itself.
    pub config_path: PathBuf,
    /// Parsed configuration.
    pub config: KilnConfig,
}

impl Workspace {
    /// Loads the workspace named by `--config`, or the nearest `kiln.toml`
    /// above the current directory.
    pub fn discover(global: &GlobalArgs) -> Result<Self, Box<dyn Error>> {
        let config_path = match &global.config {
            Some(path) => {
                let p = PathBuf::from(path);
                if p.is_dir() {
                    p.join(CONFIG_FILE_NAME)
                } else {
                    p
                }
            }
            None => kiln_config::find_config(&std::env::current_dir()?)?,
        };
        Self::load(&config_path)
    }

    /// Loads the workspace whose configuration file is `config_path`.
    pub fn load(config_path: &Path) -> Result<Self, Box<dyn Error>> {
        let config = kiln_config::load_config_file(config_path)
            .map_err(|e| format!("{}: {e}", config_path.display()))?;
        let config_path = std::path::absolute(config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            root,
            config_path,
            config,
        })
    }

    /// Returns the requested project names, or every project in
    /// declaration order when none are requested.
    pub fn select(&self, requested: &[String]) -> Result<Vec<String>, ConfigError> {
        if requested.is_empty() {
            return Ok(self.config.projects.keys().cloned().collect());
        }
        requested
            .iter()
            .map(|name| {
                if self.config.projects.contains_key(name) {
                    Ok(name.clone())
                } else {
                    Err(ConfigError::UnknownProject(name.clone()))
                }
            })
            .collect()
    }

    /// Run options for this workspace. `--jobs` wins over the configured
    /// value, which wins over the number of available CPUs.
    pub fn options(&self, global: &GlobalArgs, force: bool) -> BuildOptions {
        let ws = &self.config.workspace;
        let jobs = global
            .jobs
            .or(ws.jobs)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1);
        let mut options = BuildOptions::new(&self.root);
        options.output_dir = self.root.join(&ws.output_dir);
        options.staging_dir = self.root.join(&ws.staging_dir);
        options.jobs = jobs;
        options.force = force;
        options.normalize = ws.normalize;
        options.timestamps_now = ws.timestamps_now;
        options.compression_level = ws.compression_level;
        options
    }

    /// Opens the fingerprint store configured for this workspace.
    pub fn open_store(&self) -> Result<FingerprintStore, Box<dyn Error>> {
        Ok(FingerprintStore::open(
            self.root.join(&self.config.workspace.store),
        )?)
    }

    /// Creates a build context with every project registered.
    pub fn context(&self, options: BuildOptions) -> Result<BuildContext, Box<dyn Error>> {
        let ctx = BuildContext::new(options, self.open_store()?);
        self.register_units(&ctx)?;
        Ok(ctx)
    }

    /// Registers one unit per project, all sharing one javac-backed builder.
    pub fn register_units(&self, ctx: &BuildContext) -> Result<(), Box<dyn Error>> {
        let ws = &self.config.workspace;
        let compiler = JavacCompiler::new(&ws.javac).with_args(ws.javac_args.iter().cloned());
        let builder = Arc::new(JavaUnitBuilder::new(Arc::new(compiler)));
        for (name, project) in &self.config.projects {
            let spec = self.unit_spec(name, project)?;
            ctx.registry().register_unique(BuildUnit::new(spec, builder.clone()))?;
        }
        Ok(())
    }

    /// Translates a project's configuration into a unit spec. License
    /// files are read here so that unit specs carry their text.
    pub fn unit_spec(&self, name: &str, project: &ProjectConfig) -> Result<UnitSpec, Box<dyn Error>> {
        let mut spec = Self::artifact_spec(name, project)
            .depends_on(project.dependencies.iter().cloned())
            .sources(project.sources.iter().map(String::as_str))
            .resources(project.resources.iter().map(String::as_str));
        if let Some(watch) = &project.watch {
            spec = spec.watch(watch.iter().map(String::as_str));
        }
        if let Some(main_class) = &project.main_class {
            spec = spec.main_class(main_class);
        }
        spec.runtime_classpath = project.runtime_classpath.clone();
        spec.embed_sources = project.embed_sources;
        spec.extra_files = project
            .extra_files
            .iter()
            .map(|extra| ExtraFile {
                source: PathBuf::from(&extra.source),
                destination: extra.destination.clone(),
            })
            .collect();
        if let Some(license) = &project.license {
            spec.license_text = Some(self.read_text(name, license)?);
            spec.license_files.push(PathBuf::from(license));
        }
        for license in &project.licenses {
            let text = match &license.file {
                Some(file) => {
                    spec.license_files.push(PathBuf::from(file));
                    Some(self.read_text(name, file)?)
                }
                None => None,
            };
            spec.licenses.push(LicenseDescriptor {
                name: license.name.clone(),
                url: license.url.clone(),
                text,
            });
        }
        Ok(spec)
    }

    /// The part of a project's spec that locates its artifact. Reads no
    /// files, unlike [`unit_spec`](Self::unit_spec).
    pub fn artifact_spec(name: &str, project: &ProjectConfig) -> UnitSpec {
        let mut spec = UnitSpec::new(name).kind(match project.kind {
            OutputKind::Jar => ArtifactKind::Archive,
            OutputKind::Directory => ArtifactKind::Directory,
        });
        if let Some(output) = &project.output {
            spec = spec.output(output);
        }
        spec
    }

    fn read_text(&self, project: &str, rel: &str) -> Result<String, Box<dyn Error>> {
        let path = self.root.join(rel);
        std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "project '{project}': failed to read {}: {e}",
                path.display()
            )
            .into()
        })
    }

    /// The guard over the running executable and the configuration file.
    pub fn guard(&self) -> SelfInvalidationGuard {
        let mut paths = Vec::new();
        match std::env::current_exe() {
            Ok(exe) => paths.push(PathPattern::literal(exe)),
            Err(e) => tracing::warn!(error = %e, "cannot locate the kiln executable"),
        }
        paths.push(PathPattern::literal(&self.config_path));
        SelfInvalidationGuard::new(paths)
    }
}
