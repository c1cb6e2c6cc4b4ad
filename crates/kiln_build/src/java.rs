//! The builder for Java-like units.
//!
//! Compiles sources into the unit's staging tree, copies resources next to
//! the classes, runs the pre-archive hook, then either assembles a jar or
//! copies the tree to the unit's output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_archive::ArchiveOptions;
use kiln_cache::PathPattern;

use crate::compiler::{CompileRequest, Compiler, CompilerDiagnostic, Severity};
use crate::context::BuildContext;
use crate::error::BuildError;
use crate::hooks::PreArchiveHook;
use crate::unit::{ArtifactKind, BuildArgs, UnitBuilder, UnitSpec};

/// Builds a unit with an external compiler and the archive assembler.
#[derive(Clone)]
pub struct JavaUnitBuilder {
    compiler: Arc<dyn Compiler>,
    hook: Option<Arc<dyn PreArchiveHook>>,
}

impl std::fmt::Debug for JavaUnitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JavaUnitBuilder")
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl JavaUnitBuilder {
    /// Creates a builder using `compiler`.
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            hook: None,
        }
    }

    /// Installs a hook run just before archiving.
    pub fn with_hook(mut self, hook: Arc<dyn PreArchiveHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    fn compile(&self, ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
        let unit = args.unit;
        let sources: Vec<PathBuf> = ctx
            .engine()
            .resolve(&unit.sources)?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "java"))
            .collect();

        let request = CompileRequest {
            sources,
            classpath: args.classpath.clone(),
            output_dir: args.staging_dir.clone(),
        };
        let diagnostics = self.compiler.compile(&request)?;
        for diagnostic in &diagnostics {
            match diagnostic.severity {
                Severity::Error => tracing::error!(unit = %unit.name, "{diagnostic}"),
                Severity::Warning => tracing::warn!(unit = %unit.name, "{diagnostic}"),
                Severity::Note => tracing::debug!(unit = %unit.name, "{diagnostic}"),
            }
        }
        if diagnostics.iter().any(CompilerDiagnostic::is_error) {
            return Err(BuildError::Compile { diagnostics });
        }
        Ok(())
    }

    fn archive(&self, ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
        let unit = args.unit;
        let opts = ctx.options();
        let root = ctx.engine().root();

        let mut builder = ArchiveOptions::builder(&args.output, &args.staging_dir)
            .runtime_classpath(unit.runtime_classpath.iter().cloned())
            .timestamps_now(opts.timestamps_now)
            .compression_level(opts.compression_level)
            .normalize(opts.normalize);
        if let Some(main_class) = &unit.main_class {
            builder = builder.main_class(main_class);
        }
        for extra in &unit.extra_files {
            builder = builder.extra_file(root.join(&extra.source), extra.destination.clone());
        }
        if unit.embed_sources {
            for dir in literal_dirs(root, &unit.sources) {
                builder = builder.embedded_sources(dir);
            }
        }
        if let Some(text) = &unit.license_text {
            builder = builder.license_text(text.clone());
        }
        for license in &unit.licenses {
            builder = builder.license(license.clone());
        }

        if ctx.assembler().assemble(&builder.build())?.is_none() {
            tracing::warn!(unit = %unit.name, "unit produced no files; no archive written");
            remove_stale(&args.output)?;
        }
        Ok(())
    }
}

impl UnitBuilder for JavaUnitBuilder {
    fn build(&self, ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
        let unit = args.unit;
        let root = ctx.engine().root();
        require_literals(root, &unit.sources, "source input")?;
        require_literals(root, &unit.resources, "resource directory")?;
        if let Some(missing) = args.classpath.iter().find(|entry| !entry.exists()) {
            return Err(BuildError::NotFound {
                kind: "classpath entry",
                name: missing.display().to_string(),
            });
        }

        reset_dir(&args.staging_dir)?;
        self.compile(ctx, args)?;
        copy_resources(ctx, unit, &args.staging_dir)?;
        if let Some(hook) = &self.hook {
            hook.before_archive(unit, &args.staging_dir)?;
        }

        match unit.kind {
            ArtifactKind::Archive => self.archive(ctx, args),
            ArtifactKind::Directory => {
                reset_dir(&args.output)?;
                copy_tree(&args.staging_dir, &args.output)
            }
        }
    }
}

/// Removes an artifact left by an earlier build. A missing path is fine.
fn remove_stale(path: &Path) -> Result<(), BuildError> {
    let removed = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

/// Fails with `NotFound` for the first literal pattern that does not exist.
fn require_literals(root: &Path, patterns: &[PathPattern], kind: &'static str) -> Result<(), BuildError> {
    for pattern in patterns.iter().filter(|p| !p.is_glob()) {
        if !root.join(pattern.as_str()).exists() {
            return Err(BuildError::NotFound {
                kind,
                name: pattern.as_str().to_string(),
            });
        }
    }
    Ok(())
}

fn literal_dirs(root: &Path, patterns: &[PathPattern]) -> Vec<PathBuf> {
    patterns
        .iter()
        .filter(|p| !p.is_glob())
        .map(|p| root.join(p.as_str()))
        .filter(|p| p.is_dir())
        .collect()
}

/// Copies resource files into `staging`. Files under a literal directory
/// keep their path relative to it; a literal file lands at the staging
/// root; glob matches keep their path relative to the workspace root.
fn copy_resources(ctx: &BuildContext, unit: &UnitSpec, staging: &Path) -> Result<(), BuildError> {
    let root = ctx.engine().root();
    for pattern in &unit.resources {
        let base = root.join(pattern.as_str());
        let files = ctx.engine().resolve(std::slice::from_ref(pattern))?;
        for file in files {
            let rel = if pattern.is_glob() {
                file.strip_prefix(root).unwrap_or(&file).to_path_buf()
            } else if base.is_dir() {
                file.strip_prefix(&base).unwrap_or(&file).to_path_buf()
            } else {
                PathBuf::from(file.file_name().unwrap_or(file.as_os_str()))
            };
            copy_file(&file, &staging.join(rel))?;
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::copy(from, to).map_err(|e| BuildError::io(from, e))?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
            BuildError::io(path, e.into())
        })?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Empties `dir`, creating it if needed.
fn reset_dir(dir: &Path) -> Result<(), BuildError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::io(dir, e)),
    }
    std::fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))
}
