//! The per-invocation build context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_archive::Assembler;
use kiln_cache::{FingerprintEngine, FingerprintStore, GuardOutcome, SelfInvalidationGuard};

use crate::error::BuildError;
use crate::registry::Registry;

/// Run-wide options. Built once per invocation and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Workspace root; relative paths resolve against it.
    pub root: PathBuf,
    /// Directory receiving unit artifacts.
    pub output_dir: PathBuf,
    /// Directory holding per-unit staging trees.
    pub staging_dir: PathBuf,
    /// Maximum number of units built concurrently.
    pub jobs: usize,
    /// Rebuild every unit regardless of fingerprints.
    pub force: bool,
    /// Normalize every jar after assembly.
    pub normalize: bool,
    /// Stamp jar entries with the build time.
    pub timestamps_now: bool,
    /// Deflate level for jar entries.
    pub compression_level: i64,
}

impl BuildOptions {
    /// Creates options rooted at `root` with the default layout
    /// (`build/` for artifacts, `build/staging/` for staging trees).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            output_dir: root.join("build"),
            staging_dir: root.join("build").join("staging"),
            root,
            jobs: 1,
            force: false,
            normalize: false,
            timestamps_now: false,
            compression_level: 6,
        }
    }

    /// Resolves `path` against the workspace root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }
}

/// Everything a build run needs: the unit registry, the fingerprint
/// store and engine, the archive assembler and the run options.
///
/// A context is created once per top-level invocation and passed down to
/// every builder. [`child`](Self::child) gives a nested build its own empty
/// registry while sharing the store.
#[derive(Debug)]
pub struct BuildContext {
    registry: Registry,
    store: Arc<FingerprintStore>,
    engine: Arc<FingerprintEngine>,
    assembler: Arc<Assembler>,
    options: Arc<BuildOptions>,
    force_rebuild: bool,
}

impl BuildContext {
    /// Creates a context with an empty registry.
    pub fn new(options: BuildOptions, store: FingerprintStore) -> Self {
        let engine = FingerprintEngine::new(&options.root);
        let force_rebuild = options.force;
        Self {
            registry: Registry::new(),
            store: Arc::new(store),
            engine: Arc::new(engine),
            assembler: Arc::new(Assembler::new()),
            options: Arc::new(options),
            force_rebuild,
        }
    }

    /// Replaces the archive assembler.
    pub fn with_assembler(mut self, assembler: Assembler) -> Self {
        self.assembler = Arc::new(assembler);
        self
    }

    /// Runs the self-invalidation check, forcing every unit to rebuild when
    /// the tool changed.
    pub fn check_self(&mut self, guard: &SelfInvalidationGuard) -> Result<GuardOutcome, BuildError> {
        let outcome = guard.check(&self.engine, &self.store)?;
        self.force_rebuild |= outcome.force_rebuild;
        Ok(outcome)
    }

    /// Returns a context for a nested build: fresh registry and run state,
    /// shared store, engine, assembler, options and force flag.
    pub fn child(&self) -> Self {
        Self {
            registry: Registry::new(),
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            assembler: Arc::clone(&self.assembler),
            options: Arc::clone(&self.options),
            force_rebuild: self.force_rebuild,
        }
    }

    /// The unit registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The persistent fingerprint store.
    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// The fingerprint engine, rooted at the workspace root.
    pub fn engine(&self) -> &FingerprintEngine {
        &self.engine
    }

    /// The archive assembler.
    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    /// The run options.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Whether every unit must be rebuilt this run.
    pub fn force_rebuild(&self) -> bool {
        self.force_rebuild
    }
}
