//! Build units and the builder interface.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_archive::{ExtraFile, LicenseDescriptor};
use kiln_cache::PathPattern;

use crate::context::BuildContext;
use crate::error::BuildError;

/// The kind of artifact a unit produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A jar file at `<output_dir>/<name>.jar`.
    #[default]
    Archive,
    /// A directory at `<output_dir>/<name>/`.
    Directory,
}

impl ArtifactKind {
    /// Whether `path` holds a usable artifact of this kind.
    ///
    /// An archive must be a regular file; a directory must exist and
    /// contain at least one entry.
    pub fn is_present(self, path: &Path) -> bool {
        match self {
            ArtifactKind::Archive => path.is_file(),
            ArtifactKind::Directory => std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
        }
    }
}

/// Declarative configuration of one build unit.
///
/// Two specs that compare equal describe the same unit; re-registering an
/// equal spec is never a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Unique, case-sensitive unit name.
    pub name: String,
    /// Names of the units (or external artifacts) this unit depends on.
    pub dependencies: Vec<String>,
    /// Source patterns.
    pub sources: Vec<PathPattern>,
    /// Resource directories copied into the staging tree.
    pub resources: Vec<PathPattern>,
    /// Explicit staleness patterns; `None` means sources plus resources.
    pub watch: Option<Vec<PathPattern>>,
    /// Explicit artifact path overriding the derived one.
    pub output: Option<PathBuf>,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Manifest entry point.
    pub main_class: Option<String>,
    /// Manifest `Class-Path` entries.
    pub runtime_classpath: Vec<String>,
    /// Files added to the jar from outside the staging tree.
    pub extra_files: Vec<ExtraFile>,
    /// Embed source directories in the jar.
    pub embed_sources: bool,
    /// Plain license text.
    pub license_text: Option<String>,
    /// Structured licenses for the license installer.
    pub licenses: Vec<LicenseDescriptor>,
    /// Files the license texts were read from. They are fingerprinted with
    /// the unit's inputs.
    pub license_files: Vec<PathBuf>,
}

impl UnitSpec {
    /// Creates a spec with the given name and no inputs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            sources: Vec::new(),
            resources: Vec::new(),
            watch: None,
            output: None,
            kind: ArtifactKind::Archive,
            main_class: None,
            runtime_classpath: Vec::new(),
            extra_files: Vec::new(),
            embed_sources: false,
            license_text: None,
            licenses: Vec::new(),
            license_files: Vec::new(),
        }
    }

    /// Adds dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Adds source patterns.
    pub fn sources<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        self.sources.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Adds resource directories.
    pub fn resources<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        self.resources.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Sets explicit staleness patterns.
    pub fn watch<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        self.watch = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the artifact path.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Sets the artifact kind.
    pub fn kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the manifest entry point.
    pub fn main_class(mut self, class: impl Into<String>) -> Self {
        self.main_class = Some(class.into());
        self
    }

    /// Returns the patterns deciding staleness.
    pub fn watched_patterns(&self) -> Vec<PathPattern> {
        match &self.watch {
            Some(watch) => watch.clone(),
            None => self.sources.iter().chain(&self.resources).cloned().collect(),
        }
    }

    /// Returns every pattern the unit's fingerprint covers: the watched
    /// patterns plus each file the archive reads from outside the staging
    /// tree (extra files, license files and embedded source roots).
    pub fn input_patterns(&self) -> Vec<PathPattern> {
        let mut patterns = self.watched_patterns();
        if self.embed_sources && self.watch.is_some() {
            patterns.extend(self.sources.iter().filter(|p| !p.is_glob()).cloned());
        }
        patterns.extend(self.extra_files.iter().map(|extra| PathPattern::literal(&extra.source)));
        patterns.extend(self.license_files.iter().map(PathPattern::literal));
        patterns
    }

    /// Returns the artifact path, derived from the name unless overridden.
    /// A relative override resolves against `root`.
    pub fn output_path(&self, root: &Path, output_dir: &Path) -> PathBuf {
        match &self.output {
            Some(path) => root.join(path),
            None => match self.kind {
                ArtifactKind::Archive => output_dir.join(format!("{}.jar", self.name)),
                ArtifactKind::Directory => output_dir.join(&self.name),
            },
        }
    }
}

/// Per-invocation arguments handed to a [`UnitBuilder`].
#[derive(Debug, Clone)]
pub struct BuildArgs<'a> {
    /// The unit being built.
    pub unit: &'a UnitSpec,
    /// Artifacts of the unit's dependencies, in declaration order.
    pub classpath: Vec<PathBuf>,
    /// Scratch directory owned by this unit for the duration of the build.
    pub staging_dir: PathBuf,
    /// Where the artifact must be written.
    pub output: PathBuf,
    /// Whether this build was forced rather than triggered by a change.
    pub forced: bool,
}

/// A unit's build routine.
///
/// Every unit kind implements this one signature; differences between
/// units live in [`BuildArgs`] and [`UnitSpec`].
pub trait UnitBuilder: Send + Sync {
    /// Produces the unit's artifact at `args.output`.
    fn build(&self, ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError>;
}

/// A registered unit: its spec plus its builder.
#[derive(Clone)]
pub struct BuildUnit {
    spec: UnitSpec,
    builder: Arc<dyn UnitBuilder>,
}

impl BuildUnit {
    /// Pairs a spec with a builder.
    pub fn new(spec: UnitSpec, builder: Arc<dyn UnitBuilder>) -> Self {
        Self { spec, builder }
    }

    /// The unit's name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The unit's spec.
    pub fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    /// The unit's builder.
    pub fn builder(&self) -> &dyn UnitBuilder {
        self.builder.as_ref()
    }
}

impl fmt::Debug for BuildUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildUnit")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
