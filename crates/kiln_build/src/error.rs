//! Error types for build orchestration.

use std::fmt;
use std::path::PathBuf;

use kiln_archive::ArchiveError;
use kiln_cache::CacheError;

use crate::compiler::CompilerDiagnostic;

/// The step of a unit's build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Resolving dependencies and inputs.
    Resolve,
    /// Computing the unit's fingerprint.
    Fingerprint,
    /// Running the unit's builder.
    Build,
    /// Persisting the new fingerprint.
    Persist,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildPhase::Resolve => "resolve",
            BuildPhase::Fingerprint => "fingerprint",
            BuildPhase::Build => "build",
            BuildPhase::Persist => "persist",
        })
    }
}

/// Errors that abort a build run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A unit, source input or classpath entry does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was being looked up ("unit", "source input", ...).
        kind: &'static str,
        /// The missing name or path.
        name: String,
    },

    /// A unit was registered twice with different configuration.
    #[error("unit '{unit}' is already registered with a different configuration")]
    Conflict {
        /// The conflicting unit name.
        unit: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An input file disappeared or became unreadable while fingerprinting.
    #[error("input changed during the build: {path}: {source}")]
    StaleInput {
        /// The affected file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The compiler reported errors.
    #[error("compilation failed with {} error(s){}", error_count(.diagnostics), first_error(.diagnostics))]
    Compile {
        /// Every diagnostic the compiler produced.
        diagnostics: Vec<CompilerDiagnostic>,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle among units: {}", .units.join(", "))]
    Cycle {
        /// Units participating in the cycle, sorted.
        units: Vec<String>,
    },

    /// A fingerprinting or store operation failed.
    #[error(transparent)]
    Cache(CacheError),

    /// Archive assembly failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The worker pool for parallel units could not be created.
    #[error("failed to start build workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Context wrapper naming the unit and phase that failed.
    #[error("unit '{unit}' failed during {phase}: {source}")]
    Unit {
        /// The failing unit.
        unit: String,
        /// The phase it failed in.
        phase: BuildPhase,
        /// The underlying error.
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Wraps `self` with unit and phase context. Errors that already carry
    /// unit context are returned unchanged.
    pub fn in_unit(self, unit: &str, phase: BuildPhase) -> Self {
        match self {
            BuildError::Unit { .. } => self,
            other => BuildError::Unit {
                unit: unit.to_string(),
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Returns the unit this error is attributed to, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            BuildError::Unit { unit, .. } => Some(unit),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<CacheError> for BuildError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::StaleInput { path, source } => BuildError::StaleInput { path, source },
            other => BuildError::Cache(other),
        }
    }
}

fn error_count(diagnostics: &[CompilerDiagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn first_error(diagnostics: &[CompilerDiagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| format!("; first: {d}"))
        .unwrap_or_default()
}
