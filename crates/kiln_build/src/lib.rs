//! Incremental build orchestration for Kiln.
//!
//! A [`BuildContext`] owns the unit [`Registry`], the persistent
//! fingerprint store and the run options. The [`Orchestrator`] walks a
//! unit's dependency closure wave by wave, skips units whose inputs and
//! artifacts are unchanged, and runs each remaining unit's
//! [`UnitBuilder`] at most once per run.

#![warn(missing_docs)]

pub mod compiler;
pub mod context;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod java;
pub mod orchestrator;
pub mod registry;
pub mod unit;

pub use compiler::{CompileRequest, Compiler, CompilerDiagnostic, JavacCompiler, Severity};
pub use context::{BuildContext, BuildOptions};
pub use error::{BuildError, BuildPhase};
pub use graph::DependencyGraph;
pub use hooks::PreArchiveHook;
pub use java::JavaUnitBuilder;
pub use orchestrator::{BuildReport, Orchestrator, UnitOutcome, UnitStatus};
pub use registry::{Claim, Registry};
pub use unit::{ArtifactKind, BuildArgs, BuildUnit, UnitBuilder, UnitSpec};
