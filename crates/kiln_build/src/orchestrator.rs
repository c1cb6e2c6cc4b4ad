//! Dependency-ordered, at-most-once unit building.
//!
//! [`Orchestrator::build`] resolves a unit's registered dependency closure,
//! splits it into waves and builds wave after wave. Units of one wave run
//! in parallel when more than one job is allowed. A unit is skipped when the
//! run is not forced, its fingerprint matches the stored one and its
//! artifact is still present. The first failure stops the run once the
//! failing wave has finished; fingerprints persisted by earlier units stay.

use std::fmt;
use std::sync::Arc;

use kiln_cache::PathPattern;
use kiln_common::Fingerprint;
use rayon::prelude::*;

use crate::context::BuildContext;
use crate::error::{BuildError, BuildPhase};
use crate::graph::DependencyGraph;
use crate::registry::Claim;
use crate::unit::{BuildArgs, BuildUnit};

/// What happened to one unit during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The builder ran and the new fingerprint was persisted.
    Built,
    /// Inputs and artifact were unchanged; the builder did not run.
    Skipped,
    /// The unit had already been handled earlier in this run.
    AlreadyBuilt,
}

/// Units handled by a build call, in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    entries: Vec<(String, UnitOutcome)>,
}

impl BuildReport {
    fn push(&mut self, unit: &str, outcome: UnitOutcome) {
        self.entries.push((unit.to_string(), outcome));
    }

    /// Appends every entry of `other`.
    pub fn merge(&mut self, other: BuildReport) {
        self.entries.extend(other.entries);
    }

    /// Every `(unit, outcome)` pair in build order.
    pub fn entries(&self) -> &[(String, UnitOutcome)] {
        &self.entries
    }

    /// The outcome recorded for `unit`, if it took part.
    pub fn outcome(&self, unit: &str) -> Option<UnitOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == unit)
            .map(|(_, outcome)| *outcome)
    }

    /// Names of the units whose builder ran.
    pub fn built(&self) -> Vec<&str> {
        self.with_outcome(UnitOutcome::Built)
    }

    /// Names of the units skipped as up to date.
    pub fn skipped(&self) -> Vec<&str> {
        self.with_outcome(UnitOutcome::Skipped)
    }

    fn with_outcome(&self, wanted: UnitOutcome) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome == wanted)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Why a unit would or would not be rebuilt. Produced by
/// [`Orchestrator::plan`] without running any builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Up to date; would be skipped.
    Fresh,
    /// Fingerprint differs from the stored value or none is stored.
    Stale,
    /// Fingerprint matches but the artifact is gone.
    MissingArtifact,
    /// The run is forced.
    Forced,
    /// No watched file exists, so staleness cannot be decided.
    UnknownInputs,
}

impl UnitStatus {
    /// Whether a build would run the unit's builder.
    pub fn needs_build(self) -> bool {
        self != UnitStatus::Fresh
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitStatus::Fresh => "fresh",
            UnitStatus::Stale => "stale",
            UnitStatus::MissingArtifact => "missing-artifact",
            UnitStatus::Forced => "forced",
            UnitStatus::UnknownInputs => "unknown-inputs",
        })
    }
}

/// Drives builds within one [`BuildContext`].
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'a> {
    ctx: &'a BuildContext,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator over `ctx`.
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    /// Builds `name` and everything it depends on.
    pub fn build(&self, name: &str) -> Result<BuildReport, BuildError> {
        self.build_many(&[name])
    }

    /// Builds every named unit and their dependencies. Units already built
    /// this run are reported as [`UnitOutcome::AlreadyBuilt`].
    pub fn build_many(&self, names: &[&str]) -> Result<BuildReport, BuildError> {
        let registry = self.ctx.registry();
        let mut report = BuildReport::default();
        let pending: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| {
                let done = registry.was_built(name);
                if done {
                    report.push(name, UnitOutcome::AlreadyBuilt);
                }
                !done
            })
            .collect();
        if pending.is_empty() {
            return Ok(report);
        }

        let graph = DependencyGraph::resolve(registry, &pending)?;
        let jobs = self.ctx.options().jobs.max(1);
        let pool = if jobs > 1 {
            Some(rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?)
        } else {
            None
        };

        for (index, wave) in graph.waves().into_iter().enumerate() {
            tracing::debug!(wave = index, units = wave.len(), "starting wave");
            let results: Vec<(String, Result<UnitOutcome, BuildError>)> = match &pool {
                Some(pool) if wave.len() > 1 => pool.install(|| {
                    wave.par_iter()
                        .map(|unit| (unit.name().to_string(), self.build_unit(unit)))
                        .collect()
                }),
                _ => wave
                    .iter()
                    .map(|unit| (unit.name().to_string(), self.build_unit(unit)))
                    .collect(),
            };

            let mut first_error = None;
            for (name, result) in results {
                match result {
                    Ok(outcome) => report.push(&name, outcome),
                    Err(e) if first_error.is_none() => first_error = Some(e),
                    Err(e) => tracing::error!(unit = %name, error = %e, "unit failed"),
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }
        }
        Ok(report)
    }

    /// Reports what [`build`](Self::build) would do for `name` and its
    /// dependencies without running any builder.
    ///
    /// Dependency artifacts are fingerprinted as they are now, so a unit
    /// downstream of a stale one may show as fresh until that one rebuilds.
    pub fn plan(&self, name: &str) -> Result<Vec<(String, UnitStatus)>, BuildError> {
        let graph = DependencyGraph::resolve(self.ctx.registry(), &[name])?;
        let mut statuses = Vec::with_capacity(graph.len());
        for unit in graph.waves().into_iter().flatten() {
            let fingerprint = self
                .fingerprint(&unit)
                .map_err(|e| e.in_unit(unit.name(), BuildPhase::Fingerprint))?;
            statuses.push((unit.name().to_string(), self.status(&unit, fingerprint.as_ref())));
        }
        Ok(statuses)
    }

    fn status(&self, unit: &BuildUnit, fingerprint: Option<&Fingerprint>) -> UnitStatus {
        let opts = self.ctx.options();
        let spec = unit.spec();
        let Some(fingerprint) = fingerprint else {
            return UnitStatus::UnknownInputs;
        };
        if self.ctx.force_rebuild() {
            return UnitStatus::Forced;
        }
        if self.ctx.store().get(unit.name()).as_deref() != Some(fingerprint.to_string().as_str()) {
            return UnitStatus::Stale;
        }
        if !spec.kind.is_present(&spec.output_path(&opts.root, &opts.output_dir)) {
            return UnitStatus::MissingArtifact;
        }
        UnitStatus::Fresh
    }

    fn build_unit(&self, unit: &Arc<BuildUnit>) -> Result<UnitOutcome, BuildError> {
        let registry = self.ctx.registry();
        let name = unit.name();
        if registry.claim(name) == Claim::Built {
            return Ok(UnitOutcome::AlreadyBuilt);
        }
        let result = self.run_unit(unit);
        match &result {
            Ok(_) => registry.mark_built(name),
            Err(_) => registry.abandon(name),
        }
        result
    }

    fn run_unit(&self, unit: &BuildUnit) -> Result<UnitOutcome, BuildError> {
        let name = unit.name();
        let spec = unit.spec();
        let opts = self.ctx.options();

        let fingerprint = self
            .fingerprint(unit)
            .map_err(|e| e.in_unit(name, BuildPhase::Fingerprint))?;
        let status = self.status(unit, fingerprint.as_ref());
        if !status.needs_build() {
            tracing::info!(unit = %name, "up to date");
            return Ok(UnitOutcome::Skipped);
        }

        tracing::info!(unit = %name, reason = %status, "building");
        let args = BuildArgs {
            unit: spec,
            classpath: self.classpath(unit),
            staging_dir: opts.staging_dir.join(name),
            output: spec.output_path(&opts.root, &opts.output_dir),
            forced: status == UnitStatus::Forced,
        };
        unit.builder()
            .build(self.ctx, &args)
            .map_err(|e| e.in_unit(name, BuildPhase::Build))?;

        let store = self.ctx.store();
        let persisted = match &fingerprint {
            Some(fp) => store.save(name, &fp.to_string()),
            None => store.remove(name).map(|_| ()),
        };
        persisted.map_err(|e| BuildError::from(e).in_unit(name, BuildPhase::Persist))?;
        Ok(UnitOutcome::Built)
    }

    /// Fingerprints the unit's input paths plus the artifacts of its
    /// registered direct dependencies.
    fn fingerprint(&self, unit: &BuildUnit) -> Result<Option<Fingerprint>, BuildError> {
        let opts = self.ctx.options();
        let mut patterns = unit.spec().input_patterns();
        for dep in &unit.spec().dependencies {
            if let Some(dep_unit) = self.ctx.registry().lookup(dep) {
                let spec = dep_unit.spec();
                patterns.push(PathPattern::literal(spec.output_path(&opts.root, &opts.output_dir)));
            }
        }
        Ok(self.ctx.engine().fingerprint(&patterns)?)
    }

    /// Dependency artifacts in declaration order. External dependencies
    /// are included when they name an existing path.
    fn classpath(&self, unit: &BuildUnit) -> Vec<std::path::PathBuf> {
        let opts = self.ctx.options();
        let mut classpath = Vec::new();
        for dep in &unit.spec().dependencies {
            match self.ctx.registry().lookup(dep) {
                Some(dep_unit) => {
                    let spec = dep_unit.spec();
                    classpath.push(spec.output_path(&opts.root, &opts.output_dir));
                }
                None => {
                    let path = opts.resolve(dep);
                    if path.exists() {
                        classpath.push(path);
                    } else {
                        tracing::debug!(unit = %unit.name(), dependency = %dep, "external dependency not on disk");
                    }
                }
            }
        }
        classpath
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildOptions;
    use crate::unit::{UnitBuilder, UnitSpec};
    use kiln_cache::FingerprintStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes the artifact and counts invocations.
    #[derive(Default)]
    struct Touch {
        calls: AtomicUsize,
    }

    impl UnitBuilder for Touch {
        fn build(&self, _ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(args.output.parent().unwrap()).unwrap();
            std::fs::write(&args.output, args.unit.name.as_bytes()).unwrap();
            Ok(())
        }
    }

    struct Fail;

    impl UnitBuilder for Fail {
        fn build(&self, _ctx: &BuildContext, _args: &BuildArgs<'_>) -> Result<(), BuildError> {
            Err(BuildError::NotFound {
                kind: "source input",
                name: "src".to_string(),
            })
        }
    }

    fn context(dir: &std::path::Path) -> BuildContext {
        let store = FingerprintStore::open(dir.join(".kiln/fp.properties")).unwrap();
        BuildContext::new(BuildOptions::new(dir), store)
    }

    fn write(dir: &std::path::Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn builds_then_skips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/Main.java", "v1");
        let touch = Arc::new(Touch::default());

        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), touch.clone()));
        let report = Orchestrator::new(&ctx).build("a").unwrap();
        assert_eq!(report.built(), vec!["a"]);

        // Same run: already built.
        let report = Orchestrator::new(&ctx).build("a").unwrap();
        assert_eq!(report.outcome("a"), Some(UnitOutcome::AlreadyBuilt));

        // Next run: unchanged.
        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), touch.clone()));
        let report = Orchestrator::new(&ctx).build("a").unwrap();
        assert_eq!(report.skipped(), vec!["a"]);
        assert_eq!(touch.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_artifact_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/Main.java", "v1");
        let touch = Arc::new(Touch::default());
        let register = |ctx: &BuildContext| {
            ctx.registry()
                .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), touch.clone()));
        };

        let ctx = context(dir.path());
        register(&ctx);
        Orchestrator::new(&ctx).build("a").unwrap();
        std::fs::remove_file(dir.path().join("build/a.jar")).unwrap();

        let ctx = context(dir.path());
        register(&ctx);
        assert_eq!(
            Orchestrator::new(&ctx).plan("a").unwrap(),
            vec![("a".to_string(), UnitStatus::MissingArtifact)]
        );
        assert_eq!(Orchestrator::new(&ctx).build("a").unwrap().built(), vec!["a"]);
    }

    #[test]
    fn unknown_inputs_always_build_and_clear_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.store().save("a", "stale").unwrap();
        ctx.registry().register(BuildUnit::new(
            UnitSpec::new("a").watch(["nothing/*.java"]),
            Arc::new(Touch::default()),
        ));
        assert_eq!(
            Orchestrator::new(&ctx).plan("a").unwrap()[0].1,
            UnitStatus::UnknownInputs
        );
        Orchestrator::new(&ctx).build("a").unwrap();
        assert!(ctx.store().get("a").is_none());
    }

    #[test]
    fn failure_is_attributed_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/Main.java", "v1");
        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), Arc::new(Fail)));

        let err = Orchestrator::new(&ctx).build("a").unwrap_err();
        assert_eq!(err.unit(), Some("a"));
        assert!(matches!(err, BuildError::Unit { phase: BuildPhase::Build, .. }));
        assert!(ctx.store().get("a").is_none());
        assert!(!ctx.registry().was_built("a"));
    }

    #[test]
    fn failure_stops_later_waves() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/x", "x");
        let touch = Arc::new(Touch::default());
        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("base").sources(["src"]), Arc::new(Fail)));
        ctx.registry().register(BuildUnit::new(
            UnitSpec::new("top").sources(["src"]).depends_on(["base"]),
            touch.clone(),
        ));

        assert!(Orchestrator::new(&ctx).build("top").is_err());
        assert_eq!(touch.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn forced_run_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/Main.java", "v1");
        let touch = Arc::new(Touch::default());

        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), touch.clone()));
        Orchestrator::new(&ctx).build("a").unwrap();

        let store = FingerprintStore::open(dir.path().join(".kiln/fp.properties")).unwrap();
        let mut opts = BuildOptions::new(dir.path());
        opts.force = true;
        let ctx = BuildContext::new(opts, store);
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("a").sources(["a"]), touch.clone()));
        assert_eq!(Orchestrator::new(&ctx).plan("a").unwrap()[0].1, UnitStatus::Forced);
        assert_eq!(Orchestrator::new(&ctx).build("a").unwrap().built(), vec!["a"]);
        assert_eq!(touch.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn external_dependency_on_disk_joins_classpath() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib/junit.jar", "jar");
        let ctx = context(dir.path());
        let spec = UnitSpec::new("a").depends_on(["lib/junit.jar", "missing.jar"]);
        let unit = BuildUnit::new(spec, Arc::new(Touch::default()));
        let classpath = Orchestrator::new(&ctx).classpath(&unit);
        assert_eq!(classpath, vec![dir.path().join("lib/junit.jar")]);
    }

    /// Writes its artifact only after a pause.
    struct Slow;

    impl UnitBuilder for Slow {
        fn build(&self, _ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
            std::thread::sleep(std::time::Duration::from_millis(100));
            std::fs::create_dir_all(args.output.parent().unwrap()).unwrap();
            std::fs::write(&args.output, b"slow").unwrap();
            Ok(())
        }
    }

    /// Fails unless every classpath entry is already on disk.
    struct NeedsClasspath;

    impl UnitBuilder for NeedsClasspath {
        fn build(&self, _ctx: &BuildContext, args: &BuildArgs<'_>) -> Result<(), BuildError> {
            if let Some(missing) = args.classpath.iter().find(|p| !p.exists()) {
                return Err(BuildError::NotFound {
                    kind: "classpath entry",
                    name: missing.display().to_string(),
                });
            }
            std::fs::write(&args.output, b"top").unwrap();
            Ok(())
        }
    }

    #[test]
    fn concurrent_callers_wait_for_shared_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/x", "x");
        let ctx = context(dir.path());
        ctx.registry()
            .register(BuildUnit::new(UnitSpec::new("dep").sources(["src"]), Arc::new(Slow)));
        for top in ["left", "right"] {
            ctx.registry().register(BuildUnit::new(
                UnitSpec::new(top).sources(["src"]).depends_on(["dep"]),
                Arc::new(NeedsClasspath),
            ));
        }

        let (left, right) = std::thread::scope(|s| {
            let left = s.spawn(|| Orchestrator::new(&ctx).build("left"));
            let right = s.spawn(|| Orchestrator::new(&ctx).build("right"));
            (left.join().unwrap(), right.join().unwrap())
        });
        let (left, right) = (left.unwrap(), right.unwrap());

        assert_eq!(left.outcome("left"), Some(UnitOutcome::Built));
        assert_eq!(right.outcome("right"), Some(UnitOutcome::Built));
        let dep_built = [left.outcome("dep"), right.outcome("dep")]
            .iter()
            .filter(|o| **o == Some(UnitOutcome::Built))
            .count();
        assert_eq!(dep_built, 1);
    }

    #[test]
    fn unit_status_display() {
        assert_eq!(UnitStatus::MissingArtifact.to_string(), "missing-artifact");
        assert_eq!(UnitStatus::UnknownInputs.to_string(), "unknown-inputs");
        assert!(!UnitStatus::Fresh.needs_build());
    }
}
