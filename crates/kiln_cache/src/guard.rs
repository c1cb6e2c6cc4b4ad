//! Self-invalidation: rebuild everything when the build tool itself changed.

use kiln_common::Fingerprint;

use crate::error::CacheError;
use crate::fingerprint::FingerprintEngine;
use crate::pattern::PathPattern;
use crate::store::FingerprintStore;

/// Store key reserved for the build tool's own fingerprint.
pub const SELF_FINGERPRINT_KEY: &str = "BUILD";

/// Fingerprints a fixed set of the tool's implementation files.
#[derive(Debug, Clone)]
pub struct SelfInvalidationGuard {
    /// Files whose content defines "the tool's logic".
    paths: Vec<PathPattern>,
}

/// Result of a self-invalidation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Every unit must be rebuilt during this run.
    pub force_rebuild: bool,

    /// The previously stored self-fingerprint, if any.
    pub previous: Option<String>,

    /// The freshly computed self-fingerprint (absent if no file matched).
    pub current: Option<Fingerprint>,
}

impl SelfInvalidationGuard {
    /// Creates a guard over the given implementation files.
    pub fn new(paths: Vec<PathPattern>) -> Self {
        Self { paths }
    }

    /// Returns the guarded paths.
    pub fn paths(&self) -> &[PathPattern] {
        &self.paths
    }

    /// Compares the tool's fingerprint against the stored one without
    /// touching the store.
    ///
    /// The outcome forces a rebuild unless a fingerprint was computed and
    /// equals the stored value. No stored value, an unreadable one, or no
    /// matching files all count as changed.
    pub fn peek(
        &self,
        engine: &FingerprintEngine,
        store: &FingerprintStore,
    ) -> Result<GuardOutcome, CacheError> {
        let current = engine.fingerprint(&self.paths)?;
        let previous = store.get(SELF_FINGERPRINT_KEY);
        let unchanged = matches!(
            (&current, &previous),
            (Some(fp), Some(prev)) if fp.to_string() == *prev
        );
        Ok(GuardOutcome {
            force_rebuild: !unchanged,
            previous,
            current,
        })
    }

    /// Like [`peek`](Self::peek), but on any difference the new
    /// self-fingerprint is persisted right away rather than after the units
    /// finish.
    pub fn check(
        &self,
        engine: &FingerprintEngine,
        store: &FingerprintStore,
    ) -> Result<GuardOutcome, CacheError> {
        let outcome = self.peek(engine, store)?;
        if !outcome.force_rebuild {
            tracing::debug!("build tool unchanged since last run");
            return Ok(outcome);
        }

        match &outcome.current {
            Some(fp) => store.save(SELF_FINGERPRINT_KEY, &fp.to_string())?,
            None => {
                store.remove(SELF_FINGERPRINT_KEY)?;
            }
        }
        tracing::info!(
            had_previous = outcome.previous.is_some(),
            "build tool changed since last run; rebuilding every unit"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        engine: FingerprintEngine,
        guard: SelfInvalidationGuard,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("kiln-bin"), b"v1").unwrap();
            let engine = FingerprintEngine::new(dir.path());
            let guard = SelfInvalidationGuard::new(vec!["kiln-bin".into()]);
            Self { dir, engine, guard }
        }

        fn store(&self) -> FingerprintStore {
            FingerprintStore::open(self.dir.path().join("fp.properties")).unwrap()
        }
    }

    #[test]
    fn first_run_forces_and_persists() {
        let f = Fixture::new();
        let store = f.store();
        let outcome = f.guard.check(&f.engine, &store).unwrap();
        assert!(outcome.force_rebuild);
        assert!(outcome.previous.is_none());
        assert!(f.store().get(SELF_FINGERPRINT_KEY).is_some());
    }

    #[test]
    fn second_run_is_not_forced() {
        let f = Fixture::new();
        f.guard.check(&f.engine, &f.store()).unwrap();
        let outcome = f.guard.check(&f.engine, &f.store()).unwrap();
        assert!(!outcome.force_rebuild);
    }

    #[test]
    fn changed_tool_forces() {
        let f = Fixture::new();
        f.guard.check(&f.engine, &f.store()).unwrap();
        std::fs::write(f.dir.path().join("kiln-bin"), b"v2").unwrap();
        let outcome = f.guard.check(&f.engine, &f.store()).unwrap();
        assert!(outcome.force_rebuild);
        assert!(!f.guard.check(&f.engine, &f.store()).unwrap().force_rebuild);
    }

    #[test]
    fn corrupted_key_forces() {
        let f = Fixture::new();
        let store = f.store();
        f.guard.check(&f.engine, &store).unwrap();
        store.save(SELF_FINGERPRINT_KEY, "garbage").unwrap();
        assert!(f.guard.check(&f.engine, &f.store()).unwrap().force_rebuild);
    }

    #[test]
    fn peek_reports_without_persisting() {
        let f = Fixture::new();
        let store = f.store();
        assert!(f.guard.peek(&f.engine, &store).unwrap().force_rebuild);
        assert!(store.get(SELF_FINGERPRINT_KEY).is_none());

        f.guard.check(&f.engine, &store).unwrap();
        assert!(!f.guard.peek(&f.engine, &store).unwrap().force_rebuild);

        std::fs::write(f.dir.path().join("kiln-bin"), b"v2").unwrap();
        let stored = store.get(SELF_FINGERPRINT_KEY);
        assert!(f.guard.peek(&f.engine, &store).unwrap().force_rebuild);
        assert_eq!(store.get(SELF_FINGERPRINT_KEY), stored);
    }

    #[test]
    fn peek_with_nothing_stored_and_nothing_matched_is_changed() {
        let f = Fixture::new();
        let store = f.store();
        let guard = SelfInvalidationGuard::new(vec!["does-not-exist".into()]);
        let outcome = guard.peek(&f.engine, &store).unwrap();
        assert!(outcome.force_rebuild);
        assert!(outcome.current.is_none() && outcome.previous.is_none());
    }

    #[test]
    fn no_matching_files_forces_and_clears() {
        let f = Fixture::new();
        let store = f.store();
        store.save(SELF_FINGERPRINT_KEY, "stale").unwrap();
        let guard = SelfInvalidationGuard::new(vec!["does-not-exist".into()]);
        let outcome = guard.check(&f.engine, &store).unwrap();
        assert!(outcome.force_rebuild);
        assert!(outcome.current.is_none());
        assert!(store.get(SELF_FINGERPRINT_KEY).is_none());
    }
}
