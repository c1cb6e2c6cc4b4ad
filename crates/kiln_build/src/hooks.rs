//! Pre-archive hook.

use std::path::Path;

use crate::error::BuildError;
use crate::unit::UnitSpec;

/// Runs right before a unit's staging tree is archived.
///
/// The hook may add, rewrite or delete files under `staging_dir`; the
/// archive is assembled from whatever the tree holds when it returns.
pub trait PreArchiveHook: Send + Sync {
    /// Called with the unit and its populated staging directory.
    fn before_archive(&self, unit: &UnitSpec, staging_dir: &Path) -> Result<(), BuildError>;
}

impl<F> PreArchiveHook for F
where
    F: Fn(&UnitSpec, &Path) -> Result<(), BuildError> + Send + Sync,
{
    fn before_archive(&self, unit: &UnitSpec, staging_dir: &Path) -> Result<(), BuildError> {
        self(unit, staging_dir)
    }
}
