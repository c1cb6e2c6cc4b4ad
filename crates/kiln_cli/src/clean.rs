//! `kiln clean`: remove artifacts, staging trees and stored fingerprints.

use std::error::Error;
use std::path::{Path, PathBuf};

use kiln_cache::SELF_FINGERPRINT_KEY;

use crate::workspace::Workspace;
use crate::{CleanArgs, GlobalArgs};

/// Runs the `kiln clean` command.
///
/// Cleaning every project also drops the self-fingerprint, so the next
/// build starts from scratch.
pub fn run(args: &CleanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let workspace = Workspace::discover(global)?;
    let removed = clean(&workspace, &args.projects, global)?;
    if !global.quiet {
        for path in &removed {
            eprintln!("    Removed {}", path.display());
        }
    }
    Ok(0)
}

/// Cleans the selected projects and returns the paths that were removed.
fn clean(
    workspace: &Workspace,
    requested: &[String],
    global: &GlobalArgs,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let projects = workspace.select(requested)?;
    let options = workspace.options(global, false);
    let store = workspace.open_store()?;

    let mut removed = Vec::new();
    for name in &projects {
        let spec = Workspace::artifact_spec(name, &workspace.config.projects[name.as_str()]);
        for path in [
            spec.output_path(&options.root, &options.output_dir),
            options.staging_dir.join(name),
        ] {
            if remove_path(&path)? {
                removed.push(path);
            }
        }
        store.remove(name)?;
    }
    if requested.is_empty() {
        store.remove(SELF_FINGERPRINT_KEY)?;
    }
    Ok(removed)
}

/// Removes a file or directory tree. Returns `false` if nothing was there.
fn remove_path(path: &Path) -> Result<bool, Box<dyn Error>> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => Err(e),
    };
    result.map_err(|e| format!("failed to remove {}: {e}", path.display()))?;
    Ok(true)
}
