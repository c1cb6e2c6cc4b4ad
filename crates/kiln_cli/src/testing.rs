//! Shared fixtures for command tests.

use std::fs;
use std::path::Path;

use crate::GlobalArgs;

/// Two resource-only projects, so builds need no compiler.
pub const RESOURCE_ONLY: &str = r#"
[projects.assets]
resources = ["assets/res"]

[projects.bundle]
dependencies = ["assets"]
resources = ["bundle/res"]
"#;

/// Writes the resource-only workspace into `dir`.
pub fn project(dir: &Path) {
    fs::write(dir.join("kiln.toml"), RESOURCE_ONLY).unwrap();
    for (rel, text) in [("assets/res/logo.txt", "logo"), ("bundle/res/app.properties", "x=1")] {
        write(dir, rel, text);
    }
}

/// Writes `text` to `dir/rel`, creating parent directories.
pub fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// Quiet, single-job global flags pointing at `dir`.
pub fn global(dir: &Path) -> GlobalArgs {
    GlobalArgs {
        quiet: true,
        verbose: false,
        config: Some(dir.to_string_lossy().into_owned()),
        jobs: Some(1),
    }
}
