//! `kiln fingerprint`: print the fingerprint of a set of paths.

use std::error::Error;
use std::path::Path;

use kiln_cache::{FingerprintEngine, PathPattern};
use kiln_common::Fingerprint;

use crate::{FingerprintArgs, GlobalArgs};

/// Runs the `kiln fingerprint` command.
///
/// Prints the fingerprint and exits 0, or exits 1 when no file matches.
pub fn run(args: &FingerprintArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let patterns: Vec<PathPattern> = args.patterns.iter().map(PathPattern::new).collect();
    let engine = FingerprintEngine::new(&cwd);

    if args.list {
        for file in engine.resolve(&patterns)? {
            let shown = file.strip_prefix(&cwd).unwrap_or(&file);
            println!("{}", shown.display());
        }
    }
    match fingerprint(&cwd, &patterns)? {
        Some(fp) => {
            println!("{fp}");
            Ok(0)
        }
        None => {
            if !global.quiet {
                eprintln!("no files match {}", args.patterns.join(" "));
            }
            Ok(1)
        }
    }
}

fn fingerprint(root: &Path, patterns: &[PathPattern]) -> Result<Option<Fingerprint>, Box<dyn Error>> {
    Ok(FingerprintEngine::new(root).fingerprint(patterns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write;

    #[test]
    fn same_contents_same_fingerprint() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [a.path(), b.path()] {
            write(dir, "src/A.java", "class A {}");
            write(dir, "src/B.java", "class B {}");
        }
        let patterns = vec![PathPattern::new("src/**/*.java")];
        let fa = fingerprint(a.path(), &patterns).unwrap();
        let fb = fingerprint(b.path(), &patterns).unwrap();
        assert!(fa.is_some());
        assert_eq!(fa, fb);

        write(b.path(), "src/B.java", "class B { int x; }");
        assert_ne!(fingerprint(b.path(), &patterns).unwrap(), fa);
    }

    #[test]
    fn no_match_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![PathPattern::new("missing/*.txt")];
        assert!(fingerprint(dir.path(), &patterns).unwrap().is_none());
    }
}
