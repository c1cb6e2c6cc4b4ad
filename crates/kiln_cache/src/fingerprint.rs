//! Content fingerprinting over path pattern sets.
//!
//! The engine expands patterns into a sorted file list, digests every file in
//! parallel into an index-addressed vector, then folds each file's name and
//! digest in sorted path order. Hashing is therefore independent of how the
//! filesystem or the caller happened to enumerate the files, while renames
//! and moves still change the result.

use std::fs::File;
use std::path::{Path, PathBuf};

use kiln_common::{ContentDigest, Fingerprint};
use rayon::prelude::*;

use crate::error::CacheError;
use crate::pattern::{self, PathPattern};

/// Computes fingerprints for pattern sets resolved against a root directory.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    /// Directory that relative patterns resolve against.
    root: PathBuf,
}

impl FingerprintEngine {
    /// Creates an engine resolving relative patterns against `root`.
    ///
    /// A relative `root` is anchored at the current working directory so
    /// that resolved paths are always absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self {
            root: pattern::normalize(&root),
        }
    }

    /// Returns the directory relative patterns resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expands `patterns` into a sorted, de-duplicated list of files.
    pub fn resolve(&self, patterns: &[PathPattern]) -> Result<Vec<PathBuf>, CacheError> {
        Ok(pattern::expand_all(&self.root, patterns)?.into_iter().collect())
    }

    /// Fingerprints every file matched by `patterns`.
    ///
    /// Returns `Ok(None)` when no file matches: there is nothing to compare,
    /// so callers must treat the unit as stale.
    pub fn fingerprint(&self, patterns: &[PathPattern]) -> Result<Option<Fingerprint>, CacheError> {
        let files = self.resolve(patterns)?;
        Self::fingerprint_sorted(Some(self.root.as_path()), &files)
    }

    /// Fingerprints an explicit file list.
    ///
    /// The list is sorted and de-duplicated first, so callers may pass files
    /// in any order. Paths are folded exactly as given.
    pub fn fingerprint_files(files: &[PathBuf]) -> Result<Option<Fingerprint>, CacheError> {
        let mut files = files.to_vec();
        files.sort();
        files.dedup();
        Self::fingerprint_sorted(None, &files)
    }

    /// Digests a single file by streaming its contents.
    ///
    /// Failing to open or read the file is a [`CacheError::StaleInput`]: the
    /// caller already decided the file belongs to the set.
    pub fn digest_file(path: &Path) -> Result<ContentDigest, CacheError> {
        let stale = |source| CacheError::StaleInput {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(stale)?;
        ContentDigest::from_reader(file).map_err(stale)
    }

    /// Name a file contributes to the fold: its path relative to `root` with
    /// `/` separators, or the whole path when it lies outside `root`.
    fn entry_name(root: Option<&Path>, path: &Path) -> String {
        let rel = root
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn fingerprint_sorted(
        root: Option<&Path>,
        files: &[PathBuf],
    ) -> Result<Option<Fingerprint>, CacheError> {
        if files.is_empty() {
            return Ok(None);
        }

        // Each worker writes into its own slot; the fold below walks the
        // slots in sorted-path order.
        let digests = files
            .par_iter()
            .map(|path| Self::digest_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        let names: Vec<String> = files.iter().map(|f| Self::entry_name(root, f)).collect();
        let fingerprint = Fingerprint::fold_named(
            names.iter().map(String::as_str).zip(digests.iter()),
        );
        tracing::trace!(files = files.len(), %fingerprint, "fingerprinted file set");
        Ok(Some(fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn engine(dir: &tempfile::TempDir) -> FingerprintEngine {
        FingerprintEngine::new(dir.path())
    }

    #[test]
    fn empty_set_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let fp = engine(&dir).fingerprint(&["missing/**/*.java".into()]).unwrap();
        assert!(fp.is_none());
        assert!(FingerprintEngine::fingerprint_files(&[]).unwrap().is_none());
    }

    #[test]
    fn independent_of_pattern_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/One.java", b"one");
        write(dir.path(), "b/Two.java", b"two");
        write(dir.path(), "c.txt", b"three");
        let e = engine(&dir);

        let forward = e
            .fingerprint(&["a".into(), "b".into(), "c.txt".into()])
            .unwrap();
        let backward = e
            .fingerprint(&["c.txt".into(), "b".into(), "a".into()])
            .unwrap();
        assert!(forward.is_some());
        assert_eq!(forward, backward);
    }

    #[test]
    fn independent_of_file_list_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", b"a");
        let b = write(dir.path(), "b", b"b");
        let one = FingerprintEngine::fingerprint_files(&[a.clone(), b.clone()]).unwrap();
        let two = FingerprintEngine::fingerprint_files(&[b, a]).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn single_byte_change_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/A.java", b"class A {}");
        write(dir.path(), "src/B.java", b"class B {}");
        let e = engine(&dir);
        let before = e.fingerprint(&["src".into()]).unwrap();

        write(dir.path(), "src/B.java", b"class B {};");
        let after = e.fingerprint(&["src".into()]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn adding_and_removing_files_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/A.java", b"class A {}");
        let e = engine(&dir);
        let base = e.fingerprint(&["src".into()]).unwrap();

        let extra = write(dir.path(), "src/Extra.java", b"class Extra {}");
        let added = e.fingerprint(&["src".into()]).unwrap();
        assert_ne!(base, added);

        std::fs::remove_file(extra).unwrap();
        let removed = e.fingerprint(&["src".into()]).unwrap();
        assert_eq!(base, removed);
    }

    #[test]
    fn renaming_a_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "res/a.properties", b"key=value");
        let e = engine(&dir);
        let before = e.fingerprint(&["res".into()]).unwrap();

        std::fs::rename(&old, dir.path().join("res/b.properties")).unwrap();
        let after = e.fingerprint(&["res".into()]).unwrap();
        assert!(after.is_some());
        assert_ne!(before, after);
    }

    #[test]
    fn moving_a_file_between_directories_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a/A.java", b"class A {}");
        let e = engine(&dir);
        let before = e.fingerprint(&["src".into()]).unwrap();

        std::fs::create_dir_all(dir.path().join("src/b")).unwrap();
        std::fs::rename(dir.path().join("src/a/A.java"), dir.path().join("src/b/A.java")).unwrap();
        let after = e.fingerprint(&["src".into()]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn relocated_root_keeps_fingerprint() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        write(one.path(), "res/a.txt", b"a");
        write(two.path(), "res/a.txt", b"a");
        assert_eq!(
            engine(&one).fingerprint(&["res".into()]).unwrap(),
            engine(&two).fingerprint(&["res".into()]).unwrap()
        );
    }

    #[test]
    fn mtime_only_touch_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "src/A.java", b"class A {}");
        let e = engine(&dir);
        let before = e.fingerprint(&["src".into()]).unwrap();

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(3600))
            .unwrap();
        drop(file);

        let after = e.fingerprint(&["src".into()]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn vanished_file_is_stale_input() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.txt");
        let err = FingerprintEngine::fingerprint_files(&[gone]).unwrap_err();
        assert!(matches!(err, CacheError::StaleInput { .. }));
    }

    #[test]
    fn relative_root_is_anchored() {
        let e = FingerprintEngine::new("some/relative/dir");
        assert!(e.root().is_absolute());
    }
}
