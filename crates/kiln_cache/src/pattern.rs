//! Path patterns and their expansion into concrete file sets.
//!
//! A pattern is either a literal path or a glob. Literal files contribute
//! themselves, literal directories contribute every regular file beneath
//! them, and globs contribute every regular file they match beneath their
//! longest literal prefix. Anything that does not resolve to a readable
//! regular file is silently left out.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::CacheError;

/// Characters that turn a pattern into a glob.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A filesystem path pattern whose matching files decide staleness.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    literal: bool,
}

impl PathPattern {
    /// Creates a pattern, treating it as a glob if it contains glob syntax.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let literal = !raw.contains(GLOB_META);
        Self { raw, literal }
    }

    /// Creates a pattern that always matches exactly `path`, even if the path
    /// contains characters that would otherwise be glob syntax.
    pub fn literal(path: impl AsRef<Path>) -> Self {
        Self {
            raw: path.as_ref().to_string_lossy().into_owned(),
            literal: true,
        }
    }

    /// Returns the pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if this pattern is a glob rather than a literal path.
    pub fn is_glob(&self) -> bool {
        !self.literal
    }

    /// Expands this pattern relative to `root` into `out`.
    pub fn expand_into(&self, root: &Path, out: &mut BTreeSet<PathBuf>) -> Result<(), CacheError> {
        if self.literal {
            let path = normalize(&root.join(&self.raw));
            collect_files(&path, out);
            return Ok(());
        }

        let (prefix, _) = split_literal_prefix(&self.raw);
        let base = normalize(&root.join(prefix));
        let full = normalize(&root.join(&self.raw));
        let matcher = GlobBuilder::new(&full.to_string_lossy())
            .literal_separator(true)
            .build()
            .map_err(|e| CacheError::InvalidPattern {
                pattern: self.raw.clone(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        for path in walk_files(&base) {
            if matcher.is_match(&path) {
                out.insert(path);
            }
        }
        Ok(())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({:?})", self.raw)
    }
}

impl From<&str> for PathPattern {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PathPattern {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.raw
    }
}

/// Expands every pattern relative to `root` into a sorted, de-duplicated set
/// of absolute file paths.
pub fn expand_all(root: &Path, patterns: &[PathPattern]) -> Result<BTreeSet<PathBuf>, CacheError> {
    let mut files = BTreeSet::new();
    for pattern in patterns {
        pattern.expand_into(root, &mut files)?;
    }
    Ok(files)
}

/// Splits a glob into its leading literal components and the remainder.
fn split_literal_prefix(raw: &str) -> (PathBuf, PathBuf) {
    let mut prefix = PathBuf::new();
    let mut rest = PathBuf::new();
    let mut in_glob = false;
    for component in Path::new(raw).components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_glob && text.contains(GLOB_META) {
            in_glob = true;
        }
        if in_glob {
            rest.push(component.as_os_str());
        } else {
            prefix.push(component.as_os_str());
        }
    }
    (prefix, rest)
}

/// Lexically removes `.` and resolves `..` components so that different
/// spellings of one path de-duplicate.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Adds `path` (a file) or every file beneath `path` (a directory) to `out`.
fn collect_files(path: &Path, out: &mut BTreeSet<PathBuf>) {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            if is_readable(path) {
                out.insert(path.to_path_buf());
            }
        }
        Ok(meta) if meta.is_dir() => out.extend(walk_files(path)),
        _ => {}
    }
}

/// Returns every readable regular file beneath `dir`.
///
/// Traversal errors (unreadable subdirectories, dangling links) are skipped.
fn walk_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable path while expanding pattern");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_readable(path))
        .collect()
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}
