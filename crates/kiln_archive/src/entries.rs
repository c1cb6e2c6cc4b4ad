//! Entry collection and ordering.
//!
//! Archive entries are gathered into fixed partitions and written partition
//! by partition, each sorted by entry name. The resulting order depends only
//! on the logical inputs, never on directory enumeration order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::ArchiveError;
use crate::manifest::{JarManifest, MANIFEST_PATH};
use crate::options::ArchiveOptions;

/// Entry name of the plain license text.
pub const LICENSE_TEXT_PATH: &str = "META-INF/LICENSE.txt";

/// Prefix under which embedded source files are stored.
pub const SOURCES_PREFIX: &str = "sources/";

/// The groups entries are written in, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Partition {
    /// `META-INF/MANIFEST.MF`, always first when present.
    Manifest,
    /// Directory entries derived from every file entry's parents.
    Directories,
    /// Compiled `.class` files from the staging tree.
    Classes,
    /// Any other file from the staging tree.
    Staged,
    /// Files added from outside the staging tree.
    Extras,
    /// Embedded source files.
    Sources,
    /// Plain license text.
    LicenseText,
}

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Streamed from a file on disk at write time.
    File(PathBuf),
    /// Synthesized in memory.
    Bytes(Vec<u8>),
    /// A directory entry with no content.
    Directory,
}

/// One archive entry awaiting writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash archive name; directories end in `/`.
    pub name: String,
    /// Content source.
    pub source: EntrySource,
    /// Modification time of the backing file. Synthesized entries have none.
    pub modified: Option<SystemTime>,
}

/// All entries of one archive, grouped by partition.
#[derive(Debug, Default)]
pub struct EntrySet {
    partitions: BTreeMap<Partition, Vec<ArchiveEntry>>,
}

impl EntrySet {
    /// Collects every entry described by `options`.
    ///
    /// A name claimed by an earlier partition is dropped from later ones
    /// with a warning. An existing staged manifest is promoted to the
    /// manifest partition; otherwise one is synthesized when a main class
    /// or classpath is configured.
    pub fn collect(options: &ArchiveOptions) -> Result<Self, ArchiveError> {
        Self::collect_with(options, &[])
    }

    /// Like [`collect`](Self::collect), for an archive that will also receive
    /// the entries named in `installed` after the collected ones. Their
    /// parent directories are added to the directory partition.
    pub fn collect_with(options: &ArchiveOptions, installed: &[String]) -> Result<Self, ArchiveError> {
        let mut staged_manifest = None;
        let mut classes = Vec::new();
        let mut staged = Vec::new();
        for entry in walk_files(options.staging_root(), "")? {
            if entry.name == MANIFEST_PATH {
                staged_manifest = Some(entry);
            } else if entry.name.ends_with(".class") {
                classes.push(entry);
            } else {
                staged.push(entry);
            }
        }

        let manifest = match staged_manifest {
            Some(existing) => {
                if options.main_class().is_some() {
                    tracing::debug!("staging tree already has a manifest; main class not applied");
                }
                Some(existing)
            }
            None if options.main_class().is_some() || !options.runtime_classpath().is_empty() => {
                let mut manifest = JarManifest::new(options.main_class().map(str::to_string));
                manifest.class_path = options.runtime_classpath().to_vec();
                Some(ArchiveEntry {
                    name: MANIFEST_PATH.to_string(),
                    source: EntrySource::Bytes(manifest.render()),
                    modified: None,
                })
            }
            None => None,
        };

        let mut extras = Vec::with_capacity(options.extra_files().len());
        for extra in options.extra_files() {
            validate_name(&extra.destination)?;
            let meta = std::fs::metadata(&extra.source).map_err(|e| ArchiveError::io(&extra.source, e))?;
            extras.push(ArchiveEntry {
                name: extra.destination.clone(),
                source: EntrySource::File(extra.source.clone()),
                modified: meta.modified().ok(),
            });
        }

        let mut sources = Vec::new();
        for root in options.embedded_sources() {
            sources.extend(walk_files(root, SOURCES_PREFIX)?);
        }

        let license = options.license_text().map(|text| ArchiveEntry {
            name: LICENSE_TEXT_PATH.to_string(),
            source: EntrySource::Bytes(text.as_bytes().to_vec()),
            modified: None,
        });

        let mut set = EntrySet::default();
        let mut seen = BTreeSet::new();
        set.insert(Partition::Manifest, manifest.into_iter().collect(), &mut seen);
        set.insert(Partition::Classes, classes, &mut seen);
        set.insert(Partition::Staged, staged, &mut seen);
        set.insert(Partition::Extras, extras, &mut seen);
        set.insert(Partition::Sources, sources, &mut seen);
        set.insert(Partition::LicenseText, license.into_iter().collect(), &mut seen);

        let names = seen.iter().chain(installed).map(String::as_str);
        let directories = parent_directories(names)
            .into_iter()
            .map(|name| ArchiveEntry {
                name,
                source: EntrySource::Directory,
                modified: None,
            })
            .collect();
        set.partitions.insert(Partition::Directories, directories);
        Ok(set)
    }

    fn insert(&mut self, partition: Partition, mut entries: Vec<ArchiveEntry>, seen: &mut BTreeSet<String>) {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.retain(|entry| {
            let fresh = seen.insert(entry.name.clone());
            if !fresh {
                tracing::warn!(entry = %entry.name, ?partition, "duplicate archive entry dropped");
            }
            fresh
        });
        self.partitions.insert(partition, entries);
    }

    /// Returns the entries of one partition, sorted by name.
    pub fn partition(&self, partition: Partition) -> &[ArchiveEntry] {
        self.partitions.get(&partition).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every entry in write order.
    pub fn iter(&self) -> impl Iterator<Item = (Partition, &ArchiveEntry)> {
        self.partitions
            .iter()
            .flat_map(|(partition, entries)| entries.iter().map(move |e| (*partition, e)))
    }

    /// Number of entries including synthesized ones.
    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// Returns `true` if the set has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries that originate from input files rather than being
    /// synthesized (directories, manifest and license text).
    pub fn input_file_count(&self) -> usize {
        [Partition::Classes, Partition::Staged, Partition::Extras, Partition::Sources]
            .iter()
            .map(|p| self.partition(*p).len())
            .sum()
    }
}

/// Lists the regular files under `root` as entries named `prefix` + the
/// relative path. A missing root contributes nothing.
fn walk_files(root: &Path, prefix: &str) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "input directory absent");
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for item in walkdir::WalkDir::new(root).follow_links(true) {
        let item = item.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            ArchiveError::io(path, e.into())
        })?;
        if !item.file_type().is_file() {
            continue;
        }
        let rel = item.path().strip_prefix(root).unwrap_or(item.path());
        let name = format!("{prefix}{}", entry_name(rel)?);
        let modified = item.metadata().ok().and_then(|m| m.modified().ok());
        entries.push(ArchiveEntry {
            name,
            source: EntrySource::File(item.path().to_path_buf()),
            modified,
        });
    }
    Ok(entries)
}

/// Converts a relative filesystem path into a forward-slash entry name.
pub(crate) fn entry_name(rel: &Path) -> Result<String, ArchiveError> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(s) => parts.push(s),
                None => {
                    return Err(ArchiveError::InvalidEntryName {
                        name: rel.display().to_string(),
                        reason: "not valid UTF-8".to_string(),
                    })
                }
            },
            Component::CurDir => {}
            _ => {
                return Err(ArchiveError::InvalidEntryName {
                    name: rel.display().to_string(),
                    reason: "must be a relative path without '..'".to_string(),
                })
            }
        }
    }
    Ok(parts.join("/"))
}

/// Checks a caller-supplied entry name.
pub(crate) fn validate_name(name: &str) -> Result<(), ArchiveError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.starts_with('/') {
        Some("must be relative")
    } else if name.contains('\\') {
        Some("must use forward slashes")
    } else if name.ends_with('/') {
        Some("must name a file")
    } else if name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        Some("must not contain empty, '.' or '..' segments")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ArchiveError::InvalidEntryName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Returns every ancestor directory of `names` as `dir/` entries, sorted.
pub(crate) fn parent_directories<'a>(names: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();
    for name in names {
        let mut end = 0;
        while let Some(pos) = name[end..].find('/') {
            end += pos + 1;
            dirs.insert(name[..end].to_string());
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn names(set: &EntrySet, partition: Partition) -> Vec<&str> {
        set.partition(partition).iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn partitions_staging_tree() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        touch(&staging, "com/x/B.class", "b");
        touch(&staging, "com/x/A.class", "a");
        touch(&staging, "app.properties", "k=v");

        let set = EntrySet::collect(&ArchiveOptions::builder(dir.path().join("a.jar"), &staging).build()).unwrap();
        assert_eq!(names(&set, Partition::Classes), vec!["com/x/A.class", "com/x/B.class"]);
        assert_eq!(names(&set, Partition::Staged), vec!["app.properties"]);
        assert_eq!(names(&set, Partition::Directories), vec!["com/", "com/x/"]);
        assert!(set.partition(Partition::Manifest).is_empty());
        assert_eq!(set.input_file_count(), 3);
    }

    #[test]
    fn manifest_synthesized_for_main_class() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A.class", "a");
        let opts = ArchiveOptions::builder(dir.path().join("a.jar"), dir.path())
            .main_class("A")
            .build();
        let set = EntrySet::collect(&opts).unwrap();
        let manifest = &set.partition(Partition::Manifest)[0];
        assert_eq!(manifest.name, MANIFEST_PATH);
        assert!(matches!(&manifest.source, EntrySource::Bytes(b) if String::from_utf8_lossy(b).contains("Main-Class: A")));
        assert_eq!(names(&set, Partition::Directories), vec!["META-INF/"]);
        assert_eq!(set.iter().next().unwrap().0, Partition::Manifest);
    }

    #[test]
    fn staged_manifest_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "META-INF/MANIFEST.MF", "Manifest-Version: 1.0\r\n\r\n");
        let opts = ArchiveOptions::builder(dir.path().join("a.jar"), dir.path())
            .main_class("Ignored")
            .build();
        let set = EntrySet::collect(&opts).unwrap();
        let manifest = &set.partition(Partition::Manifest)[0];
        assert!(matches!(manifest.source, EntrySource::File(_)));
        assert!(set.partition(Partition::Staged).is_empty());
    }

    #[test]
    fn extras_sources_and_license() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        touch(&staging, "A.class", "a");
        touch(dir.path(), "NOTICE", "notice");
        touch(dir.path(), "src/com/A.java", "class A {}");
        let opts = ArchiveOptions::builder(dir.path().join("a.jar"), &staging)
            .extra_file(dir.path().join("NOTICE"), "META-INF/NOTICE")
            .embedded_sources(dir.path().join("src"))
            .license_text("MIT")
            .build();
        let set = EntrySet::collect(&opts).unwrap();
        assert_eq!(names(&set, Partition::Extras), vec!["META-INF/NOTICE"]);
        assert_eq!(names(&set, Partition::Sources), vec!["sources/com/A.java"]);
        assert_eq!(names(&set, Partition::LicenseText), vec![LICENSE_TEXT_PATH]);
        assert_eq!(
            names(&set, Partition::Directories),
            vec!["META-INF/", "sources/", "sources/com/"]
        );
    }

    #[test]
    fn duplicate_destination_first_partition_wins() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        touch(&staging, "README.md", "staged");
        touch(dir.path(), "README.md", "extra");
        let opts = ArchiveOptions::builder(dir.path().join("a.jar"), &staging)
            .extra_file(dir.path().join("README.md"), "README.md")
            .build();
        let set = EntrySet::collect(&opts).unwrap();
        assert_eq!(names(&set, Partition::Staged), vec!["README.md"]);
        assert!(set.partition(Partition::Extras).is_empty());
    }

    #[test]
    fn missing_extra_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ArchiveOptions::builder(dir.path().join("a.jar"), dir.path())
            .extra_file(dir.path().join("nope"), "nope")
            .build();
        assert!(matches!(EntrySet::collect(&opts), Err(ArchiveError::Io { .. })));
    }

    #[test]
    fn bad_destination_rejected() {
        for bad in ["", "/abs", "a\\b", "dir/", "a/../b", "a//b"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(validate_name("META-INF/NOTICE").is_ok());
    }

    #[test]
    fn missing_staging_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = EntrySet::collect(&ArchiveOptions::builder("a.jar", dir.path().join("absent")).build()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn parents_of_nested_names() {
        let dirs = parent_directories(["a/b/c.txt", "a/d.txt", "top.txt"].into_iter());
        assert_eq!(dirs.into_iter().collect::<Vec<_>>(), vec!["a/", "a/b/"]);
    }
}
