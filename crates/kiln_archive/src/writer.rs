//! ZIP encoding with fixed, reproducible entry settings.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::time::SystemTime;

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::entries::{parent_directories, validate_name, ArchiveEntry, EntrySource};
use crate::error::ArchiveError;
use crate::license::EntryWriter;

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Converts a file time to a ZIP timestamp in UTC. Times outside the DOS
/// range (before 1980 or after 2107) collapse to the DOS epoch.
pub(crate) fn dos_time(time: SystemTime) -> DateTime {
    let t = time::OffsetDateTime::from(time);
    let Ok(year) = u16::try_from(t.year()) else {
        return DateTime::default();
    };
    DateTime::from_date_and_time(year, u8::from(t.month()), t.day(), t.hour(), t.minute(), t.second())
        .unwrap_or_default()
}

/// Entry options shared by the assembler and the normalizer.
pub(crate) fn entry_options(level: i64, modified: DateTime, is_dir: bool) -> FileOptions<'static, ()> {
    let base = FileOptions::<()>::default().last_modified_time(modified);
    if is_dir {
        return base.compression_method(CompressionMethod::Stored).unix_permissions(DIR_MODE);
    }
    let base = base.unix_permissions(FILE_MODE);
    if level <= 0 {
        base.compression_method(CompressionMethod::Stored)
    } else {
        base.compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.min(9)))
    }
}

/// In-memory archive under construction.
pub(crate) struct JarWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    written: HashSet<String>,
    level: i64,
    /// Overrides every entry's timestamp when set.
    fixed_time: Option<DateTime>,
}

impl JarWriter {
    pub(crate) fn new(level: i64, fixed_time: Option<DateTime>) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            written: HashSet::new(),
            level,
            fixed_time,
        }
    }

    fn timestamp(&self, modified: Option<SystemTime>) -> DateTime {
        match (self.fixed_time, modified) {
            (Some(fixed), _) => fixed,
            (None, Some(t)) => dos_time(t),
            (None, None) => DateTime::default(),
        }
    }

    /// Writes one collected entry. Duplicate names are skipped.
    pub(crate) fn write_entry(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError> {
        if !self.written.insert(entry.name.clone()) {
            tracing::warn!(entry = %entry.name, "entry already written; skipping");
            return Ok(());
        }
        let is_dir = matches!(entry.source, EntrySource::Directory);
        let options = entry_options(self.level, self.timestamp(entry.modified), is_dir);
        match &entry.source {
            EntrySource::Directory => self
                .zip
                .add_directory(entry.name.as_str(), options)
                .map_err(|e| ArchiveError::zip(&entry.name, e)),
            EntrySource::Bytes(bytes) => {
                self.zip
                    .start_file(entry.name.as_str(), options)
                    .map_err(|e| ArchiveError::zip(&entry.name, e))?;
                self.zip
                    .write_all(bytes)
                    .map_err(|e| ArchiveError::zip(&entry.name, e.into()))
            }
            EntrySource::File(path) => {
                let mut file = std::fs::File::open(path).map_err(|e| ArchiveError::io(path, e))?;
                self.zip
                    .start_file(entry.name.as_str(), options)
                    .map_err(|e| ArchiveError::zip(&entry.name, e))?;
                std::io::copy(&mut file, &mut self.zip).map_err(|e| ArchiveError::io(path, e))?;
                Ok(())
            }
        }
    }

    /// Finishes the central directory and returns the archive bytes.
    pub(crate) fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        let cursor = self.zip.finish().map_err(|e| ArchiveError::zip("", e))?;
        Ok(cursor.into_inner())
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.written.len()
    }
}

impl EntryWriter for JarWriter {
    fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<(), ArchiveError> {
        validate_name(name)?;
        for dir in parent_directories(std::iter::once(name)) {
            if !self.written.contains(&dir) {
                self.write_entry(&ArchiveEntry {
                    name: dir,
                    source: EntrySource::Directory,
                    modified: None,
                })?;
            }
        }
        self.write_entry(&ArchiveEntry {
            name: name.to_string(),
            source: EntrySource::Bytes(contents.to_vec()),
            modified: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn names(bytes: Vec<u8>) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect::<Vec<_>>()
    }

    #[test]
    fn dos_time_converts_utc() {
        // 2021-03-04 05:06:08 UTC
        let t = UNIX_EPOCH + Duration::from_secs(1_614_834_368);
        let dt = dos_time(t);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 3, 4));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (5, 6, 8));
    }

    #[test]
    fn dos_time_before_1980_is_epoch() {
        let dt = dos_time(UNIX_EPOCH);
        assert_eq!((dt.year(), dt.month(), dt.day()), (1980, 1, 1));
    }

    #[test]
    fn add_file_creates_parents_once() {
        let mut w = JarWriter::new(6, None);
        w.add_file("META-INF/licenses/MIT.txt", b"MIT").unwrap();
        w.add_file("META-INF/licenses/BSD.txt", b"BSD").unwrap();
        w.add_file("META-INF/licenses/MIT.txt", b"again").unwrap();
        assert_eq!(w.entry_count(), 4);

        let mut listed = names(w.finish().unwrap());
        listed.sort();
        assert_eq!(
            listed,
            vec![
                "META-INF/",
                "META-INF/licenses/",
                "META-INF/licenses/BSD.txt",
                "META-INF/licenses/MIT.txt",
            ]
        );
    }

    #[test]
    fn add_file_rejects_bad_names() {
        let mut w = JarWriter::new(6, None);
        assert!(matches!(
            w.add_file("../escape", b""),
            Err(ArchiveError::InvalidEntryName { .. })
        ));
    }
}
