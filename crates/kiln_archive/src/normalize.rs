//! Post-assembly normalization.

use std::io::Cursor;

use zip::{DateTime, ZipArchive, ZipWriter};

use crate::error::ArchiveError;
use crate::writer::entry_options;

/// Rewrites a finished archive into a canonical form.
///
/// Implementations must be pure functions of the input bytes: the same
/// archive in must always give the same archive out.
pub trait Normalizer: Send + Sync {
    /// Returns the normalized archive.
    fn normalize(&self, archive: &[u8]) -> Result<Vec<u8>, ArchiveError>;
}

/// Re-encodes every entry at a fixed deflate level, keeping entry order and
/// timestamps.
///
/// Useful when entries were produced with varying compressors (for example
/// a staged manifest copied from elsewhere); the output depends only on the
/// uncompressed contents.
#[derive(Debug, Clone, Copy)]
pub struct RecompressNormalizer {
    level: i64,
}

impl RecompressNormalizer {
    /// Creates a normalizer using `level` (0 stores entries uncompressed).
    pub fn new(level: i64) -> Self {
        Self { level: level.clamp(0, 9) }
    }
}

impl Default for RecompressNormalizer {
    fn default() -> Self {
        Self::new(9)
    }
}

impl Normalizer for RecompressNormalizer {
    fn normalize(&self, archive: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let mut reader = ZipArchive::new(Cursor::new(archive)).map_err(|e| ArchiveError::zip("", e))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..reader.len() {
            let mut entry = reader.by_index(index).map_err(|e| ArchiveError::zip("", e))?;
            let name = entry.name().to_string();
            let modified: Option<DateTime> = entry.last_modified().into();
            let options = entry_options(self.level, modified.unwrap_or_default(), entry.is_dir());
            if entry.is_dir() {
                writer
                    .add_directory(name.as_str(), options)
                    .map_err(|e| ArchiveError::zip(&name, e))?;
            } else {
                writer
                    .start_file(name.as_str(), options)
                    .map_err(|e| ArchiveError::zip(&name, e))?;
                std::io::copy(&mut entry, &mut writer).map_err(|e| ArchiveError::zip(&name, e.into()))?;
            }
        }

        let cursor = writer.finish().map_err(|e| ArchiveError::zip("", e))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn sample(method: CompressionMethod) -> Vec<u8> {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::<()>::default()
            .compression_method(method)
            .last_modified_time(DateTime::default());
        w.add_directory("com/", opts).unwrap();
        w.start_file("com/A.class", opts).unwrap();
        w.write_all(&[0xCA, 0xFE, 0xBA, 0xBE].repeat(64)).unwrap();
        w.start_file("notes.txt", opts).unwrap();
        w.write_all(b"hello hello hello").unwrap();
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn output_independent_of_input_compression() {
        let n = RecompressNormalizer::default();
        let stored = n.normalize(&sample(CompressionMethod::Stored)).unwrap();
        let deflated = n.normalize(&sample(CompressionMethod::Deflated)).unwrap();
        assert_eq!(stored, deflated);
    }

    #[test]
    fn idempotent_and_preserves_contents() {
        let n = RecompressNormalizer::default();
        let once = n.normalize(&sample(CompressionMethod::Stored)).unwrap();
        assert_eq!(n.normalize(&once).unwrap(), once);

        let mut archive = ZipArchive::new(Cursor::new(once)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["com/", "com/A.class", "notes.txt"]);
        let mut text = String::new();
        archive.by_name("notes.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello hello hello");
    }

    #[test]
    fn garbage_is_zip_error() {
        let err = RecompressNormalizer::default().normalize(b"not a zip").unwrap_err();
        assert!(matches!(err, ArchiveError::Zip { .. }));
    }
}
