//! Archive assembly driver.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use kiln_common::ContentDigest;

use crate::entries::EntrySet;
use crate::error::ArchiveError;
use crate::license::{LicenseInstaller, TextLicenseInstaller};
use crate::normalize::{Normalizer, RecompressNormalizer};
use crate::options::ArchiveOptions;
use crate::writer::{dos_time, JarWriter};

/// Facts about an archive that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Number of entries, directories included.
    pub entries: usize,
    /// Archive size in bytes.
    pub size: u64,
    /// Digest of the archive bytes.
    pub digest: ContentDigest,
}

/// Writes deterministic jars.
///
/// Entries are written partition by partition (manifest, directories,
/// classes, other staged files, extras, embedded sources, license text),
/// each sorted by name, then structured licenses are installed. Directories
/// the license installer needs are part of the directory partition. The archive
/// is built in memory and moved into place atomically, so a failed assembly
/// never leaves a partial file at the destination.
pub struct Assembler {
    normalizer: Box<dyn Normalizer>,
    license_installer: Box<dyn LicenseInstaller>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self {
            normalizer: Box::new(RecompressNormalizer::default()),
            license_installer: Box::new(TextLicenseInstaller),
        }
    }
}

impl fmt::Debug for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembler").finish_non_exhaustive()
    }
}

impl Assembler {
    /// Creates an assembler with the default normalizer and license installer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the normalizer used when [`ArchiveOptions::normalize`] is set.
    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Replaces the license installer.
    pub fn with_license_installer(mut self, installer: impl LicenseInstaller + 'static) -> Self {
        self.license_installer = Box::new(installer);
        self
    }

    /// Builds the archive in memory.
    ///
    /// Returns `Ok(None)` when there are no input files at all; synthesized
    /// entries alone do not make an archive.
    pub fn assemble_to_bytes(&self, options: &ArchiveOptions) -> Result<Option<Vec<u8>>, ArchiveError> {
        Ok(self.build(options)?.map(|(bytes, _)| bytes))
    }

    /// Builds the archive and atomically writes it to
    /// [`ArchiveOptions::output`].
    ///
    /// Returns `Ok(None)` without touching the destination when there are no
    /// input files.
    pub fn assemble(&self, options: &ArchiveOptions) -> Result<Option<ArchiveSummary>, ArchiveError> {
        let Some((bytes, entries)) = self.build(options)? else {
            return Ok(None);
        };
        let path = options.output().to_path_buf();
        kiln_common::write_atomic(&path, &bytes).map_err(|e| ArchiveError::io(&path, e))?;
        let summary = ArchiveSummary {
            path,
            entries,
            size: bytes.len() as u64,
            digest: ContentDigest::from_bytes(&bytes),
        };
        tracing::info!(
            archive = %summary.path.display(),
            entries = summary.entries,
            bytes = summary.size,
            "wrote archive"
        );
        Ok(Some(summary))
    }

    fn build(&self, options: &ArchiveOptions) -> Result<Option<(Vec<u8>, usize)>, ArchiveError> {
        let installed = if options.licenses().is_empty() {
            Vec::new()
        } else {
            self.license_installer.entry_names(options.licenses())
        };
        let set = EntrySet::collect_with(options, &installed)?;
        if set.input_file_count() == 0 {
            tracing::info!(
                archive = %options.output().display(),
                "no input files; archive not written"
            );
            return Ok(None);
        }

        let fixed_time = options.timestamps_now().then(|| dos_time(SystemTime::now()));
        let mut writer = JarWriter::new(options.compression_level(), fixed_time);
        for (partition, entry) in set.iter() {
            tracing::trace!(?partition, entry = %entry.name, "writing entry");
            writer.write_entry(entry)?;
        }
        if !options.licenses().is_empty() {
            self.license_installer.install(&mut writer, options.licenses())?;
        }

        let entries = writer.entry_count();
        let mut bytes = writer.finish()?;
        if options.normalize() {
            bytes = self.normalizer.normalize(&bytes)?;
        }
        Ok(Some((bytes, entries)))
    }
}
