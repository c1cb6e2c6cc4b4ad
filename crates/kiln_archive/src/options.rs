//! Archive assembly options.

use std::path::{Path, PathBuf};

use crate::license::LicenseDescriptor;

/// Deflate level used when none is configured.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

/// A file added to the archive from outside the staging tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFile {
    /// File on disk.
    pub source: PathBuf,
    /// Forward-slash entry name inside the archive.
    pub destination: String,
}

/// Everything the assembler needs to know about one archive.
///
/// Built once through [`ArchiveOptions::builder`] and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    output: PathBuf,
    staging_root: PathBuf,
    main_class: Option<String>,
    runtime_classpath: Vec<String>,
    extra_files: Vec<ExtraFile>,
    embedded_sources: Vec<PathBuf>,
    license_text: Option<String>,
    licenses: Vec<LicenseDescriptor>,
    timestamps_now: bool,
    compression_level: i64,
    normalize: bool,
}

impl ArchiveOptions {
    /// Starts building options for an archive written to `output` from the
    /// contents of `staging_root`.
    pub fn builder(output: impl Into<PathBuf>, staging_root: impl Into<PathBuf>) -> ArchiveOptionsBuilder {
        ArchiveOptionsBuilder {
            inner: ArchiveOptions {
                output: output.into(),
                staging_root: staging_root.into(),
                main_class: None,
                runtime_classpath: Vec::new(),
                extra_files: Vec::new(),
                embedded_sources: Vec::new(),
                license_text: None,
                licenses: Vec::new(),
                timestamps_now: false,
                compression_level: DEFAULT_COMPRESSION_LEVEL,
                normalize: false,
            },
        }
    }

    /// Destination path of the archive.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Directory whose contents become the archive body.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Entry point class for a synthesized manifest.
    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    /// `Class-Path` entries for a synthesized manifest.
    pub fn runtime_classpath(&self) -> &[String] {
        &self.runtime_classpath
    }

    /// Files added from outside the staging tree.
    pub fn extra_files(&self) -> &[ExtraFile] {
        &self.extra_files
    }

    /// Source roots embedded under `sources/`.
    pub fn embedded_sources(&self) -> &[PathBuf] {
        &self.embedded_sources
    }

    /// License text written to `META-INF/LICENSE.txt`.
    pub fn license_text(&self) -> Option<&str> {
        self.license_text.as_deref()
    }

    /// Structured license descriptors handed to the license installer.
    pub fn licenses(&self) -> &[LicenseDescriptor] {
        &self.licenses
    }

    /// Whether every entry is stamped with the assembly time instead of its
    /// file modification time.
    pub fn timestamps_now(&self) -> bool {
        self.timestamps_now
    }

    /// Deflate level, 0 to 9.
    pub fn compression_level(&self) -> i64 {
        self.compression_level
    }

    /// Whether the finished archive goes through the normalizer.
    pub fn normalize(&self) -> bool {
        self.normalize
    }
}

/// Consuming builder for [`ArchiveOptions`].
#[derive(Debug, Clone)]
pub struct ArchiveOptionsBuilder {
    inner: ArchiveOptions,
}

impl ArchiveOptionsBuilder {
    /// Sets the manifest entry point.
    pub fn main_class(mut self, class: impl Into<String>) -> Self {
        self.inner.main_class = Some(class.into());
        self
    }

    /// Sets the manifest `Class-Path`.
    pub fn runtime_classpath<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.runtime_classpath = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a file from outside the staging tree.
    pub fn extra_file(mut self, source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        self.inner.extra_files.push(ExtraFile {
            source: source.into(),
            destination: destination.into(),
        });
        self
    }

    /// Embeds every file under `root`.
    pub fn embedded_sources(mut self, root: impl Into<PathBuf>) -> Self {
        self.inner.embedded_sources.push(root.into());
        self
    }

    /// Sets plain license text.
    pub fn license_text(mut self, text: impl Into<String>) -> Self {
        self.inner.license_text = Some(text.into());
        self
    }

    /// Adds a structured license descriptor.
    pub fn license(mut self, license: LicenseDescriptor) -> Self {
        self.inner.licenses.push(license);
        self
    }

    /// Stamps entries with the assembly time.
    pub fn timestamps_now(mut self, now: bool) -> Self {
        self.inner.timestamps_now = now;
        self
    }

    /// Sets the deflate level (clamped to 0..=9).
    pub fn compression_level(mut self, level: i64) -> Self {
        self.inner.compression_level = level.clamp(0, 9);
        self
    }

    /// Enables the post-assembly normalization pass.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.inner.normalize = normalize;
        self
    }

    /// Finishes the options.
    pub fn build(self) -> ArchiveOptions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ArchiveOptions::builder("out/a.jar", "staging/a").build();
        assert_eq!(opts.output(), Path::new("out/a.jar"));
        assert_eq!(opts.staging_root(), Path::new("staging/a"));
        assert!(opts.main_class().is_none());
        assert!(!opts.timestamps_now());
        assert!(!opts.normalize());
        assert_eq!(opts.compression_level(), DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn builder_accumulates() {
        let opts = ArchiveOptions::builder("a.jar", "s")
            .main_class("com.example.Main")
            .runtime_classpath(["lib/x.jar", "lib/y.jar"])
            .extra_file("NOTICE", "META-INF/NOTICE")
            .extra_file("README.md", "README.md")
            .embedded_sources("src/main/java")
            .compression_level(42)
            .build();
        assert_eq!(opts.main_class(), Some("com.example.Main"));
        assert_eq!(opts.runtime_classpath().len(), 2);
        assert_eq!(opts.extra_files()[0].destination, "META-INF/NOTICE");
        assert_eq!(opts.embedded_sources().len(), 1);
        assert_eq!(opts.compression_level(), 9);
    }
}
