//! License installation into archives.

use crate::error::ArchiveError;

/// Sink for entries written by collaborators during assembly.
///
/// Names are forward-slash archive paths. Parent directories of names an
/// installer declares through [`LicenseInstaller::entry_names`] are written
/// up front with every other directory; any still missing are created on
/// demand. A name that was already written is skipped with a warning.
pub trait EntryWriter {
    /// Writes one file entry.
    fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<(), ArchiveError>;
}

/// A license that applies to the archive contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseDescriptor {
    /// Short identifier, for example `Apache-2.0`.
    pub name: String,
    /// Optional canonical URL.
    pub url: Option<String>,
    /// Full license text, if known.
    pub text: Option<String>,
}

impl LicenseDescriptor {
    /// Creates a descriptor carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            text: None,
        }
    }
}

/// Writes license material into an archive being assembled.
pub trait LicenseInstaller: Send + Sync {
    /// Names of the entries [`install`](Self::install) will write for
    /// `licenses`. Their parent directories join the archive's directory
    /// partition, ahead of any file entry.
    fn entry_names(&self, licenses: &[LicenseDescriptor]) -> Vec<String>;

    /// Installs `licenses` through `writer`. Called after all regular
    /// entries have been written and only when `licenses` is non-empty.
    fn install(&self, writer: &mut dyn EntryWriter, licenses: &[LicenseDescriptor]) -> Result<(), ArchiveError>;
}

/// Default installer: one text file per license under `META-INF/licenses/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLicenseInstaller;

impl TextLicenseInstaller {
    fn entry_name(license: &LicenseDescriptor) -> String {
        format!("META-INF/licenses/{}.txt", sanitize(&license.name))
    }
}

impl LicenseInstaller for TextLicenseInstaller {
    fn entry_names(&self, licenses: &[LicenseDescriptor]) -> Vec<String> {
        licenses.iter().map(Self::entry_name).collect()
    }

    fn install(&self, writer: &mut dyn EntryWriter, licenses: &[LicenseDescriptor]) -> Result<(), ArchiveError> {
        let mut sorted: Vec<&LicenseDescriptor> = licenses.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for license in sorted {
            let mut body = format!("License: {}\n", license.name);
            if let Some(url) = &license.url {
                body.push_str(&format!("URL: {url}\n"));
            }
            if let Some(text) = &license.text {
                body.push('\n');
                body.push_str(text);
                if !text.ends_with('\n') {
                    body.push('\n');
                }
            }
            writer.add_file(&Self::entry_name(license), body.as_bytes())?;
        }
        Ok(())
    }
}

/// Keeps license names usable as a single path segment.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}
