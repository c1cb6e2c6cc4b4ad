//! Deterministic jar assembly.
//!
//! Given a staging directory and a set of extra inputs, the assembler writes a
//! ZIP/JAR archive whose entry order, timestamps and compression settings are
//! fully determined by the logical inputs. Two builds of the same inputs
//! produce byte-identical archives, which keeps output fingerprints and any
//! downstream signing step meaningful.

#![warn(missing_docs)]

pub mod assembler;
pub mod entries;
pub mod error;
pub mod license;
pub mod manifest;
pub mod normalize;
pub mod options;
mod writer;

pub use assembler::{ArchiveSummary, Assembler};
pub use entries::{ArchiveEntry, EntrySet, EntrySource, Partition};
pub use error::ArchiveError;
pub use license::{EntryWriter, LicenseDescriptor, LicenseInstaller, TextLicenseInstaller};
pub use manifest::{JarManifest, MANIFEST_PATH};
pub use normalize::{Normalizer, RecompressNormalizer};
pub use options::{ArchiveOptions, ArchiveOptionsBuilder, ExtraFile};
