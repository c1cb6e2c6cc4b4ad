//! Content digests and fingerprints for cache invalidation.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Read buffer size used when digesting streams.
const READ_CHUNK: usize = 64 * 1024;

/// A 128-bit content digest computed using XXH3.
///
/// Two files with the same `ContentDigest` are assumed to have identical
/// content. This is the only digest algorithm used by Kiln: per-file digests,
/// folded fingerprints and archive checks all go through it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentDigest([u8; 16]);

impl ContentDigest {
    /// Computes a digest from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes a digest by streaming a reader in fixed-size chunks.
    ///
    /// The whole input is never held in memory, so arbitrarily large files
    /// can be digested.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut builder = DigestBuilder::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            builder.update(&buf[..n]);
        }
        Ok(builder.finish())
    }

    /// Returns the raw little-endian digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Incremental XXH3-128 hasher.
///
/// Used both to stream file contents and to fold a sequence of per-file
/// digests into a single running digest.
#[derive(Clone, Default)]
pub struct DigestBuilder(Xxh3);

impl DigestBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self(Xxh3::new())
    }

    /// Feeds raw bytes into the running digest.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Feeds a previously computed digest into the running digest.
    pub fn push(&mut self, digest: &ContentDigest) {
        self.0.update(digest.as_bytes());
    }

    /// Consumes the builder and returns the final digest.
    pub fn finish(self) -> ContentDigest {
        ContentDigest(self.0.digest128().to_le_bytes())
    }
}

/// A fingerprint over a set of files, persisted as a base64 string.
///
/// A fingerprint is the fold of per-file [`ContentDigest`]s in a fixed order.
/// It is opaque: callers only compare fingerprints for equality or store
/// their string form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(ContentDigest);

impl Fingerprint {
    /// Folds digests, in iteration order, into a fingerprint.
    ///
    /// The caller is responsible for supplying the digests in a stable order.
    pub fn fold<'a, I>(digests: I) -> Self
    where
        I: IntoIterator<Item = &'a ContentDigest>,
    {
        let mut builder = DigestBuilder::new();
        for digest in digests {
            builder.push(digest);
        }
        Self(builder.finish())
    }

    /// Folds `(name, digest)` pairs, in iteration order, into a fingerprint.
    ///
    /// Each name is fed length-prefixed ahead of its digest, so renaming a
    /// file changes the result even when its contents do not.
    pub fn fold_named<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a ContentDigest)>,
    {
        let mut builder = DigestBuilder::new();
        for (name, digest) in entries {
            builder.update(&(name.len() as u64).to_le_bytes());
            builder.update(name.as_bytes());
            builder.push(digest);
        }
        Self(builder.finish())
    }

    /// Returns the underlying digest.
    pub fn digest(&self) -> ContentDigest {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Error returned when a persisted fingerprint string cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFingerprintError {
    /// The string is not valid base64.
    #[error("fingerprint is not valid base64: {0}")]
    Base64(String),

    /// The decoded digest has the wrong number of bytes.
    #[error("fingerprint has {0} bytes, expected 16")]
    Length(usize),
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| ParseFingerprintError::Base64(e.to_string()))?;
        let raw: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseFingerprintError::Length(bytes.len()))?;
        Ok(Self(ContentDigest(raw)))
    }
}
