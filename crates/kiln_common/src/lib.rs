//! Shared foundational types used across the Kiln build tool.
//!
//! This crate provides the content digest and fingerprint types that every
//! caching layer agrees on, plus small filesystem helpers for atomic writes.

#![warn(missing_docs)]

pub mod digest;
pub mod fs;

pub use digest::{ContentDigest, DigestBuilder, Fingerprint, ParseFingerprintError};
pub use fs::{write_atomic, write_atomic_with};
