//! Content fingerprinting and the persisted fingerprint store.
//!
//! This crate decides whether anything changed: it expands path patterns into
//! concrete file sets, folds their contents into a [`Fingerprint`], persists
//! the last known fingerprint per key, and detects when the build tool itself
//! changed so that every unit must be rebuilt.
//!
//! [`Fingerprint`]: kiln_common::Fingerprint

#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod pattern;
pub mod properties;
pub mod store;

pub use error::CacheError;
pub use fingerprint::FingerprintEngine;
pub use guard::{GuardOutcome, SelfInvalidationGuard, SELF_FINGERPRINT_KEY};
pub use pattern::PathPattern;
pub use store::FingerprintStore;
