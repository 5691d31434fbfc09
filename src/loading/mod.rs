//! Turning rows into stored documents.
//!
//! - [`keys`]: stable document keys from natural keys or row position
//! - [`loader`]: per-row upserts that tolerate individual failures

pub mod keys;
pub mod loader;

pub use keys::{ID_FIELD, KeyDeriver};
pub use loader::{DocumentLoader, LoadStats, RowFailure};
