//! Error types for the dircache crate.
//!
//! Absence is never an error here: lookups and removals report it through
//! `Option`/`bool` return values. The only fallible operation is a bulk
//! load.

// Re-export error types from submodules
pub use crate::loader::LoadError;
