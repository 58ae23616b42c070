//! In-process, thread-safe cache with TTL expiry and filesystem bulk
//! loading.
//!
//! A [`Cache`] stores string content under string keys, each optionally
//! carrying a time-to-live, and can populate itself from a filesystem
//! subtree, mapping directory structure onto cache keys. It is meant to be
//! embedded inside a server that answers lookups from memory instead of
//! touching disk per request.
//!
//! Loaded subtrees are remembered as *recipes* (source path, key prefix,
//! insert handler, TTL), so the periodic [`sweep`](Cache::sweep) can not
//! only evict expired entries but also re-walk and refresh expired
//! subtrees.
//!
//! ```no_run
//! use std::time::Duration;
//! use dircache_core::Cache;
//!
//! let cache = Cache::new();
//! cache.insert_path_with(
//!     "/srv/static",
//!     "/static",
//!     Duration::from_secs(300),
//!     dircache_core::default_insert_handler(),
//! )?;
//! assert!(cache.find("/static/index.html").is_some());
//! # Ok::<(), dircache_core::LoadError>(())
//! ```

pub mod cache;
pub mod error;
pub mod fs;
pub mod loader;
mod watchdog;

pub use cache::clock::Timestamp;
pub use cache::entry::{InsertHandler, default_insert_handler};
pub use cache::{Cache, CacheStats, swap};
pub use fs::{Filesystem, OsFilesystem};
pub use loader::LoadError;
