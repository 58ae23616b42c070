//! Cache records: stored values and path-reload recipes.
//!
//! Entries and recipes are snapshot records: the cache never edits one in
//! place, it replaces the whole mapping entry under the lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::cache::clock::Timestamp;

/// Callback invoked once per loaded file to decide how (or whether) it
/// becomes a cache entry.
///
/// The handler receives the cache itself, the computed key, the decoded file
/// content, and the TTL of the surrounding load. Returning `false` aborts
/// the whole bulk load. A handler is stored inside the [`PathRecipe`] it was
/// registered with, and the watchdog invokes it on reload without any caller
/// synchronization, so it must be shareable across threads.
pub type InsertHandler = Arc<dyn Fn(&Cache, &str, String, Duration) -> bool + Send + Sync>;

/// The handler used when a caller does not supply one: store the content
/// unchanged via [`Cache::add`].
pub fn default_insert_handler() -> InsertHandler {
    Arc::new(|cache, key, value, ttl| {
        cache.add(key, value, ttl);
        true
    })
}

/// A stored value together with its expiry bookkeeping.
///
/// `inserted_at` is `Some` exactly when the entry has a non-zero TTL, and
/// then matches the entry's slot in the expiry index.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    value: String,
    inserted_at: Option<Timestamp>,
    ttl: Duration,
}

impl CacheEntry {
    pub(crate) fn new(value: String, inserted_at: Option<Timestamp>, ttl: Duration) -> Self {
        CacheEntry {
            value,
            inserted_at,
            ttl,
        }
    }

    pub(crate) fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn inserted_at(&self) -> Option<Timestamp> {
        self.inserted_at
    }

    /// The instant this entry expires, `None` for never.
    pub(crate) fn expires_at(&self) -> Option<Timestamp> {
        self.inserted_at.map(|at| at + self.ttl)
    }
}

/// Instructions for reproducing the entries loaded from a filesystem
/// subtree: the key prefix it was mounted under, the handler that stored
/// each file, and the expiry bookkeeping of the recipe itself.
#[derive(Clone)]
pub(crate) struct PathRecipe {
    prefix: String,
    handler: InsertHandler,
    inserted_at: Option<Timestamp>,
    ttl: Duration,
}

impl PathRecipe {
    pub(crate) fn new(
        prefix: String,
        handler: InsertHandler,
        inserted_at: Option<Timestamp>,
        ttl: Duration,
    ) -> Self {
        PathRecipe {
            prefix,
            handler,
            inserted_at,
            ttl,
        }
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn handler(&self) -> InsertHandler {
        Arc::clone(&self.handler)
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn inserted_at(&self) -> Option<Timestamp> {
        self.inserted_at
    }

    /// The instant this recipe expires and its subtree is due for a reload,
    /// `None` for never.
    pub(crate) fn expires_at(&self) -> Option<Timestamp> {
        self.inserted_at.map(|at| at + self.ttl)
    }
}

impl fmt::Debug for PathRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRecipe")
            .field("prefix", &self.prefix)
            .field("inserted_at", &self.inserted_at)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
