//! The cache engine: entry store, path store, and whole-state swap.
//!
//! A [`Cache`] holds four structures behind one coarse mutex: the key/value
//! entry map, the path-recipe map, and one expiry index per map. The indexes
//! are ordered by the strictly increasing timestamps issued by the shared
//! [`clock::Clock`], which is what makes the watchdog sweep deterministic.
//!
//! # Thread Safety
//!
//! `Cache` is `Send + Sync`; share it across threads via `Arc`:
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dircache_core::Cache;
//!
//! let cache = Arc::new(Cache::new());
//! let worker = Arc::clone(&cache);
//! std::thread::spawn(move || worker.add("/motd", "hello", Duration::ZERO))
//!     .join()
//!     .unwrap();
//! assert_eq!(cache.find("/motd").as_deref(), Some("hello"));
//! ```
//!
//! All public operations are short critical sections over in-memory state.
//! The two exceptions are documented where they occur: the bulk-load walk
//! (`insert_path*`) runs unlocked and re-enters [`Cache::add`] per file, and
//! the watchdog releases the lock around subtree reloads.

pub mod clock;
pub mod entry;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::clock::{Clock, Timestamp};
use crate::cache::entry::{CacheEntry, PathRecipe};
use crate::fs::{Filesystem, OsFilesystem};

/// In-process key/value cache with TTL expiry and filesystem bulk loading.
///
/// Values are added directly with [`add`](Cache::add) or in bulk from a
/// directory subtree with [`insert_path`](Cache::insert_path). Entries and
/// subtree recipes with a non-zero TTL expire; expired entries are evicted
/// and expired subtrees reloaded by [`sweep`](Cache::sweep), which an
/// external scheduler is expected to invoke periodically.
pub struct Cache {
    pub(crate) inner: Mutex<CacheInner>,
    pub(crate) fs: Arc<dyn Filesystem>,
}

/// Everything the coarse lock guards, including the clock counter.
#[derive(Default)]
pub(crate) struct CacheInner {
    pub(crate) clock: Clock,
    pub(crate) entries: HashMap<String, CacheEntry>,
    pub(crate) entry_expiry: BTreeMap<Timestamp, String>,
    pub(crate) paths: HashMap<PathBuf, PathRecipe>,
    pub(crate) path_expiry: BTreeMap<Timestamp, PathBuf>,
}

impl CacheInner {
    /// Remove an entry and its expiry-index slot, if present.
    pub(crate) fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                if let Some(at) = entry.inserted_at() {
                    self.entry_expiry.remove(&at);
                }
                true
            }
            None => false,
        }
    }

    /// Remove a recipe and its expiry-index slot, if present.
    pub(crate) fn remove_recipe(&mut self, path: &Path) -> bool {
        match self.paths.remove(path) {
            Some(recipe) => {
                if let Some(at) = recipe.inserted_at() {
                    self.path_expiry.remove(&at);
                }
                true
            }
            None => false,
        }
    }
}

impl Cache {
    /// Create an empty cache backed by the OS filesystem.
    pub fn new() -> Self {
        Self::with_filesystem(Arc::new(OsFilesystem))
    }

    /// Create an empty cache that loads subtrees through the given
    /// [`Filesystem`] implementation.
    pub fn with_filesystem(fs: Arc<dyn Filesystem>) -> Self {
        Cache {
            inner: Mutex::new(CacheInner::default()),
            fs,
        }
    }

    /// Store `value` under `key`, replacing any previous mapping.
    ///
    /// A non-zero `ttl` schedules the entry for eviction once
    /// `inserted_at + ttl` has passed at sweep time; `Duration::ZERO` means
    /// the entry never expires.
    pub fn add(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        let value = value.into();
        let mut inner = self.inner.lock();
        inner.remove_entry(key);
        let inserted_at = if ttl.is_zero() {
            None
        } else {
            let at = inner.clock.tick(Timestamp::now());
            inner.entry_expiry.insert(at, key.to_string());
            Some(at)
        };
        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(value, inserted_at, ttl));
    }

    /// Look up the value stored under `key`. No side effects.
    pub fn find(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock();
        inner.entries.get(key).map(|entry| entry.value().to_string())
    }

    /// Look up `key` together with its expiry instant.
    ///
    /// The inner `Option` is `None` for entries that never expire.
    pub fn find_with_expiry(&self, key: &str) -> Option<(String, Option<Timestamp>)> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .map(|entry| (entry.value().to_string(), entry.expires_at()))
    }

    /// Remove the mapping for `key`. Returns `false` if it was absent.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove_entry(key)
    }

    /// Drop every entry and every path recipe.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.entry_expiry.clear();
        inner.paths.clear();
        inner.path_expiry.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the entry store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Whether a recipe is registered for `path`.
    ///
    /// Queries the path store only; the entries a path produced are not
    /// consulted.
    pub fn find_path(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().paths.contains_key(path.as_ref())
    }

    /// Look up the recipe for `path` together with its expiry instant.
    ///
    /// The inner `Option` is `None` for recipes that never expire.
    pub fn find_path_with_expiry(&self, path: impl AsRef<Path>) -> Option<Option<Timestamp>> {
        let inner = self.inner.lock();
        inner
            .paths
            .get(path.as_ref())
            .map(PathRecipe::expires_at)
    }

    /// Remove the recipe for `path`. Returns `false` if none was registered.
    ///
    /// Entries previously loaded from the path stay in the cache.
    pub fn remove_path(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().remove_recipe(path.as_ref())
    }

    /// Snapshot of the store sizes, including how many items carry a TTL.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            expiring_entries: inner.entry_expiry.len(),
            paths: inner.paths.len(),
            expiring_paths: inner.path_expiry.len(),
        }
    }

    /// Exchange the complete internal state of two caches, clock included.
    ///
    /// Both locks are taken in one global order, by instance address, so two
    /// threads swapping the same pair in opposite argument order cannot
    /// deadlock. Swapping a cache with itself is a no-op.
    pub fn swap(&self, other: &Cache) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (first, second) = if std::ptr::from_ref(self) as usize <= std::ptr::from_ref(other) as usize
        {
            (self, other)
        } else {
            (other, self)
        };
        let mut first_inner = first.inner.lock();
        let mut second_inner = second.inner.lock();
        std::mem::swap(&mut *first_inner, &mut *second_inner);
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Cache")
            .field("entries", &stats.entries)
            .field("paths", &stats.paths)
            .finish_non_exhaustive()
    }
}

/// Exchange the state of two externally held caches.
///
/// Convenience form of [`Cache::swap`].
pub fn swap(a: &Cache, b: &Cache) {
    a.swap(b);
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of stored entries.
    pub entries: usize,
    /// Entries with a TTL, i.e. occupied entry expiry-index slots.
    pub expiring_entries: usize,
    /// Number of registered path recipes.
    pub paths: usize,
    /// Recipes with a TTL, i.e. occupied path expiry-index slots.
    pub expiring_paths: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_cache_creation() {
        let cache = Cache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 0,
                expiring_entries: 0,
                paths: 0,
                expiring_paths: 0
            }
        );
    }

    #[test]
    fn test_add_then_find() {
        let cache = Cache::new();
        assert_eq!(cache.find("/a"), None);

        cache.add("/a", "alpha", Duration::ZERO);
        assert_eq!(cache.find("/a").as_deref(), Some("alpha"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_second_add_wins_and_counts_once() {
        let cache = Cache::new();
        cache.add("/a", "first", HOUR);
        cache.add("/a", "second", Duration::ZERO);

        assert_eq!(cache.find("/a").as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
        // Replacing a TTL'd entry with a non-expiring one frees its index slot.
        assert_eq!(cache.stats().expiring_entries, 0);
    }

    #[test]
    fn test_remove() {
        let cache = Cache::new();
        assert!(!cache.remove("/missing"));
        assert_eq!(cache.len(), 0);

        cache.add("/a", "alpha", HOUR);
        assert!(cache.remove("/a"));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expiring_entries, 0);
        assert!(!cache.remove("/a"));
    }

    #[test]
    fn test_find_with_expiry() {
        let cache = Cache::new();
        assert_eq!(cache.find_with_expiry("/missing"), None);

        cache.add("/forever", "v", Duration::ZERO);
        assert_eq!(
            cache.find_with_expiry("/forever"),
            Some(("v".to_string(), None))
        );

        let before = Timestamp::now();
        cache.add("/ttl", "w", HOUR);
        let (value, expires_at) = cache.find_with_expiry("/ttl").unwrap();
        assert_eq!(value, "w");
        assert!(expires_at.unwrap() >= before + HOUR);
    }

    #[test]
    fn test_clear_drops_entries_and_recipes() {
        let cache = Cache::new();
        cache.add("/a", "alpha", HOUR);
        cache.add("/b", "beta", Duration::ZERO);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 0,
                expiring_entries: 0,
                paths: 0,
                expiring_paths: 0
            }
        );
    }

    #[test]
    fn test_path_queries_on_empty_store() {
        let cache = Cache::new();
        assert!(!cache.find_path("/srv/static"));
        assert_eq!(cache.find_path_with_expiry("/srv/static"), None);
        assert!(!cache.remove_path("/srv/static"));
    }

    #[test]
    fn test_swap_exchanges_state() {
        let a = Cache::new();
        let b = Cache::new();
        a.add("/a", "from-a", HOUR);
        a.add("/a2", "also-a", Duration::ZERO);
        b.add("/b", "from-b", Duration::ZERO);

        let a_expiry = a.find_with_expiry("/a").unwrap().1;

        a.swap(&b);

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(a.find("/b").as_deref(), Some("from-b"));
        assert_eq!(b.find("/a").as_deref(), Some("from-a"));
        assert_eq!(b.find("/a2").as_deref(), Some("also-a"));
        // Expiry timestamps travel with the entries.
        assert_eq!(b.find_with_expiry("/a").unwrap().1, a_expiry);
    }

    #[test]
    fn test_swap_free_function_and_self_swap() {
        let a = Cache::new();
        let b = Cache::new();
        a.add("/a", "alpha", Duration::ZERO);

        swap(&a, &b);
        assert!(a.is_empty());
        assert_eq!(b.find("/a").as_deref(), Some("alpha"));

        b.swap(&b);
        assert_eq!(b.find("/a").as_deref(), Some("alpha"));
    }

    #[test]
    fn test_concurrent_adds_from_threads() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(Cache::new());
        let mut handles = vec![];

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    cache.add(&format!("/key{j}"), format!("v{i}_{j}"), HOUR);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Same key space from every thread, last write wins per key.
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.stats().expiring_entries, 100);
    }
}
