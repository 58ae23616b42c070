//! Bulk loading of filesystem subtrees into the cache.
//!
//! A loaded subtree maps directory structure onto cache keys: every
//! directory level appends one percent-decoded name segment to the key
//! prefix, and every file becomes one entry holding its decoded text
//! content. The walk runs without the cache lock; each stored file re-enters
//! the cache through the insert handler, which takes the lock briefly.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::cache::Cache;
use crate::cache::clock::Timestamp;
use crate::cache::entry::{InsertHandler, PathRecipe, default_insert_handler};

/// Why a bulk load aborted.
///
/// A failed load performs no rollback: entries stored earlier in the same
/// walk stay in the cache, and no recipe is registered for the path.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Filesystem access failed while listing or reading the subtree.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// The path being listed or read when the failure occurred.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The insert handler declined an entry.
    #[error("insert handler rejected key '{key}'")]
    HandlerRejected {
        /// The key the handler refused to store.
        key: String,
    },
}

impl LoadError {
    fn io(path: &Path, source: io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Cache {
    /// Load the subtree at `path` under the root prefix, without expiry,
    /// storing every file unchanged.
    ///
    /// Shorthand for [`insert_path_with`](Cache::insert_path_with) with
    /// prefix `"/"`, zero TTL, and the default insert handler.
    pub fn insert_path(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.insert_path_inner(path.as_ref(), "/", Duration::ZERO, default_insert_handler())
    }

    /// Load the subtree at `path`, mounting its files under `prefix`.
    ///
    /// Every subdirectory appends its percent-decoded name to the prefix;
    /// every file becomes the key `normalized-prefix + decoded-name` and is
    /// handed to `handler` together with its UTF-8-decoded content
    /// (malformed sequences become replacement characters). An empty or
    /// `"/"` prefix normalizes to `"/"`; anything else gets a `/` appended.
    ///
    /// On success a recipe `(prefix, handler, ttl)` is registered for
    /// `path`, replacing any previous recipe, so an expired subtree can be
    /// reloaded by the sweep. Entries produced by a previous recipe for the
    /// same path are NOT removed; keys that the new walk does not reuse keep
    /// their old values until overwritten or evicted.
    ///
    /// Any I/O failure, and any file the handler declines, aborts the load:
    /// the error is returned, no recipe is registered, and entries already
    /// stored by this walk remain (no rollback). Directories are walked
    /// before files, in sorted name order, so the partial state left by a
    /// failure is deterministic.
    pub fn insert_path_with(
        &self,
        path: impl AsRef<Path>,
        prefix: &str,
        ttl: Duration,
        handler: InsertHandler,
    ) -> Result<(), LoadError> {
        self.insert_path_inner(path.as_ref(), prefix, ttl, handler)
    }

    #[instrument(level = "debug", skip(self, handler))]
    fn insert_path_inner(
        &self,
        path: &Path,
        prefix: &str,
        ttl: Duration,
        handler: InsertHandler,
    ) -> Result<(), LoadError> {
        // The old recipe disappears before the walk starts; entries it
        // loaded stay put. Concurrent lookups see no recipe until the new
        // one is registered below.
        self.remove_path(path);

        let loaded = self.load_tree(path, prefix, ttl, &handler)?;

        let mut inner = self.inner.lock();
        // A racing load of the same path may have registered meanwhile.
        inner.remove_recipe(path);
        let inserted_at = if ttl.is_zero() {
            None
        } else {
            let at = inner.clock.tick(Timestamp::now());
            inner.path_expiry.insert(at, path.to_path_buf());
            Some(at)
        };
        inner.paths.insert(
            path.to_path_buf(),
            PathRecipe::new(prefix.to_string(), handler, inserted_at, ttl),
        );
        drop(inner);

        debug!(path = %path.display(), loaded, "subtree loaded");
        Ok(())
    }

    fn load_tree(
        &self,
        dir: &Path,
        prefix: &str,
        ttl: Duration,
        handler: &InsertHandler,
    ) -> Result<usize, LoadError> {
        let base = normalized_prefix(prefix);
        let mut loaded = 0;

        let mut dirs = self
            .fs
            .list_dirs(dir)
            .map_err(|source| LoadError::io(dir, source))?;
        dirs.sort();
        for subdir in dirs {
            let Some(name) = decoded_file_name(&subdir) else {
                continue;
            };
            loaded += self.load_tree(&subdir, &format!("{base}{name}"), ttl, handler)?;
        }

        let mut files = self
            .fs
            .list_files(dir)
            .map_err(|source| LoadError::io(dir, source))?;
        files.sort();
        for file in files {
            let Some(name) = decoded_file_name(&file) else {
                continue;
            };
            let key = format!("{base}{name}");
            let bytes = self
                .fs
                .read(&file)
                .map_err(|source| LoadError::io(&file, source))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if !handler(self, &key, text, ttl) {
                return Err(LoadError::HandlerRejected { key });
            }
            trace!(key = %key, "stored file");
            loaded += 1;
        }

        Ok(loaded)
    }
}

/// Key prefix for one directory level: empty and `"/"` collapse to the root
/// separator, everything else gets the separator appended.
fn normalized_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix == "/" {
        "/".to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Final name segment of `path`, percent-decoded into key form.
fn decoded_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    Some(
        percent_decode_str(name.as_ref())
            .decode_utf8_lossy()
            .into_owned(),
    )
}
