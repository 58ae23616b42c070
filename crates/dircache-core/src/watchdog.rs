//! The sweep: evict expired entries, reload expired subtrees.
//!
//! An external scheduler decides when to sweep; the cache only provides the
//! procedure. [`Cache::sweep_at`] takes an explicit reference time so tests
//! and embedders can drive expiry deterministically.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::Cache;
use crate::cache::clock::Timestamp;
use crate::cache::entry::InsertHandler;

impl Cache {
    /// Sweep with the current wall clock as the reference time.
    pub fn sweep(&self) {
        self.sweep_at(Timestamp::now());
    }

    /// Evict every entry expired at `now`, then reload every path recipe
    /// expired at `now`.
    ///
    /// Both sweeps walk their expiry index from the earliest slot and stop
    /// at the first slot whose item has not expired; index slots are keyed
    /// by insertion time, so everything behind that slot was inserted later.
    /// The entry sweep always runs to completion before the path sweep
    /// starts.
    pub fn sweep_at(&self, now: Timestamp) {
        self.sweep_entries(now);
        self.sweep_paths(now);
    }

    fn sweep_entries(&self, now: Timestamp) {
        let mut inner = self.inner.lock();
        let mut evicted = 0usize;
        loop {
            let Some((at, key)) = inner
                .entry_expiry
                .first_key_value()
                .map(|(at, key)| (*at, key.clone()))
            else {
                break;
            };
            let expired = inner
                .entries
                .get(&key)
                .and_then(|entry| entry.expires_at())
                .is_some_and(|expires| expires <= now);
            if !expired {
                break;
            }
            inner.entry_expiry.remove(&at);
            inner.entries.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, "evicted expired entries");
        }
    }

    fn sweep_paths(&self, now: Timestamp) {
        // Two-phase: collect the expired recipes under the lock, then
        // reload each one without holding it. The reload re-walks the
        // filesystem and registers a fresh recipe with a new timestamp;
        // between recipe removal and re-registration other threads observe
        // no recipe for the path.
        let mut due: Vec<(PathBuf, String, Duration, InsertHandler)> = Vec::new();
        {
            let mut inner = self.inner.lock();
            loop {
                let Some((at, path)) = inner
                    .path_expiry
                    .first_key_value()
                    .map(|(at, path)| (*at, path.clone()))
                else {
                    break;
                };
                let Some(recipe) = inner.paths.get(&path) else {
                    break;
                };
                if !recipe.expires_at().is_some_and(|expires| expires <= now) {
                    break;
                }
                let job = (
                    path.clone(),
                    recipe.prefix().to_string(),
                    recipe.ttl(),
                    recipe.handler(),
                );
                inner.path_expiry.remove(&at);
                due.push(job);
            }
        }

        for (path, prefix, ttl, handler) in due {
            debug!(path = %path.display(), "reloading expired path");
            if let Err(error) = self.insert_path_with(&path, &prefix, ttl, handler) {
                warn!(path = %path.display(), %error, "reload failed, recipe dropped");
            }
        }
    }
}
