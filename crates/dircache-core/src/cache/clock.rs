//! Expiry-ordering timestamps.
//!
//! Both expiry indexes are keyed by the timestamp issued at insertion time,
//! so two insertions landing in the same clock tick must not collide. The
//! [`Clock`] guarantees strictly increasing issuance: whenever the wall-clock
//! read is not ahead of the last issued value, the next value is the last one
//! plus a single nanosecond.

use std::ops::Add;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point on the cache's expiry timeline, in nanoseconds since the Unix
/// epoch.
///
/// Timestamps order expiring items; they are not wall-clock-exact. Adding a
/// [`Duration`] saturates instead of wrapping, so `inserted_at + ttl` is
/// well-defined for arbitrarily large TTLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The zero timestamp, ordered before every issued value.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Read the current wall clock.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        Timestamp(nanos)
    }

    /// Construct a timestamp from raw nanoseconds since the Unix epoch.
    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    /// Raw nanoseconds since the Unix epoch.
    pub fn as_nanos(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let rhs = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(rhs))
    }
}

/// Issues strictly increasing timestamps across the whole cache.
///
/// Shared by the entry store and the path store, so an index key issued for
/// one can never collide with a key issued for the other.
#[derive(Debug, Default)]
pub(crate) struct Clock {
    last: Timestamp,
}

impl Clock {
    /// Issue the next timestamp for the given wall-clock read.
    ///
    /// Returns `now` when it is ahead of the last issued value, otherwise
    /// `last + 1ns`.
    pub(crate) fn tick(&mut self, now: Timestamp) -> Timestamp {
        let next = if now > self.last {
            now
        } else {
            Timestamp(self.last.0.saturating_add(1))
        };
        self.last = next;
        next
    }
}
