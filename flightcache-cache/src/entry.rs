//! A single cached computation and its expiry bookkeeping.

use std::fmt;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use flightcache_core::ResolveError;

/// Output of a shared computation, as seen by every caller.
pub type Settled<V, E> = Result<V, ResolveError<E>>;

/// The computation future stored in an entry. Cloning it joins the same computation.
pub type SharedResult<V, E> = Shared<BoxFuture<'static, Settled<V, E>>>;

/// Cache entry with TTL.
///
/// Pairs a shared, possibly still running computation with the time the entry was
/// created and an optional per-entry TTL override. `created_at` is fixed at
/// construction; only the override changes afterwards.
pub struct CacheEntry<V, E> {
    generation: u64,
    result: SharedResult<V, E>,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl<V, E> CacheEntry<V, E>
where
    V: Clone,
{
    /// Creates an entry stamped with the current time.
    ///
    /// `generation` must be unique within the owning resolver; it identifies
    /// this entry instance when a failed computation evicts itself.
    pub fn new(generation: u64, result: SharedResult<V, E>, ttl: Option<Duration>) -> Self {
        Self {
            generation,
            result,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Identifies this entry instance within its resolver.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The shared computation. Clone it to wait on the result.
    pub fn result(&self) -> &SharedResult<V, E> {
        &self.result
    }

    /// When the entry was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the entry was created.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// The entry's own TTL override, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Replaces the entry's TTL override.
    pub fn set_ttl(&mut self, ttl: Option<Duration>) {
        self.ttl = ttl;
    }

    /// Whether the entry is still live under `effective_ttl`.
    ///
    /// `None` never expires. A zero TTL is never fresh.
    pub fn is_fresh(&self, effective_ttl: Option<Duration>) -> bool {
        effective_ttl.map_or(true, |ttl| self.elapsed() < ttl)
    }

    /// Whether the computation has produced its value.
    pub fn is_settled(&self) -> bool {
        self.result.peek().is_some()
    }
}

impl<V, E> fmt::Debug for CacheEntry<V, E>
where
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .field("settled", &self.is_settled())
            .finish()
    }
}
