//! Single-flight memoizing resolver.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use tracing::{debug, trace};

use flightcache_core::{effective_ttl, ConfigError, ResolveError, ResolverConfig, TtlOverride};

use crate::entry::{CacheEntry, Settled, SharedResult};

/// Caller-supplied computation run on a cache miss.
pub type Producer<V, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<V, E>> + Send>;

/// Future returned by [`CacheResolver::resolve`].
pub type Resolution<V, E> = BoxFuture<'static, Settled<V, E>>;

type Entries<V, E> = DashMap<String, CacheEntry<V, E>>;

/// Options for a single [`CacheResolver::resolve`] call.
///
/// Key and producer are required; leaving either out makes the call fail with
/// [`ResolveError::InvalidKey`] or [`ResolveError::InvalidProducer`].
pub struct ResolveOptions<V, E> {
    key: Option<String>,
    producer: Option<Producer<V, E>>,
    ttl: TtlOverride,
}

impl<V, E> Default for ResolveOptions<V, E> {
    fn default() -> Self {
        Self {
            key: None,
            producer: None,
            ttl: TtlOverride::Unspecified,
        }
    }
}

impl<V, E> ResolveOptions<V, E> {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the producer invoked when there is no live entry.
    pub fn producer<F, Fut>(mut self, producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.producer = Some(Box::new(move || producer().boxed()));
        self
    }

    /// Sets the TTL override for this call.
    pub fn ttl(mut self, ttl: impl Into<TtlOverride>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Sets the TTL override in seconds.
    pub fn ttl_seconds(self, seconds: f64) -> Self {
        self.ttl(TtlOverride::Seconds(seconds))
    }

    /// Evaluates this call against the resolver default, ignoring any entry override.
    pub fn use_default_ttl(self) -> Self {
        self.ttl(TtlOverride::UseDefault)
    }
}

impl<V, E> fmt::Debug for ResolveOptions<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("key", &self.key)
            .field("producer", &self.producer.as_ref().map(|_| "<producer>"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// In-memory cache of async computations with single-flight execution.
///
/// For each key at most one computation runs at a time: callers arriving while it
/// is in flight, or while its result is still fresh, share the same future
/// instead of invoking their own producer. Failures are never cached: a failed
/// computation evicts its own entry. A caller that looks the key up while that
/// eviction is waiting for the shard lock still joins the failing computation.
///
/// # Thread Safety
///
/// Entries live in a sharded map. A shard is locked only while an entry is looked
/// up and replaced, never while a producer runs, so waiters only ever wait on the
/// shared computation itself. Distinct keys on distinct shards do not contend.
///
/// Cloning the resolver is cheap; clones share the same entries.
pub struct CacheResolver<V, E> {
    entries: Arc<Entries<V, E>>,
    default_ttl: Option<Duration>,
    next_generation: Arc<AtomicU64>,
}

impl<V, E> CacheResolver<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a resolver whose entries never expire unless a call sets a TTL.
    pub fn new() -> Self {
        Self::from_parts(None)
    }

    /// Creates a resolver with a default TTL for entries without their own.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self::from_parts(Some(default_ttl))
    }

    /// Creates a resolver from a validated configuration.
    pub fn with_config(config: ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config.default_ttl()))
    }

    fn from_parts(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Resolves the value for the options' key.
    ///
    /// If a live entry exists its future is returned and the producer is not
    /// called. Otherwise a new entry is stored before this function returns, so
    /// every later caller joins it until it settles or expires.
    ///
    /// The call's TTL override is applied to an existing entry before the expiry
    /// check, so a longer override keeps an otherwise expired entry alive. An
    /// entry whose computation has not settled yet never expires.
    ///
    /// The producer closure itself is called on the computation's first poll,
    /// not inside this function.
    ///
    /// Invalid input is reported through the returned future, never by panicking.
    ///
    /// Inside a Tokio runtime the computation is spawned and runs to completion
    /// even if every caller drops its future. Outside one it is driven by the
    /// callers that await it.
    pub fn resolve(&self, options: ResolveOptions<V, E>) -> Resolution<V, E> {
        let ResolveOptions { key, producer, ttl } = options;

        let key = match key {
            Some(key) if !key.is_empty() => key,
            _ => return future::ready(Err(ResolveError::InvalidKey)).boxed(),
        };
        let producer = match producer {
            Some(producer) => producer,
            None => return future::ready(Err(ResolveError::InvalidProducer { key })).boxed(),
        };
        let call_ttl = match ttl.to_duration() {
            Ok(call_ttl) => call_ttl,
            Err(err) => return future::ready(Err(err.into())).boxed(),
        };

        // Lookup, expiry check and insertion happen under one shard lock.
        let result = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if call_ttl.is_some() {
                    entry.set_ttl(call_ttl);
                }

                // An unsettled entry is live whatever its age.
                if !entry.is_settled() {
                    trace!(key = %key, "Joining in-flight computation");
                    return entry.result().clone().boxed();
                }

                let effective = effective_ttl(&ttl, call_ttl, entry.ttl(), self.default_ttl);
                if entry.is_fresh(effective) {
                    trace!(key = %key, "Cache hit");
                    return entry.result().clone().boxed();
                }

                debug!(
                    key = %key,
                    elapsed = ?entry.elapsed(),
                    "Cache entry expired, recomputing"
                );
                let entry = self.new_entry(&key, producer, call_ttl);
                let result = entry.result().clone();
                occupied.insert(entry);
                result
            }
            Entry::Vacant(vacant) => {
                debug!(key = %key, "Cache miss, computing");
                let entry = self.new_entry(&key, producer, call_ttl);
                let result = entry.result().clone();
                vacant.insert(entry);
                result
            }
        };

        // Only start once the entry is visible, so a fast failure cannot run its
        // eviction before the entry exists.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(result.clone().map(drop));
        }

        result.boxed()
    }

    /// Shorthand for a call with no TTL override.
    pub fn get_or_resolve<F, Fut>(&self, key: impl Into<String>, producer: F) -> Resolution<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.resolve(ResolveOptions::new().key(key).producer(producer))
    }

    /// Forgets `key`. Futures already handed out still settle normally.
    pub fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            debug!(key, "Removed cache entry");
        }
    }

    /// Forgets every key. Futures already handed out still settle normally.
    pub fn flush(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Flushed cache");
    }

    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `key` has an entry, fresh or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The TTL applied to entries without an override.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn new_entry(
        &self,
        key: &str,
        producer: Producer<V, E>,
        ttl: Option<Duration>,
    ) -> CacheEntry<V, E> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let result = compute(
            Arc::downgrade(&self.entries),
            key.to_owned(),
            generation,
            producer,
        );
        CacheEntry::new(generation, result, ttl)
    }
}

/// Wraps `producer` into the shared computation for entry `generation`.
///
/// Nothing runs until the future is first polled. On failure the entry is
/// evicted, if it is still the same instance, before the error is published.
fn compute<V, E>(
    entries: Weak<Entries<V, E>>,
    key: String,
    generation: u64,
    producer: Producer<V, E>,
) -> SharedResult<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async move {
        let outcome = AssertUnwindSafe(async move { producer().await })
            .catch_unwind()
            .await;

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => ResolveError::ProducerFailure(Arc::new(err)),
            Err(_) => ResolveError::ProducerPanicked { key: key.clone() },
        };

        if let Some(entries) = entries.upgrade() {
            let evicted = entries.remove_if(&key, |_, entry| entry.generation() == generation);
            if evicted.is_some() {
                debug!(key = %key, "Evicted failed cache entry");
            }
        }

        Err(err)
    }
    .boxed()
    .shared()
}

impl<V, E> Clone for CacheResolver<V, E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}

impl<V, E> Default for CacheResolver<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> fmt::Debug for CacheResolver<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheResolver")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
