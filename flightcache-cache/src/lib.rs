//! Single-flight memoizing cache for async computations.
//!
//! A [`CacheResolver`] maps string keys to shared computations. The first caller
//! for a key runs its producer; everyone else arriving before the result expires
//! gets the same future. Entries expire by TTL (per call, per entry, or resolver
//! default), can be removed or flushed explicitly, and failed computations are
//! never kept.
//!
//! ```rust
//! use flightcache_cache::{CacheResolver, ResolveOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let resolver: CacheResolver<u64, std::io::Error> = CacheResolver::new();
//!
//! let answer = resolver
//!     .resolve(
//!         ResolveOptions::new()
//!             .key("answer")
//!             .producer(|| async { Ok(42) })
//!             .ttl_seconds(30.0),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(answer, 42);
//!
//! // Served from the cache: this producer never runs.
//! let again = resolver.get_or_resolve("answer", || async { Ok(0) }).await.unwrap();
//! assert_eq!(again, 42);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod entry;
mod resolver;

pub use entry::{CacheEntry, Settled, SharedResult};
pub use flightcache_core::{ConfigError, ResolveError, ResolverConfig, TtlOverride};
pub use resolver::{CacheResolver, Producer, ResolveOptions, Resolution};
