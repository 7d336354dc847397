//! # flightcache Core
//!
//! Core types, errors, and configuration for the flightcache single-flight
//! memoizing cache.
//!
//! This crate provides the building blocks shared by the resolver and its
//! frontends:
//!
//! - **Errors**: [`ResolveError`] for `resolve` outcomes, [`ConfigError`] for setup
//! - **TTL**: [`TtlOverride`] and the effective-TTL rules
//! - **Config**: [`ResolverConfig`], loadable from serde or the environment
//! - **Constants**: environment variable names and defaults
//!
//! ## Example
//!
//! ```rust
//! use flightcache_core::{ResolverConfig, TtlOverride};
//!
//! let config = ResolverConfig::with_default_ttl(30.0);
//! assert!(config.validate().is_ok());
//!
//! let ttl = TtlOverride::from(0.5);
//! assert!(ttl.to_duration().unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod ttl;

// Re-export commonly used items at crate root
pub use config::ResolverConfig;
pub use constants::*;
pub use error::{ConfigError, ResolveError};
pub use ttl::{effective_ttl, TtlOverride};
