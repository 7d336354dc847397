//! Error types for flightcache.
//!
//! `resolve` never panics or returns early on bad input: every failure, from an
//! empty key to a producer error, travels through the returned future as a
//! [`ResolveError`]. Configuration problems are reported at construction time as
//! a [`ConfigError`].

use std::sync::Arc;

use thiserror::Error;

/// Failure delivered by the future returned from `resolve`.
///
/// `E` is the caller's own producer error type. It is kept behind an [`Arc`] so a
/// single failure can be handed to every caller that joined the same in-flight
/// computation.
#[derive(Debug, Error)]
pub enum ResolveError<E> {
    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The key was missing or empty.
    #[error("Invalid cache key: key must be a non-empty string")]
    InvalidKey,

    /// No producer was supplied.
    #[error("Invalid producer for key '{key}': a producer is required")]
    InvalidProducer {
        /// Key of the rejected call.
        key: String,
    },

    /// The per-call TTL override cannot be turned into a duration.
    #[error("Invalid TTL override: {seconds} is not a finite, non-negative number of seconds")]
    InvalidTtl {
        /// The rejected value.
        seconds: f64,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // PRODUCER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The producer settled with an error. Shared unchanged by every joiner.
    #[error("Producer failed: {0}")]
    ProducerFailure(Arc<E>),

    /// The producer panicked while being polled.
    #[error("Producer for key '{key}' panicked")]
    ProducerPanicked {
        /// Key whose computation panicked.
        key: String,
    },
}

impl<E> ResolveError<E> {
    /// Returns true if the call was rejected before any cache lookup.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ResolveError::InvalidKey
                | ResolveError::InvalidProducer { .. }
                | ResolveError::InvalidTtl { .. }
        )
    }

    /// Returns true if the error came out of a producer invocation.
    pub fn is_producer_error(&self) -> bool {
        matches!(
            self,
            ResolveError::ProducerFailure(_) | ResolveError::ProducerPanicked { .. }
        )
    }

    /// Returns the producer's own error, if that is what this is.
    pub fn producer_error(&self) -> Option<&E> {
        match self {
            ResolveError::ProducerFailure(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Manual impl: no `E: Clone` bound.
impl<E> Clone for ResolveError<E> {
    fn clone(&self) -> Self {
        match self {
            ResolveError::InvalidKey => ResolveError::InvalidKey,
            ResolveError::InvalidProducer { key } => ResolveError::InvalidProducer { key: key.clone() },
            ResolveError::InvalidTtl { seconds } => ResolveError::InvalidTtl { seconds: *seconds },
            ResolveError::ProducerFailure(err) => ResolveError::ProducerFailure(Arc::clone(err)),
            ResolveError::ProducerPanicked { key } => {
                ResolveError::ProducerPanicked { key: key.clone() }
            }
        }
    }
}

/// Errors raised while building a resolver configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The default TTL must be a finite, positive number of seconds.
    #[error("Invalid default TTL: {0} is not a finite, positive number of seconds")]
    InvalidDefaultTtl(f64),

    /// An environment variable held a value that could not be parsed.
    #[error("Invalid value '{value}' for environment variable {var}")]
    InvalidEnvValue {
        /// Variable name.
        var: String,
        /// Raw value found in the environment.
        value: String,
    },
}
