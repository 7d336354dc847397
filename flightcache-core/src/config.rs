//! Resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TTL_SECONDS, ENV_DEFAULT_TTL_SECONDS};
use crate::error::ConfigError;

/// Configuration for a `CacheResolver`.
///
/// Fixed at construction; the resolver never changes its default afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Default TTL in seconds for entries without their own override.
    /// `None` means entries never expire unless a call says otherwise.
    pub default_ttl_seconds: Option<f64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl ResolverConfig {
    /// Creates a config with the given default TTL.
    pub fn with_default_ttl(seconds: f64) -> Self {
        Self {
            default_ttl_seconds: Some(seconds),
        }
    }

    /// Loads the config from the environment (and a `.env` file, if any).
    ///
    /// Reads `FLIGHTCACHE_DEFAULT_TTL_SECONDS`. An unset or empty variable
    /// leaves the default TTL unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let default_ttl_seconds = match std::env::var(ENV_DEFAULT_TTL_SECONDS) {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvValue {
                    var: ENV_DEFAULT_TTL_SECONDS.into(),
                    value: raw.clone(),
                })?)
            }
            _ => None,
        };

        let config = Self { default_ttl_seconds };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the default TTL, if set, is a finite positive number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.default_ttl_seconds {
            Some(seconds) if !(seconds.is_finite() && seconds > 0.0) => {
                Err(ConfigError::InvalidDefaultTtl(seconds))
            }
            Some(seconds) => Duration::try_from_secs_f64(seconds)
                .map(|_| ())
                .map_err(|_| ConfigError::InvalidDefaultTtl(seconds)),
            None => Ok(()),
        }
    }

    /// The default TTL as a [`Duration`], if set and valid.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }
}
