//! Constants shared across flightcache crates.

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable holding the resolver-wide default TTL, in seconds.
pub const ENV_DEFAULT_TTL_SECONDS: &str = "FLIGHTCACHE_DEFAULT_TTL_SECONDS";

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default TTL applied when no configuration sets one: entries never expire.
pub const DEFAULT_TTL_SECONDS: Option<f64> = None;
