//! Per-call TTL overrides and effective-TTL resolution.
//!
//! A `resolve` call may carry a TTL override in one of three states, mirroring an
//! options field that is absent, explicitly null, or a number of seconds. The
//! effective TTL for an expiry decision is resolved from the call override, then
//! the entry's stored override, then the resolver default, then "never".

use std::time::Duration;

use thiserror::Error;

use crate::error::ResolveError;

/// Per-call TTL override passed to `resolve`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TtlOverride {
    /// No override given. A live entry keeps whatever override it already has.
    #[default]
    Unspecified,
    /// Explicit "no override": this evaluation uses the resolver default.
    ///
    /// A numeric override already stored on a live entry is left in place and
    /// applies again to later calls that don't say otherwise.
    UseDefault,
    /// Override in seconds. Stored on the entry before the expiry check.
    Seconds(f64),
}

/// A TTL override that is negative, NaN, or too large for a [`Duration`].
#[derive(Clone, Copy, Debug, PartialEq, Error)]
#[error("TTL of {0} seconds is not representable")]
pub struct InvalidTtl(pub f64);

impl<E> From<InvalidTtl> for ResolveError<E> {
    fn from(err: InvalidTtl) -> Self {
        ResolveError::InvalidTtl { seconds: err.0 }
    }
}

impl TtlOverride {
    /// Converts a `Seconds` override into a [`Duration`].
    ///
    /// Returns `Ok(None)` for the variants that carry no number.
    pub fn to_duration(&self) -> Result<Option<Duration>, InvalidTtl> {
        match *self {
            TtlOverride::Seconds(seconds) => Duration::try_from_secs_f64(seconds)
                .map(Some)
                .map_err(|_| InvalidTtl(seconds)),
            TtlOverride::Unspecified | TtlOverride::UseDefault => Ok(None),
        }
    }

    /// Returns true for [`TtlOverride::Unspecified`].
    pub fn is_unspecified(&self) -> bool {
        matches!(self, TtlOverride::Unspecified)
    }
}

impl From<f64> for TtlOverride {
    fn from(seconds: f64) -> Self {
        TtlOverride::Seconds(seconds)
    }
}

impl From<Duration> for TtlOverride {
    fn from(ttl: Duration) -> Self {
        TtlOverride::Seconds(ttl.as_secs_f64())
    }
}

/// `None` plays the part of an explicit null.
impl From<Option<f64>> for TtlOverride {
    fn from(seconds: Option<f64>) -> Self {
        seconds.map_or(TtlOverride::UseDefault, TtlOverride::Seconds)
    }
}

/// Resolves the TTL used for one expiry decision.
///
/// `call` is the already-validated duration of this call's override, if it is
/// [`TtlOverride::Seconds`]. Returns `None` when the entry never expires.
pub fn effective_ttl(
    call: &TtlOverride,
    call_ttl: Option<Duration>,
    entry_ttl: Option<Duration>,
    default_ttl: Option<Duration>,
) -> Option<Duration> {
    match call {
        TtlOverride::Seconds(_) => call_ttl,
        TtlOverride::UseDefault => default_ttl,
        TtlOverride::Unspecified => entry_ttl.or(default_ttl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(0.0, Duration::ZERO ; "zero")]
    #[test_case(0.01, Duration::from_millis(10) ; "ten millis")]
    #[test_case(1.5, Duration::from_millis(1500) ; "fractional seconds")]
    fn test_to_duration_accepts(seconds: f64, expected: Duration) {
        assert_eq!(TtlOverride::Seconds(seconds).to_duration(), Ok(Some(expected)));
    }

    #[test_case(-1.0 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinite")]
    fn test_to_duration_rejects(seconds: f64) {
        assert!(TtlOverride::Seconds(seconds).to_duration().is_err());
    }

    #[test]
    fn test_variants_without_number() {
        assert_eq!(TtlOverride::Unspecified.to_duration(), Ok(None));
        assert_eq!(TtlOverride::UseDefault.to_duration(), Ok(None));
        assert!(TtlOverride::default().is_unspecified());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(TtlOverride::from(2.0), TtlOverride::Seconds(2.0));
        assert_eq!(TtlOverride::from(None), TtlOverride::UseDefault);
        assert_eq!(TtlOverride::from(Some(0.5)), TtlOverride::Seconds(0.5));
        assert_eq!(
            TtlOverride::from(Duration::from_millis(250)),
            TtlOverride::Seconds(0.25)
        );
    }

    #[test]
    fn test_invalid_ttl_into_resolve_error() {
        let err: ResolveError<()> = InvalidTtl(-3.0).into();
        assert!(matches!(err, ResolveError::InvalidTtl { seconds } if seconds == -3.0));
    }

    #[test]
    fn test_use_default_ignores_entry_override() {
        let entry = Some(Duration::from_secs(60));
        let default = Some(Duration::from_secs(1));
        assert_eq!(effective_ttl(&TtlOverride::UseDefault, None, entry, default), default);
        assert_eq!(effective_ttl(&TtlOverride::UseDefault, None, entry, None), None);
    }

    fn opt_duration() -> impl Strategy<Value = Option<Duration>> {
        proptest::option::of((0u64..1_000_000).prop_map(Duration::from_millis))
    }

    proptest! {
        #[test]
        fn prop_call_override_wins(
            call_ms in 0u64..1_000_000,
            entry in opt_duration(),
            default in opt_duration(),
        ) {
            let call = Duration::from_millis(call_ms);
            let ttl = TtlOverride::from(call);
            prop_assert_eq!(effective_ttl(&ttl, Some(call), entry, default), Some(call));
        }

        #[test]
        fn prop_unspecified_prefers_entry_then_default(
            entry in opt_duration(),
            default in opt_duration(),
        ) {
            let resolved = effective_ttl(&TtlOverride::Unspecified, None, entry, default);
            prop_assert_eq!(resolved, entry.or(default));
            if entry.is_none() && default.is_none() {
                prop_assert!(resolved.is_none());
            }
        }
    }
}
