//! Nanosecond-precision timestamp type
//!
//! Stamped entries carry a protobuf-style `(seconds, nanos)` pair. This type
//! is the validated in-memory form of that pair.
//!
//! ## Invariants
//!
//! - `0 <= nanos < 1_000_000_000`
//! - Ordering is lexicographic on `(seconds, nanos)`, which is chronological
//!   because `nanos` is normalized
//!
//! ```
//! use protobag_core::Timestamp;
//!
//! let t = Timestamp::new(1, 500).unwrap();
//! assert!(t > Timestamp::from_secs(1));
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i32 = 1_000_000_000;

/// Seconds + nanoseconds since Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    seconds: i64,
    nanos: i32,
}

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp {
        seconds: 0,
        nanos: 0,
    };

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a timestamp, rejecting out-of-range nanos
    pub fn new(seconds: i64, nanos: i32) -> Result<Self> {
        if !(0..NANOS_PER_SEC).contains(&nanos) {
            return Err(Error::InvalidTimestamp { seconds, nanos });
        }
        Ok(Timestamp { seconds, nanos })
    }

    /// Create a timestamp from whole seconds
    #[inline]
    pub const fn from_secs(seconds: i64) -> Self {
        Timestamp { seconds, nanos: 0 }
    }

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch if the system clock is before Unix epoch.
    pub fn now() -> Self {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            seconds: d.as_secs() as i64,
            nanos: d.subsec_nanos() as i32,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Seconds component
    #[inline]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanoseconds component, always in `[0, 1e9)`
    #[inline]
    pub const fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Total nanoseconds since epoch
    #[inline]
    pub fn as_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Absolute distance between two timestamps
    pub fn abs_diff(&self, other: &Timestamp) -> Duration {
        let delta = (self.as_nanos() - other.as_nanos()).unsigned_abs();
        let secs = (delta / NANOS_PER_SEC as u128).min(u64::MAX as u128) as u64;
        let nanos = (delta % NANOS_PER_SEC as u128) as u32;
        Duration::new(secs, nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

// =============================================================================
// Protobuf conversions
// =============================================================================

impl From<Timestamp> for prost_types::Timestamp {
    fn from(ts: Timestamp) -> Self {
        prost_types::Timestamp {
            seconds: ts.seconds,
            nanos: ts.nanos,
        }
    }
}

impl TryFrom<prost_types::Timestamp> for Timestamp {
    type Error = Error;

    fn try_from(ts: prost_types::Timestamp) -> Result<Self> {
        Timestamp::new(ts.seconds, ts.nanos)
    }
}
