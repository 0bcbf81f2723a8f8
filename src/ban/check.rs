//! Check results
//!
//! A ban type answers a check with one of three outcomes. Results from several
//! ban types are combined with [`CheckResult::aggregate`].

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Outcome of checking a subject against a ban type
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum CheckResult {
    /// The subject is exempt and bypasses every ban
    #[display("excluded")]
    Excluded = -1,
    /// Nothing matched
    #[default]
    #[display("no result")]
    NoResult = 0,
    /// The subject is banned
    #[display("banned")]
    Banned = 1,
}

impl CheckResult {
    /// Integer value of this result, usable as a bit flag
    #[must_use]
    pub const fn bits(self) -> i32 {
        self as i32
    }

    /// Convert a combined bit value back into a result
    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        if bits < 0 {
            Self::Excluded
        } else if bits & Self::Banned.bits() != 0 {
            Self::Banned
        } else {
            Self::NoResult
        }
    }

    /// Combine results from several ban types.
    ///
    /// The first `Excluded` wins immediately and the remaining results are not
    /// pulled from the iterator. Otherwise the results are OR-ed together.
    pub fn aggregate<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut overall = Self::NoResult.bits();

        for result in results {
            if result == Self::Excluded {
                return result;
            }
            overall |= result.bits();
        }

        Self::from_bits(overall)
    }
}
