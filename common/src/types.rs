//! Core value types for order book reconstruction

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Offset of exchange local time (IST, UTC+05:30) in seconds
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Price in integer minor units (e.g. paise, cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Px(pub i64);

impl Px {
    /// Zero price, used as "no market" on an empty side
    pub const ZERO: Self = Self(0);

    /// Create a price from minor units
    #[must_use]
    pub const fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Get the price in minor units
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Get the price as f64 (still in minor units)
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// True for a real, tradeable price
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order quantity in whole units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Qty(pub i64);

impl Qty {
    /// Zero quantity
    pub const ZERO: Self = Self(0);

    /// Create a quantity
    #[must_use]
    pub const fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Get the quantity as i64
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Get the quantity as f64
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Check for zero quantity
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True for a quantity that may rest on the book
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Add two quantities, `None` if the sum does not fit
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }
}

impl Add for Qty {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Qty {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Qty {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Qty {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Qty {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp in nanoseconds since UNIX epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Ts(pub u64);

impl Ts {
    /// Create timestamp from nanoseconds
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Get timestamp as nanoseconds
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Get timestamp as microseconds
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0 / 1000
    }

    /// Get timestamp as milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Render the time of day in IST as `HH:MM:SS.ffffff`.
    ///
    /// Sub-microsecond digits are truncated, not rounded. The date part is
    /// dropped.
    #[must_use]
    pub fn format_ist(&self) -> String {
        let secs = (self.0 / NANOS_PER_SEC) as i64;
        let nanos = (self.0 % NANOS_PER_SEC) as u32;

        let Some(offset) = FixedOffset::east_opt(IST_OFFSET_SECS) else {
            return String::from("00:00:00.000000");
        };

        match DateTime::from_timestamp(secs, nanos) {
            Some(utc) => utc.with_timezone(&offset).format("%H:%M:%S%.6f").to_string(),
            None => String::from("00:00:00.000000"),
        }
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
