//! Integer price and volume types
//!
//! All quantity and price arithmetic in the core is integer; the only
//! floating-point value in the system is the advisory cost basis kept by
//! the ledger. Newtypes keep the two axes from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Integer price in quote units.
///
/// Market orders carry [`Price::MARKET`] (zero); limit prices must be
/// strictly positive, which the matching engine validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Sentinel price carried by market orders.
    pub const MARKET: Price = Price(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer order volume.
///
/// Remaining volume is mutated in place as an order fills; it never goes
/// negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Volume(i64);

impl Volume {
    pub const ZERO: Volume = Volume(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0 + rhs.0)
    }
}

impl Sub for Volume {
    type Output = Volume;

    fn sub(self, rhs: Volume) -> Volume {
        Volume(self.0 - rhs.0)
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Volume) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Volume {
    fn sub_assign(&mut self, rhs: Volume) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cash value of `volume` units traded at `price`.
pub fn notional(price: Price, volume: Volume) -> i64 {
    price.0 * volume.0
}
