use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::constants::YIELD_ERROR_LABEL;

use super::wad_ray::format_fixed;

/// Supply APY of the tracked reserve, as emitted by the rate listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldReading {
    /// Percent, two decimals.
    Rate(Decimal),
    /// Resolution or seeding failed.
    Unavailable,
}

impl YieldReading {
    /// Percent value; `None` when the feed failed.
    pub fn apy(self) -> Option<Decimal> {
        match self {
            Self::Rate(r) => Some(r),
            Self::Unavailable => None,
        }
    }
}

/// Shows "0.00" until the first reading arrives.
impl Default for YieldReading {
    fn default() -> Self {
        Self::Rate(Decimal::ZERO)
    }
}

impl fmt::Display for YieldReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate(r) => f.write_str(&format_fixed(*r, 2)),
            Self::Unavailable => f.write_str(YIELD_ERROR_LABEL),
        }
    }
}

impl Serialize for YieldReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One month of the compounding projection (`M0`..`M12`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionPoint {
    pub month: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}
