use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::constants::{
    CRITICAL_HEALTH_FACTOR, HEALTH_FACTOR_SAFE_CEILING_RAW, HEALTH_SAFE_LABEL,
    HEALTH_UNKNOWN_LABEL,
};

use super::wad_ray::{base_currency_to_decimal, bps_to_decimal, format_fixed, round_display, wad_to_decimal};

/// Raw result of `Pool.getUserAccountData(user)`.
///
/// Base values are USD at 8 decimals, thresholds are basis points and the
/// health factor is WAD. Replaced wholesale on every successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Health factor as the dashboard shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthDisplay {
    /// No data yet (raw value is zero).
    Unknown,
    /// Protocol reports the "no debt" sentinel.
    Safe,
    /// Numeric value, two decimals.
    Value(Decimal),
}

/// Colour band of the health readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTone {
    Safe,
    Warning,
    Critical,
}

impl HealthDisplay {
    /// Classify a raw WAD health factor.
    ///
    /// The sentinel is checked on the raw integer: `uint256::MAX` does not
    /// fit a `Decimal`.
    pub fn from_raw(raw: U256) -> Self {
        if raw.is_zero() {
            Self::Unknown
        } else if raw > HEALTH_FACTOR_SAFE_CEILING_RAW {
            Self::Safe
        } else {
            Self::Value(round_display(wad_to_decimal(raw), 2))
        }
    }

    /// Numeric and below [`CRITICAL_HEALTH_FACTOR`].
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Value(v) if v < CRITICAL_HEALTH_FACTOR)
    }

    /// Only the no-debt sentinel is green; any readout that is not
    /// critical (including "---") is amber.
    pub fn tone(self) -> HealthTone {
        match self {
            Self::Safe => HealthTone::Safe,
            _ if self.is_critical() => HealthTone::Critical,
            _ => HealthTone::Warning,
        }
    }
}

impl Default for HealthDisplay {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for HealthDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str(HEALTH_UNKNOWN_LABEL),
            Self::Safe => f.write_str(HEALTH_SAFE_LABEL),
            Self::Value(v) => f.write_str(&format_fixed(*v, 2)),
        }
    }
}

impl Serialize for HealthDisplay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Display values derived from an [`AccountSnapshot`]. Never stored; always
/// recomputed from the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    #[serde(with = "rust_decimal::serde::str")]
    pub collateral_usd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub debt_usd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub borrow_power_usd: Decimal,
    /// Weighted liquidation threshold as a fraction.
    #[serde(with = "rust_decimal::serde::str")]
    pub liquidation_threshold: Decimal,
    /// Weighted LTV as a fraction.
    #[serde(with = "rust_decimal::serde::str")]
    pub ltv: Decimal,
    pub health: HealthDisplay,
}

impl AccountView {
    pub fn derive(snapshot: &AccountSnapshot) -> Self {
        let usd = |raw: U256| round_display(base_currency_to_decimal(raw), 2);
        Self {
            collateral_usd: usd(snapshot.total_collateral_base),
            debt_usd: usd(snapshot.total_debt_base),
            borrow_power_usd: usd(snapshot.available_borrows_base),
            liquidation_threshold: bps_to_decimal(snapshot.current_liquidation_threshold),
            ltv: bps_to_decimal(snapshot.ltv),
            health: HealthDisplay::from_raw(snapshot.health_factor),
        }
    }
}
