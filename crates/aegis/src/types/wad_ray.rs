//! Unit conversions for on-chain fixed-point values.
//!
//! Every `U256` <-> `Decimal` conversion goes through here: WAD (18
//! decimals), RAY (27), Aave base currency (8), basis points and
//! token-native amounts (USDC = 6).

use alloy::primitives::{uint, U256};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::constants::{BASE_CURRENCY_DECIMALS, RAY_TO_PERCENT_DIVISOR_EXP, WAD_DECIMALS};
use crate::errors::AegisError;

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const DECIMAL_MAX_MANTISSA: U256 = uint!(79_228_162_514_264_337_593_543_950_335_U256);

// ---------------------------------------------------------------------------
// Core conversions
// ---------------------------------------------------------------------------

/// Convert a raw integer at `decimals` scale to `Decimal`.
///
/// Values wider than 96 bits lose their lowest digits; values above
/// `Decimal::MAX` saturate.
pub fn units_to_decimal(raw: U256, decimals: u32) -> Decimal {
    let mut mantissa = raw;
    let mut scale = decimals;
    while mantissa > DECIMAL_MAX_MANTISSA {
        if scale == 0 {
            return Decimal::MAX;
        }
        mantissa /= U256::from(10u8);
        scale -= 1;
    }
    let small: u128 = mantissa.to::<u128>();
    Decimal::from_i128_with_scale(small as i128, scale)
}

/// Parse a user-entered decimal amount into a raw integer at `decimals` scale.
///
/// Extra fractional digits are rounded half away from zero. Negative, empty
/// or malformed input is rejected.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AegisError> {
    let value = parse_decimal(amount)
        .ok_or_else(|| AegisError::InvalidInput(format!("invalid amount '{amount}'")))?;
    if value.is_sign_negative() {
        return Err(AegisError::InvalidInput(format!(
            "amount '{amount}' is negative"
        )));
    }
    decimal_to_units(value, decimals)
}

/// Scale a non-negative `Decimal` into a raw integer at `decimals` scale.
pub fn decimal_to_units(value: Decimal, decimals: u32) -> Result<U256, AegisError> {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let mantissa = u128::try_from(rounded.mantissa())
        .map_err(|_| AegisError::InvalidInput(format!("amount {value} is negative")))?;
    let exponent = decimals.saturating_sub(rounded.scale());
    Ok(U256::from(mantissa) * U256::from(10u8).pow(U256::from(exponent)))
}

/// Parse `18`-decimal ETH input.
pub fn parse_ether(amount: &str) -> Result<U256, AegisError> {
    parse_units(amount, WAD_DECIMALS)
}

/// Lenient numeric parse of an input field (trimmed). `None` if not a number.
pub fn parse_decimal(amount: &str) -> Option<Decimal> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Round for display, half away from zero.
pub fn round_display(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Format with exactly `dp` fractional digits (e.g. `6.5` -> `"6.50"`).
pub fn format_fixed(value: Decimal, dp: u32) -> String {
    let mut rounded = round_display(value, dp);
    rounded.rescale(dp);
    rounded.to_string()
}

// ---------------------------------------------------------------------------
// Protocol scales
// ---------------------------------------------------------------------------

/// WAD (1e18): balances, ETH amounts, health factors.
pub fn wad_to_decimal(wad: U256) -> Decimal {
    units_to_decimal(wad, WAD_DECIMALS)
}

/// Liquidity rate (RAY, 1e27) to APY percent: `raw / 1e25`, two decimals.
pub fn ray_to_apy_percent(ray: U256) -> Decimal {
    round_display(units_to_decimal(ray, RAY_TO_PERCENT_DIVISOR_EXP), 2)
}

/// Convert Aave base-currency (8-decimal USD) U256 to `Decimal`.
pub fn base_currency_to_decimal(raw: U256) -> Decimal {
    units_to_decimal(raw, BASE_CURRENCY_DECIMALS)
}

/// Convert basis points (u256) to a fraction `Decimal`.
pub fn bps_to_decimal(bps: U256) -> Decimal {
    units_to_decimal(bps, 4)
}
