use alloy::primitives::{address, uint, Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Numeric Constants
// ---------------------------------------------------------------------------

/// WAD: 1e18, for ETH amounts, aToken balances, health factors.
pub const WAD_DECIMALS: u32 = 18;

/// USDC native scale.
pub const USDC_DECIMALS: u32 = 6;

/// Aave base currency unit: USD at 8 decimals.
pub const BASE_CURRENCY_DECIMALS: u32 = 8;

/// Liquidity rate is RAY (1e27); dividing by 1e25 yields a percentage.
pub const RAY_TO_PERCENT_DIVISOR_EXP: u32 = 25;

/// Raw (WAD) health factor above 100: the protocol's "no debt" value.
pub const HEALTH_FACTOR_SAFE_CEILING_RAW: U256 = uint!(100_000_000_000_000_000_000_U256);

/// Health factor below which the position is treated as critical.
pub const CRITICAL_HEALTH_FACTOR: Decimal = dec!(1.5);

/// Aave interest rate mode for variable-rate debt.
pub const VARIABLE_RATE_MODE: u64 = 2;

/// Referral code sent with every deposit / borrow.
pub const REFERRAL_CODE: u16 = 0;

// ---------------------------------------------------------------------------
// Display sentinels
// ---------------------------------------------------------------------------

pub const HEALTH_SAFE_LABEL: &str = "SAFE";
pub const HEALTH_UNKNOWN_LABEL: &str = "---";
pub const YIELD_ERROR_LABEL: &str = "ERR";
pub const YIELD_INITIAL_LABEL: &str = "0.00";

// ---------------------------------------------------------------------------
// Advisory texts
// ---------------------------------------------------------------------------

pub const ADVISORY_FALLBACK: &str = "Neural Link Offline. Cached Strategy Active.";
pub const ADVICE_INITIAL: &str = "System Initialized. Select Strategy.";
pub const ADVICE_AFTER_CONFIRM: &str = "Execution Verified. State Updated.";

// ---------------------------------------------------------------------------
// Aave V3 Sepolia Addresses
// ---------------------------------------------------------------------------

pub const AAVE_V3_POOL_ADDRESSES_PROVIDER: Address =
    address!("012bac54348c0e635dcac9d5fb99f06f24136c9a");
pub const AAVE_V3_POOL_FALLBACK: Address = address!("6ae43d534944d6df31b761937f20c10b59af4933");
pub const WRAPPED_TOKEN_GATEWAY: Address = address!("387d311e47e80b498169e6905052996d13939e35");

// ---------------------------------------------------------------------------
// Sepolia Token Addresses
// ---------------------------------------------------------------------------

pub const TOKEN_USDC: Address = address!("94a9d9ac8a22534e3faca9f4e7f2e2cf85d5e4c8");
pub const TOKEN_A_WETH: Address = address!("5b071b590a59395fe4025a0ccc1fcc931aac1830");

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Activity log capacity (newest first).
pub const ACTIVITY_LOG_CAPACITY: usize = 50;

/// Number of monthly steps in the yield projection (M0..=M12).
pub const PROJECTION_MONTHS: u32 = 12;
