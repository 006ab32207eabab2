use alloy::primitives::Address;
use serde::Deserialize;

use crate::errors::AegisError;

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AegisConfig {
    pub app: AppConfig,
    pub chain: ChainConfig,
    pub timing: TimingConfig,
    pub advisory: AdvisoryConfig,
    pub oracle: OracleConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    #[serde(default = "default_filter")]
    pub default_filter: String,
    /// Mirror the log to stderr in addition to the JSON file.
    #[serde(default)]
    pub stderr: bool,
}

fn default_log_file() -> String {
    "aegis.log".into()
}

fn default_filter() -> String {
    "aegis=info,warn".into()
}

// ---------------------------------------------------------------------------
// chains/11155111.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc: RpcConfig,
    pub contracts: ContractsConfig,
    pub tokens: TokensConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub pool_addresses_provider: String,
    /// Pool proxy used until the registry lookup resolves.
    pub pool_fallback: String,
    pub wrapped_token_gateway: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokensConfig {
    /// Borrow / repay asset.
    pub usdc: TokenConfig,
    /// Interest-bearing token received for supplied ETH.
    pub a_weth: TokenConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub decimals: u8,
}

// ---------------------------------------------------------------------------
// timing.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    pub polling: PollingTiming,
    pub registry: RegistryTiming,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingTiming {
    pub account_data_interval_ms: u64,
    pub balance_interval_ms: u64,
    pub allowance_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryTiming {
    /// Re-resolve the pool on this cadence; `0` resolves once per session.
    pub refresh_interval_seconds: u64,
}

// ---------------------------------------------------------------------------
// advisory.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisoryConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    pub request_timeout_ms: u64,
    /// Minimum spacing between yield-triggered advisory calls.
    pub min_interval_seconds: u64,
}

// ---------------------------------------------------------------------------
// oracle.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub enabled: bool,
    pub price_url: String,
    pub timeout_ms: u64,
}

// ---------------------------------------------------------------------------
// Parsed addresses
// ---------------------------------------------------------------------------

/// Contract and token addresses parsed once from [`ChainConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainAddresses {
    pub pool_addresses_provider: Address,
    pub pool_fallback: Address,
    pub wrapped_token_gateway: Address,
    pub usdc: Address,
    pub a_weth: Address,
}

impl ChainConfig {
    /// Parse every configured address. Validation already rejected bad input,
    /// so an error here means the config was built without `load_config`.
    pub fn addresses(&self) -> Result<ChainAddresses, AegisError> {
        let parse = |name: &str, raw: &str| -> Result<Address, AegisError> {
            raw.parse::<Address>()
                .map_err(|e| AegisError::Config(format!("{name}: {e}")))
        };
        Ok(ChainAddresses {
            pool_addresses_provider: parse(
                "pool_addresses_provider",
                &self.contracts.pool_addresses_provider,
            )?,
            pool_fallback: parse("pool_fallback", &self.contracts.pool_fallback)?,
            wrapped_token_gateway: parse(
                "wrapped_token_gateway",
                &self.contracts.wrapped_token_gateway,
            )?,
            usdc: parse("tokens.usdc", &self.tokens.usdc.address)?,
            a_weth: parse("tokens.a_weth", &self.tokens.a_weth.address)?,
        })
    }
}
