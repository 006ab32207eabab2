use anyhow::{bail, Result};

use crate::constants::{SEPOLIA_CHAIN_ID, USDC_DECIMALS, WAD_DECIMALS};

use super::types::AegisConfig;

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// Every problem is collected so a broken config reports all of its errors at
/// once. Called automatically by [`super::load_config`].
pub fn validate_config(config: &AegisConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_chain_config(config, &mut errors);
    validate_timing_config(config, &mut errors);
    validate_advisory_config(config, &mut errors);
    validate_oracle_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Chain config
// ---------------------------------------------------------------------------

fn validate_chain_config(config: &AegisConfig, errors: &mut Vec<String>) {
    let chain = &config.chain;

    if chain.chain_id != SEPOLIA_CHAIN_ID {
        errors.push(format!(
            "chain.chain_id: expected {SEPOLIA_CHAIN_ID}, got {}",
            chain.chain_id
        ));
    }
    if chain.rpc.http_url.is_empty() {
        errors.push("chain.rpc: http_url is empty".into());
    }
    if chain.rpc.ws_url.is_empty() {
        errors.push("chain.rpc: ws_url is empty".into());
    } else if !chain.rpc.ws_url.starts_with("ws://") && !chain.rpc.ws_url.starts_with("wss://") {
        errors.push(format!(
            "chain.rpc: ws_url '{}' must use ws:// or wss://",
            chain.rpc.ws_url
        ));
    }

    let contract_addrs = [
        ("pool_addresses_provider", &chain.contracts.pool_addresses_provider),
        ("pool_fallback", &chain.contracts.pool_fallback),
        ("wrapped_token_gateway", &chain.contracts.wrapped_token_gateway),
    ];
    for (name, addr) in &contract_addrs {
        if let Err(e) = validate_address(addr) {
            errors.push(format!("chain.contracts.{name}: {e}"));
        }
    }

    let tokens = [
        ("usdc", &chain.tokens.usdc, USDC_DECIMALS),
        ("a_weth", &chain.tokens.a_weth, WAD_DECIMALS),
    ];
    for (name, token, expected_decimals) in tokens {
        if let Err(e) = validate_address(&token.address) {
            errors.push(format!("chain.tokens.{name}.address: {e}"));
        }
        if u32::from(token.decimals) != expected_decimals {
            errors.push(format!(
                "chain.tokens.{name}.decimals: expected {expected_decimals}, got {}",
                token.decimals
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Timing config
// ---------------------------------------------------------------------------

fn validate_timing_config(config: &AegisConfig, errors: &mut Vec<String>) {
    let polling = &config.timing.polling;
    let intervals = [
        ("account_data_interval_ms", polling.account_data_interval_ms),
        ("balance_interval_ms", polling.balance_interval_ms),
        ("allowance_interval_ms", polling.allowance_interval_ms),
    ];
    for (name, value) in intervals {
        if value == 0 {
            errors.push(format!("timing.polling.{name} must be > 0"));
        }
    }
}

// ---------------------------------------------------------------------------
// Advisory config
// ---------------------------------------------------------------------------

fn validate_advisory_config(config: &AegisConfig, errors: &mut Vec<String>) {
    let advisory = &config.advisory;

    if advisory.model.trim().is_empty() {
        errors.push("advisory.model is empty".into());
    }
    if !advisory.endpoint.starts_with("http") {
        errors.push(format!(
            "advisory.endpoint '{}' must be an http(s) URL",
            advisory.endpoint
        ));
    }
    if advisory.api_key_env.trim().is_empty() {
        errors.push("advisory.api_key_env is empty".into());
    }
    if advisory.request_timeout_ms == 0 {
        errors.push("advisory.request_timeout_ms must be > 0".into());
    }
}

// ---------------------------------------------------------------------------
// Oracle config
// ---------------------------------------------------------------------------

fn validate_oracle_config(config: &AegisConfig, errors: &mut Vec<String>) {
    let oracle = &config.oracle;
    if oracle.enabled && !oracle.price_url.starts_with("http") {
        errors.push(format!(
            "oracle.price_url '{}' must be an http(s) URL",
            oracle.price_url
        ));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate an EVM address string: `0x` prefix, 40 hex characters.
fn validate_address(addr: &str) -> Result<(), String> {
    if addr.is_empty() {
        return Err("address is empty".into());
    }
    let Some(hex_part) = addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")) else {
        return Err(format!("address '{addr}' must start with 0x"));
    };
    if addr.len() != 42 {
        return Err(format!(
            "address '{addr}' has length {} (expected 42)",
            addr.len()
        ));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{addr}' contains non-hex characters"));
    }
    Ok(())
}
