pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Load and merge all config JSON files into a single [`AegisConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   chains/11155111.json
///   timing.json
///   advisory.json
///   oracle.json
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                        | Config Field                       |
/// |--------------------------------|------------------------------------|
/// | `AEGIS_RPC_URL_HTTP`           | `chain.rpc.http_url`               |
/// | `AEGIS_RPC_URL_WS`             | `chain.rpc.ws_url`                 |
/// | `NEXT_PUBLIC_ALCHEMY_WSS_URL`  | `chain.rpc.ws_url` (+ derived http) |
/// | `AEGIS_POOL_FALLBACK`          | `chain.contracts.pool_fallback`    |
/// | `AEGIS_ADVISORY_MODEL`         | `advisory.model`                   |
pub fn load_config(config_dir: &Path) -> Result<AegisConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let chain: ChainConfig = serde_json::from_str(&read("chains/11155111.json")?)
        .context("parsing chains/11155111.json")?;

    let timing: TimingConfig =
        serde_json::from_str(&read("timing.json")?).context("parsing timing.json")?;

    let advisory: AdvisoryConfig =
        serde_json::from_str(&read("advisory.json")?).context("parsing advisory.json")?;

    let oracle: OracleConfig =
        serde_json::from_str(&read("oracle.json")?).context("parsing oracle.json")?;

    let mut config = AegisConfig {
        app,
        chain,
        timing,
        advisory,
        oracle,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// HTTP form of a websocket endpoint, by scheme: `wss` -> `https`,
/// `ws` -> `http`. Other URLs are returned unchanged.
fn http_from_ws(ws: &str) -> String {
    if let Some(rest) = ws.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = ws.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        ws.to_string()
    }
}

/// Only non-empty env vars take effect.
fn apply_env_overrides(config: &mut AegisConfig) {
    // -- RPC URLs ------------------------------------------------------------
    // The hosted-node WSS URL doubles as the HTTP endpoint (wss -> https) when
    // no dedicated HTTP URL is given.
    let explicit_http = env_string("AEGIS_RPC_URL_HTTP");
    let explicit_ws = env_string("AEGIS_RPC_URL_WS");
    let alchemy_ws = env_string("NEXT_PUBLIC_ALCHEMY_WSS_URL");

    if let Some(val) = explicit_ws.or_else(|| alchemy_ws.clone()) {
        info!("env override: rpc ws url");
        config.chain.rpc.ws_url = val;
    }

    if let Some(val) = explicit_http {
        info!("env override: AEGIS_RPC_URL_HTTP");
        config.chain.rpc.http_url = val;
    } else if let Some(ws) = alchemy_ws {
        info!("env override: http url derived from NEXT_PUBLIC_ALCHEMY_WSS_URL");
        config.chain.rpc.http_url = http_from_ws(&ws);
    }

    // -- Contracts -----------------------------------------------------------
    if let Some(val) = env_string("AEGIS_POOL_FALLBACK") {
        info!("env override: AEGIS_POOL_FALLBACK");
        config.chain.contracts.pool_fallback = val;
    }

    // -- Advisory ------------------------------------------------------------
    if let Some(val) = env_string("AEGIS_ADVISORY_MODEL") {
        info!(model = %val, "env override: AEGIS_ADVISORY_MODEL");
        config.advisory.model = val;
    }
}

/// Read a non-empty env var as a `String`.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
