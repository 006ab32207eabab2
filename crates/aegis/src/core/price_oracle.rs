//! One-shot ETH/USD price read for the balance's USD display.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::OracleConfig;
use crate::core::activity_log::ActivityLog;
use crate::errors::AegisError;
use crate::types::wad_ray::parse_decimal;

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    ethereum: CoinPrice,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    usd: serde_json::Number,
}

/// Parse a `simple/price?ids=ethereum&vs_currencies=usd` body.
pub fn parse_eth_usd(body: &str) -> Result<Decimal, AegisError> {
    let response: SimplePriceResponse = serde_json::from_str(body)?;
    let raw = response.ethereum.usd.to_string();
    parse_decimal(&raw)
        .filter(|price| *price > Decimal::ZERO)
        .ok_or_else(|| AegisError::read("ETH price", format!("unusable price {raw}")))
}

pub struct PriceOracle {
    client: Client,
    url: String,
    enabled: bool,
}

impl PriceOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self, AegisError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AegisError::Config(format!("oracle HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.price_url.clone(),
            enabled: config.enabled,
        })
    }

    pub async fn fetch_eth_usd(&self) -> Result<Decimal, AegisError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AegisError::read("ETH price", format!("HTTP {status}")));
        }
        parse_eth_usd(&response.text().await?)
    }

    /// Fetch once and publish. Failure leaves the price unknown.
    pub async fn sync(&self, price_tx: &watch::Sender<Option<Decimal>>, log: &ActivityLog) {
        if !self.enabled {
            info!("price oracle disabled");
            return;
        }
        match self.fetch_eth_usd().await {
            Ok(price) => {
                price_tx.send_replace(Some(price));
                log.push(format!("Oracle Connected: ETH = ${price}"));
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "price oracle read failed");
                log.push("Oracle Connection Failed.");
            }
        }
    }
}
