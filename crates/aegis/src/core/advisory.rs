//! Advisory client: one line of tactical advice per market change.
//!
//! A critical health factor short-circuits to a fixed alert without calling
//! the model. Every other outcome is a single `generate` call; any failure
//! degrades to the cached-strategy line. Callers never see an error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{env_string, AdvisoryConfig};
use crate::constants::ADVISORY_FALLBACK;
use crate::errors::AegisError;
use crate::types::{AccountSnapshot, HealthDisplay, YieldReading};

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// Prompt in, one line of text out.
pub trait TextGenerator: Send + Sync + 'static {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, AegisError>> + Send;
}

// ---------------------------------------------------------------------------
// Gemini REST backend
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// First candidate's first text part, trimmed. Empty text is an error.
    fn into_text(self) -> Result<String, AegisError> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AegisError::Advisory {
                reason: "model returned no text".into(),
            });
        }
        Ok(text)
    }
}

/// [`TextGenerator`] over the Generative Language `generateContent` call.
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key_env: String,
}

impl GeminiGenerator {
    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, AegisError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .build()
            .map_err(|e| AegisError::Config(format!("advisory HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AegisError> {
        // Read per call so a key added to the environment later is picked up.
        let api_key = env_string(&self.api_key_env).ok_or_else(|| AegisError::Advisory {
            reason: format!("{} is not set", self.api_key_env),
        })?;

        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AegisError::Advisory {
                reason: format!("model endpoint returned {status}: {body}"),
            });
        }

        response.json::<GenerateResponse>().await?.into_text()
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

const NEVER: u64 = u64::MAX;

/// Minimum spacing between yield-triggered calls.
///
/// A call is granted iff no call was granted yet or `now - last > interval`.
/// The stamp moves on every grant, whether or not the call then succeeds.
#[derive(Debug)]
pub struct AdvisoryThrottle {
    last_ms: AtomicU64,
    interval_ms: u64,
}

impl AdvisoryThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_ms: AtomicU64::new(NEVER),
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn try_acquire(&self, now_ms: u64) -> bool {
        let mut last = self.last_ms.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_ms.saturating_sub(last) <= self.interval_ms {
                return false;
            }
            match self.last_ms.compare_exchange_weak(
                last,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Wall clock in epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ---------------------------------------------------------------------------
// AdvisoryClient
// ---------------------------------------------------------------------------

pub fn critical_alert(health: HealthDisplay) -> String {
    format!(
        "CRITICAL ALERT: Health Factor {health} is DANGEROUSLY LOW. \
         Liquidation risk detected. IMMEDIATE ACTION: Repay debt or supply collateral."
    )
}

pub fn build_prompt(yield_reading: YieldReading, health: HealthDisplay, scenario: Option<&str>) -> String {
    let mut prompt = format!(
        "You are Aegis, an AI DeFi Sentinel monitoring Aave V3 on Sepolia.\n\
         \n\
         Current Market Data:\n\
         - APY: {yield_reading}%\n\
         - User Health Factor: {health} (Note: > 2.0 is Safe, < 1.1 is Critical)\n"
    );
    if let Some(scenario) = scenario.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("- Operator Scenario: {scenario}\n"));
    }
    prompt.push_str(
        "\nOutput a single, robotic, tactical line of advice (max 15 words).\n\
         If APY is high (>5%), recommend accumulation.\n\
         If APY is low, recommend monitoring.\n\
         Style: Cyberpunk, military-grade financial terminal.\n\
         Do not mention \"I am an AI\".\n",
    );
    prompt
}

pub struct AdvisoryClient<G: TextGenerator> {
    generator: Arc<G>,
    throttle: AdvisoryThrottle,
}

impl<G: TextGenerator> AdvisoryClient<G> {
    pub fn new(generator: Arc<G>, min_interval: Duration) -> Self {
        Self {
            generator,
            throttle: AdvisoryThrottle::new(min_interval),
        }
    }

    /// Advice for the given market state. Never fails.
    pub async fn advise(
        &self,
        yield_reading: YieldReading,
        health: HealthDisplay,
        scenario: Option<&str>,
    ) -> String {
        if health.is_critical() {
            warn!(health_factor = %health, "critical health factor, advisory override");
            return critical_alert(health);
        }

        let prompt = build_prompt(yield_reading, health, scenario);
        match self.generator.generate(&prompt).await {
            Ok(advice) => {
                debug!(advice = %advice, "advisory generated");
                advice
            }
            Err(e) => {
                warn!(error = %e, "advisory unavailable, using fallback");
                ADVISORY_FALLBACK.to_string()
            }
        }
    }

    /// Operator-initiated advice. Not throttled.
    pub async fn advise_scenario(
        &self,
        yield_reading: YieldReading,
        health_rx: &watch::Receiver<AccountSnapshot>,
        scenario: &str,
    ) -> String {
        let health = HealthDisplay::from_raw(health_rx.borrow().health_factor);
        info!(scenario = %scenario, "scenario advisory requested");
        self.advise(yield_reading, health, Some(scenario)).await
    }

    /// Yield-triggered advice. `None` when the throttle refuses the call.
    /// Health is read at call time, not when the trigger fired.
    pub async fn advise_periodic(
        &self,
        now_ms: u64,
        yield_reading: YieldReading,
        health_rx: &watch::Receiver<AccountSnapshot>,
    ) -> Option<String> {
        if !self.throttle.try_acquire(now_ms) {
            debug!("advisory throttled");
            return None;
        }
        let health = HealthDisplay::from_raw(health_rx.borrow().health_factor);
        Some(self.advise(yield_reading, health, None).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockGenerator {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        reply: Mutex<Option<Result<String, String>>>,
    }

    impl MockGenerator {
        fn replying(reply: Result<&str, &str>) -> Arc<Self> {
            let generator = Self::default();
            *generator.reply.lock().unwrap() =
                Some(reply.map(str::to_string).map_err(str::to_string));
            Arc::new(generator)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextGenerator for MockGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, AegisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply.lock().unwrap().clone() {
                Some(Ok(text)) => Ok(text),
                Some(Err(reason)) => Err(AegisError::Advisory { reason }),
                None => Ok("HOLD POSITION.".into()),
            }
        }
    }

    fn client(generator: Arc<MockGenerator>) -> AdvisoryClient<MockGenerator> {
        AdvisoryClient::new(generator, Duration::from_secs(60))
    }

    fn wad(units_times_100: u64) -> U256 {
        U256::from(units_times_100) * U256::from(10_000_000_000_000_000u64)
    }

    fn health_channel(raw: U256) -> (watch::Sender<AccountSnapshot>, watch::Receiver<AccountSnapshot>) {
        watch::channel(AccountSnapshot {
            health_factor: raw,
            ..AccountSnapshot::default()
        })
    }

    #[tokio::test]
    async fn test_scenario_a_high_yield_safe_health_calls_model() {
        let generator = MockGenerator::replying(Ok("ACCUMULATE. YIELD WINDOW OPEN."));
        let advisory = client(generator.clone());

        let advice = advisory
            .advise(YieldReading::Rate(dec!(6.5)), HealthDisplay::Safe, None)
            .await;

        assert_eq!(advice, "ACCUMULATE. YIELD WINDOW OPEN.");
        assert_eq!(generator.calls(), 1);
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("- APY: 6.50%"));
        assert!(prompt.contains("- User Health Factor: SAFE"));
        assert!(!prompt.contains("Operator Scenario"));
    }

    #[tokio::test]
    async fn test_scenario_b_critical_health_skips_model() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());

        let advice = advisory
            .advise(YieldReading::Rate(dec!(6.5)), HealthDisplay::from_raw(wad(120)), None)
            .await;

        assert_eq!(
            advice,
            "CRITICAL ALERT: Health Factor 1.20 is DANGEROUSLY LOW. Liquidation risk detected. \
             IMMEDIATE ACTION: Repay debt or supply collateral."
        );
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_health_is_not_critical() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());
        advisory
            .advise(YieldReading::Rate(dec!(1)), HealthDisplay::Unknown, None)
            .await;
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let generator = MockGenerator::replying(Err("503 overloaded"));
        let advisory = client(generator);
        let advice = advisory
            .advise(YieldReading::Rate(dec!(3)), HealthDisplay::Safe, None)
            .await;
        assert_eq!(advice, ADVISORY_FALLBACK);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_api_key_falls_back() {
        std::env::remove_var("AEGIS_TEST_MISSING_KEY");
        let generator = Arc::new(
            GeminiGenerator::from_config(&AdvisoryConfig {
                model: "gemini-2.5-flash".into(),
                endpoint: "http://127.0.0.1:9".into(),
                api_key_env: "AEGIS_TEST_MISSING_KEY".into(),
                request_timeout_ms: 500,
                min_interval_seconds: 60,
            })
            .unwrap(),
        );
        let err = generator.generate("ping").await.unwrap_err();
        assert!(err.to_string().contains("AEGIS_TEST_MISSING_KEY is not set"));

        let advisory = AdvisoryClient::new(generator, Duration::from_secs(60));
        let advice = advisory
            .advise(YieldReading::Rate(dec!(3)), HealthDisplay::Safe, None)
            .await;
        assert_eq!(advice, ADVISORY_FALLBACK);
    }

    #[tokio::test]
    async fn test_scenario_included_in_prompt_and_not_throttled() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());
        let (_tx, rx) = health_channel(U256::MAX);

        advisory
            .advise_periodic(1_000_000, YieldReading::Rate(dec!(2)), &rx)
            .await
            .unwrap();
        advisory
            .advise_scenario(YieldReading::Rate(dec!(2)), &rx, "ETH drops 20%")
            .await;

        assert_eq!(generator.calls(), 2);
        assert!(generator.prompts.lock().unwrap()[1].contains("- Operator Scenario: ETH drops 20%"));
    }

    #[tokio::test]
    async fn test_periodic_reads_health_at_call_time() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());
        let (tx, rx) = health_channel(U256::MAX);

        tx.send_replace(AccountSnapshot {
            health_factor: wad(110),
            ..AccountSnapshot::default()
        });
        let advice = advisory
            .advise_periodic(1_000_000, YieldReading::Rate(dec!(2)), &rx)
            .await
            .unwrap();

        assert!(advice.starts_with("CRITICAL ALERT: Health Factor 1.10"));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_periodic_events_ten_seconds_apart_call_once() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());
        let (_tx, rx) = health_channel(U256::MAX);
        let start = 1_700_000_000_000u64;

        assert!(advisory
            .advise_periodic(start, YieldReading::Rate(dec!(4)), &rx)
            .await
            .is_some());
        assert!(advisory
            .advise_periodic(start + 10_000, YieldReading::Rate(dec!(4.1)), &rx)
            .await
            .is_none());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_periodic_events_sixty_one_seconds_apart_call_twice() {
        let generator = Arc::new(MockGenerator::default());
        let advisory = client(generator.clone());
        let (_tx, rx) = health_channel(U256::MAX);
        let start = 1_700_000_000_000u64;

        advisory
            .advise_periodic(start, YieldReading::Rate(dec!(4)), &rx)
            .await;
        advisory
            .advise_periodic(start + 61_000, YieldReading::Rate(dec!(4.1)), &rx)
            .await;
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn test_throttle_boundary_and_failed_attempts() {
        let throttle = AdvisoryThrottle::new(Duration::from_secs(60));
        assert!(throttle.try_acquire(100_000));
        // Exactly the interval is not enough.
        assert!(!throttle.try_acquire(160_000));
        assert!(throttle.try_acquire(160_001));
        // Clock going backwards never grants.
        assert!(!throttle.try_acquire(50_000));
    }

    #[test]
    fn test_response_text_extraction() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "  MONITOR. LOW YIELD REGIME.\n"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 42}
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "MONITOR. LOW YIELD REGIME.");
    }

    #[test]
    fn test_blocked_response_is_error() {
        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_text().is_err());

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_text().is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: "hello" }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_url() {
        let generator = GeminiGenerator::from_config(&AdvisoryConfig {
            model: "gemini-2.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            request_timeout_ms: 10_000,
            min_interval_seconds: 60,
        })
        .unwrap();
        assert_eq!(
            generator.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
