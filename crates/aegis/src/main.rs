use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aegis::config::{self, env_string};
use aegis::core::account_aggregator::AccountAggregator;
use aegis::core::activity_log::ActivityLog;
use aegis::core::address_resolver::PoolAddressResolver;
use aegis::core::advisory::{AdvisoryClient, GeminiGenerator};
use aegis::core::console::NoSpeechInput;
use aegis::core::orchestrator::TxOrchestrator;
use aegis::core::price_oracle::PriceOracle;
use aegis::core::rate_listener::{AlloyReserveFeed, RateListener};
use aegis::core::session::{DashboardEvent, Session, SessionFeeds};
use aegis::execution::aave_client::AaveClient;
use aegis::execution::tx_submitter::WalletSubmitter;
use aegis::logging;
use aegis::types::YieldReading;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("AEGIS_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        chain_id = config.chain.chain_id,
        chain_name = %config.chain.chain_name,
        app = %config.app.app_name,
        "Aegis Yield starting"
    );

    let addresses = config.chain.addresses()?;

    // -----------------------------------------------------------------------
    // Wallet
    // -----------------------------------------------------------------------

    let (signer, user) = init_wallet()?;
    match (&signer, user) {
        (Some(signer), _) => info!(user = %signer.address(), "signer wallet connected"),
        (None, Some(user)) => info!(%user, "watch-only wallet, writes disabled"),
        (None, None) => warn!("no wallet configured, account reads and writes disabled"),
    }

    // -----------------------------------------------------------------------
    // Blockchain providers
    // -----------------------------------------------------------------------

    let rpc_url: Url = config
        .chain
        .rpc
        .http_url
        .parse()
        .context("failed to parse RPC URL")?;
    let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
    let reader = Arc::new(AaveClient::new(provider));

    let sender = signer
        .map(|signer| WalletSubmitter::new(&config.chain.rpc.http_url, signer))
        .transpose()
        .context("failed to build wallet submitter")?
        .map(Arc::new);

    info!("blockchain providers initialized");

    // -----------------------------------------------------------------------
    // Component construction
    // -----------------------------------------------------------------------

    let shutdown = CancellationToken::new();
    let log = Arc::new(ActivityLog::new());
    let (_user_tx, user_rx) = watch::channel(user);

    // 1. Pool address (fallback until the registry answers)
    let resolver = Arc::new(PoolAddressResolver::new(
        reader.clone(),
        addresses.pool_addresses_provider,
        addresses.pool_fallback,
    ));

    // 2. Account reads
    let aggregator = Arc::new(AccountAggregator::new(
        reader.clone(),
        addresses,
        resolver.subscribe(),
        user_rx.clone(),
        &config.timing.polling,
    ));

    // 3. Writes
    let orchestrator = Arc::new(TxOrchestrator::new(
        sender,
        addresses,
        resolver.subscribe(),
        user_rx.clone(),
        aggregator.subscribe_allowance(),
        aggregator.refresh_handle(),
        log.clone(),
    ));

    // 4. Advisory
    let generator = Arc::new(
        GeminiGenerator::from_config(&config.advisory).context("failed to build advisory client")?,
    );
    let advisory = Arc::new(AdvisoryClient::new(
        generator,
        Duration::from_secs(config.advisory.min_interval_seconds),
    ));

    // 5. Price oracle
    let oracle = PriceOracle::from_config(&config.oracle).context("failed to build price oracle")?;
    let (price_tx, price_rx) = watch::channel(None);

    let (yield_tx, yield_rx) = watch::channel(YieldReading::default());

    info!("all components initialized");

    // -----------------------------------------------------------------------
    // Launch concurrent tasks
    // -----------------------------------------------------------------------

    let resolver_handle = tokio::spawn(resolver.clone().run(
        Duration::from_secs(config.timing.registry.refresh_interval_seconds),
        shutdown.clone(),
    ));

    let aggregator_handle = tokio::spawn(aggregator.clone().run(shutdown.clone()));

    let listener_handle = {
        let ws_url = config.chain.rpc.ws_url.clone();
        let registry = addresses.pool_addresses_provider;
        let usdc = addresses.usdc;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match AlloyReserveFeed::connect(&ws_url, registry).await {
                Ok(feed) => {
                    RateListener::spawn(Arc::new(feed), usdc, yield_tx, &shutdown)
                        .join()
                        .await
                }
                Err(e) => {
                    error!(error = %e, "reserve feed connection failed");
                    yield_tx.send_replace(YieldReading::Unavailable);
                }
            }
        })
    };

    {
        let log = log.clone();
        tokio::spawn(async move { oracle.sync(&price_tx, &log).await });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let printer_handle = tokio::spawn(print_events(events_rx));

    let (commands_tx, commands_rx) = mpsc::channel(32);
    spawn_stdin_reader(commands_tx);

    let session = Session::new(
        orchestrator,
        advisory,
        NoSpeechInput,
        log,
        SessionFeeds {
            yield_rx,
            account_rx: aggregator.subscribe_account(),
            balance_rx: aggregator.subscribe_balance(),
            allowance_rx: aggregator.subscribe_allowance(),
            price_rx,
            pool_rx: resolver.subscribe(),
            user_rx,
        },
        aggregator.refresh_handle(),
        events_tx,
    );
    let session_handle = tokio::spawn(session.run(commands_rx, shutdown.clone()));

    info!("all tasks running, type `help` for commands or press Ctrl+C to exit");

    // -----------------------------------------------------------------------
    // Wait for shutdown signal
    // -----------------------------------------------------------------------

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            info!("shutdown signal received, stopping gracefully...");
        }
        () = shutdown.cancelled() => info!("session ended, stopping gracefully..."),
    }
    shutdown.cancel();

    let (resolver_res, aggregator_res, listener_res, session_res) = tokio::join!(
        resolver_handle,
        aggregator_handle,
        listener_handle,
        session_handle
    );
    for (name, res) in [
        ("pool resolver", resolver_res),
        ("account aggregator", aggregator_res),
        ("rate listener", listener_res),
        ("session", session_res),
    ] {
        if let Err(e) = res {
            error!(error = %e, task = name, "task panicked");
        }
    }

    // The session owned the last event sender; the printer drains and exits.
    let _ = printer_handle.await;

    info!("shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Initialization helpers
// ---------------------------------------------------------------------------

/// Wallet from the environment.
///
/// `WALLET_PRIVATE_KEY` connects a signer (the user is its address).
/// Otherwise `USER_WALLET_ADDRESS` connects a watch-only user. With neither,
/// no user is connected.
fn init_wallet() -> Result<(Option<PrivateKeySigner>, Option<Address>)> {
    if let Some(key) = env_string("WALLET_PRIVATE_KEY") {
        let key = key.strip_prefix("0x").unwrap_or(&key);
        let signer = key
            .parse::<PrivateKeySigner>()
            .context("failed to parse WALLET_PRIVATE_KEY")?;
        let user = signer.address();
        return Ok((Some(signer), Some(user)));
    }

    let user = env_string("USER_WALLET_ADDRESS")
        .map(|addr| {
            addr.parse::<Address>()
                .context("failed to parse USER_WALLET_ADDRESS")
        })
        .transpose()?;
    Ok((None, user))
}

/// Forward stdin lines to the session.
///
/// Runs on a plain thread: a blocking read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader(commands: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if commands.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

async fn print_events(mut events: mpsc::UnboundedReceiver<DashboardEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        let text = match event {
            DashboardEvent::Snapshot(render) => render,
            DashboardEvent::Advice(advice) => format!(">> {advice}\n"),
            DashboardEvent::Notice(notice) => format!("{notice}\n"),
            DashboardEvent::Error(message) => format!("!! {message}\n"),
        };
        if stdout.write_all(text.as_bytes()).await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
    }
}
