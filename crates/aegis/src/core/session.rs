//! Interactive dashboard session.
//!
//! One loop owns the console: it parses operator lines, forwards form edits
//! to the orchestrator, and reacts to yield changes with throttled advice.
//! Writes and advisory calls run as tracked tasks so the prompt stays live
//! while a receipt is pending. Output leaves as [`DashboardEvent`]s.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::constants::{ADVICE_AFTER_CONFIRM, ADVICE_INITIAL, YIELD_ERROR_LABEL};
use crate::core::account_aggregator::{
    allowance_display, balance_display, balance_eth, balance_usd_value, RefreshHandle,
};
use crate::core::activity_log::{ActivityLog, LogLine};
use crate::core::advisory::{now_millis, AdvisoryClient, TextGenerator};
use crate::core::console::{parse_command, resolve_action, Command, SpeechInput, HELP};
use crate::core::orchestrator::{primary_label, secondary_label, TxOrchestrator};
use crate::core::projection::{project, projected_growth};
use crate::execution::tx_submitter::TxSender;
use crate::types::wad_ray::format_fixed;
use crate::types::{
    AccountSnapshot, AccountView, Action, FormState, HealthTone, TxStatus, YieldReading,
};

/// Log lines shown under the dashboard.
const LOG_TAIL: usize = 8;

/// Output of the session, printed by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Full dashboard render.
    Snapshot(String),
    /// New advice line.
    Advice(String),
    Notice(String),
    Error(String),
}

/// Read side of every snapshot the dashboard shows.
#[derive(Clone)]
pub struct SessionFeeds {
    pub yield_rx: watch::Receiver<YieldReading>,
    pub account_rx: watch::Receiver<AccountSnapshot>,
    pub balance_rx: watch::Receiver<Option<U256>>,
    pub allowance_rx: watch::Receiver<Option<U256>>,
    pub price_rx: watch::Receiver<Option<Decimal>>,
    pub pool_rx: watch::Receiver<Address>,
    pub user_rx: watch::Receiver<Option<Address>>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Everything one render needs, captured at a single instant.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub yield_reading: YieldReading,
    pub account: AccountView,
    pub balance: Option<U256>,
    pub eth_price: Option<Decimal>,
    pub allowance: Option<U256>,
    pub form: FormState,
    pub status: TxStatus,
    pub advice: String,
    pub log: Vec<LogLine>,
    pub pool: Address,
    pub user: Option<Address>,
    pub read_only: bool,
}

fn tone_label(tone: HealthTone) -> &'static str {
    match tone {
        HealthTone::Safe => "safe",
        HealthTone::Warning => "warning",
        HealthTone::Critical => "CRITICAL",
    }
}

pub fn render_dashboard(state: &DashboardState) -> String {
    let wallet = match (state.user, state.read_only) {
        (None, _) => "not connected".to_string(),
        (Some(user), true) => format!("{user} (watch only)"),
        (Some(user), false) => user.to_string(),
    };
    let growth = projected_growth(state.yield_reading)
        .map(|g| format!("+{}%/mo", format_fixed(g, 2)))
        .unwrap_or_else(|| YIELD_ERROR_LABEL.to_string());
    let health = state.account.health;
    let projection = project(balance_eth(state.balance), state.yield_reading);
    let projection_line = projection
        .iter()
        .step_by(3)
        .map(|p| format!("{} {}", p.month, format_fixed(p.value, 4)))
        .collect::<Vec<_>>()
        .join(" | ");
    let amount = if state.form.amount.is_empty() {
        "-"
    } else {
        state.form.amount.as_str()
    };

    let mut out = String::new();
    out.push_str("==== AEGIS YIELD :: Aave V3 Sepolia ====\n");
    out.push_str(&format!("wallet      {wallet}\n"));
    out.push_str(&format!("pool        {}\n", state.pool));
    out.push_str(&format!(
        "yield       {}% APY   projected {growth}\n",
        state.yield_reading
    ));
    out.push_str(&format!("health      {health} [{}]\n", tone_label(health.tone())));
    out.push_str(&format!(
        "collateral  ${}   debt ${}   borrow power ${}\n",
        format_fixed(state.account.collateral_usd, 2),
        format_fixed(state.account.debt_usd, 2),
        format_fixed(state.account.borrow_power_usd, 2),
    ));
    out.push_str(&format!(
        "aWETH       {} ETH (${})\n",
        balance_display(state.balance),
        format_fixed(balance_usd_value(state.balance, state.eth_price), 2),
    ));
    out.push_str(&format!(
        "allowance   {} USDC\n",
        allowance_display(state.allowance)
    ));
    out.push_str(&format!("projection  {projection_line}\n"));
    out.push_str(&format!("mode        {}   amount {amount}\n", state.form.mode));
    out.push_str(&format!(
        "actions     [{}] [{}]{}\n",
        primary_label(state.form.mode),
        secondary_label(state.form.mode, &state.form.amount, state.allowance),
        if state.status.is_busy() { " (busy)" } else { "" },
    ));
    out.push_str(&format!("tx          {}\n", state.status));
    out.push_str(&format!("advice      > {}\n", state.advice));
    out.push_str("---- neural logs ----\n");
    for line in &state.log {
        out.push_str(&format!("  {}  {}\n", line.at.format("%H:%M:%S"), line.message));
    }
    out
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Session<S: TxSender, G: TextGenerator, V: SpeechInput> {
    orchestrator: Arc<TxOrchestrator<S>>,
    advisory: Arc<AdvisoryClient<G>>,
    speech: V,
    log: Arc<ActivityLog>,
    feeds: SessionFeeds,
    refresh: RefreshHandle,
    advice_tx: Arc<watch::Sender<String>>,
    events: mpsc::UnboundedSender<DashboardEvent>,
    tasks: JoinSet<()>,
}

impl<S: TxSender, G: TextGenerator, V: SpeechInput> Session<S, G, V> {
    pub fn new(
        orchestrator: Arc<TxOrchestrator<S>>,
        advisory: Arc<AdvisoryClient<G>>,
        speech: V,
        log: Arc<ActivityLog>,
        feeds: SessionFeeds,
        refresh: RefreshHandle,
        events: mpsc::UnboundedSender<DashboardEvent>,
    ) -> Self {
        let (advice_tx, _) = watch::channel(ADVICE_INITIAL.to_string());
        Self {
            orchestrator,
            advisory,
            speech,
            log,
            feeds,
            refresh,
            advice_tx: Arc::new(advice_tx),
            events,
            tasks: JoinSet::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscribe_advice(&self) -> watch::Receiver<String> {
        self.advice_tx.subscribe()
    }

    pub fn state(&self) -> DashboardState {
        DashboardState {
            yield_reading: *self.feeds.yield_rx.borrow(),
            account: AccountView::derive(&self.feeds.account_rx.borrow()),
            balance: *self.feeds.balance_rx.borrow(),
            eth_price: *self.feeds.price_rx.borrow(),
            allowance: *self.feeds.allowance_rx.borrow(),
            form: self.orchestrator.form(),
            status: self.orchestrator.status(),
            advice: self.advice_tx.borrow().clone(),
            log: self.log.recent(LOG_TAIL),
            pool: *self.feeds.pool_rx.borrow(),
            user: *self.feeds.user_rx.borrow(),
            read_only: self.orchestrator.is_read_only(),
        }
    }

    /// Drive the session until `quit`, closed input, or shutdown.
    pub async fn run(mut self, mut commands: mpsc::Receiver<String>, shutdown: CancellationToken) {
        info!("dashboard session started");
        self.emit(DashboardEvent::Snapshot(render_dashboard(&self.state())));
        let mut yield_open = true;

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                line = commands.recv() => {
                    let Some(line) = line else {
                        info!("console input closed");
                        break;
                    };
                    if self.handle_line(&line).await == Flow::Quit {
                        shutdown.cancel();
                        break;
                    }
                }
                changed = self.feeds.yield_rx.changed(), if yield_open => {
                    if changed.is_err() {
                        debug!("yield feed closed");
                        yield_open = false;
                        continue;
                    }
                    let reading = *self.feeds.yield_rx.borrow_and_update();
                    self.on_yield_change(reading);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "session task failed");
                        self.emit(DashboardEvent::Error(format!("background task failed: {e}")));
                    }
                }
            }
        }

        // In-flight receipts are abandoned; the chain keeps the outcome.
        self.tasks.shutdown().await;
        info!("dashboard session stopped");
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                self.emit(DashboardEvent::Error(e.to_string()));
                return Flow::Continue;
            }
        };
        debug!(?command, "console command");

        match command {
            Command::SetMode(mode) => {
                self.orchestrator.set_mode(mode);
                self.emit(DashboardEvent::Notice(format!("mode: {mode}")));
            }
            Command::SetAmount(amount) => {
                self.orchestrator.set_amount(amount.clone());
                self.emit(DashboardEvent::Notice(format!("amount: {amount}")));
            }
            Command::Execute { action, mode } => {
                match resolve_action(action, mode, self.orchestrator.form().mode) {
                    Ok(action) => self.spawn_submit(action),
                    Err(e) => self.emit(DashboardEvent::Error(e.to_string())),
                }
            }
            Command::Ask(scenario) => self.spawn_scenario(scenario),
            Command::Voice => match self.speech.listen().await {
                Ok(transcript) => {
                    self.emit(DashboardEvent::Notice(format!("heard: {transcript}")));
                    self.spawn_scenario(transcript);
                }
                Err(e) => self.emit(DashboardEvent::Error(e.to_string())),
            },
            Command::Refresh => {
                self.refresh.refresh_all();
                self.emit(DashboardEvent::Notice("refreshing account state".into()));
            }
            Command::Status => {
                self.emit(DashboardEvent::Snapshot(render_dashboard(&self.state())));
            }
            Command::Help => self.emit(DashboardEvent::Notice(HELP.into())),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn on_yield_change(&mut self, reading: YieldReading) {
        debug!(yield_reading = %reading, "yield changed");
        let advisory = self.advisory.clone();
        let account_rx = self.feeds.account_rx.clone();
        let publisher = self.publisher();
        self.tasks.spawn(async move {
            if let Some(advice) = advisory
                .advise_periodic(now_millis(), reading, &account_rx)
                .await
            {
                publisher.advice(advice);
            }
        });
    }

    fn spawn_scenario(&mut self, scenario: String) {
        let advisory = self.advisory.clone();
        let account_rx = self.feeds.account_rx.clone();
        let reading = *self.feeds.yield_rx.borrow();
        let publisher = self.publisher();
        self.tasks.spawn(async move {
            let advice = advisory
                .advise_scenario(reading, &account_rx, &scenario)
                .await;
            publisher.advice(advice);
        });
    }

    fn spawn_submit(&mut self, action: Action) {
        let orchestrator = self.orchestrator.clone();
        let publisher = self.publisher();
        self.tasks.spawn(async move {
            match orchestrator.submit(action).await {
                Ok(tx_hash) => {
                    publisher.advice_tx.send_replace(ADVICE_AFTER_CONFIRM.to_string());
                    publisher.emit(DashboardEvent::Notice(format!("confirmed {tx_hash}")));
                }
                Err(e) => publisher.emit(DashboardEvent::Error(e.to_string())),
            }
        });
    }

    fn publisher(&self) -> Publisher {
        Publisher {
            advice_tx: self.advice_tx.clone(),
            log: self.log.clone(),
            events: self.events.clone(),
        }
    }

    fn emit(&self, event: DashboardEvent) {
        // A closed printer only happens during teardown.
        let _ = self.events.send(event);
    }
}

/// Write side handed to spawned tasks.
struct Publisher {
    advice_tx: Arc<watch::Sender<String>>,
    log: Arc<ActivityLog>,
    events: mpsc::UnboundedSender<DashboardEvent>,
}

impl Publisher {
    fn advice(&self, advice: String) {
        self.advice_tx.send_replace(advice.clone());
        self.log.push("AI Strategy Re-calibrated.");
        self.emit(DashboardEvent::Advice(advice));
    }

    fn emit(&self, event: DashboardEvent) {
        let _ = self.events.send(event);
    }
}
