//! Account state aggregator: three independent polled reads.
//!
//! - account data: `Pool.getUserAccountData(user)` on the current pool
//! - balance: `aWETH.balanceOf(user)`
//! - allowance: `USDC.allowance(user, pool)`
//!
//! Each read runs on its own interval and replaces its own `watch` snapshot
//! on success. A failed read leaves the previous snapshot in place. Reads
//! are gated on a known user address. Display values are pure derivations
//! of the latest snapshots and are never stored.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ChainAddresses, PollingTiming};
use crate::constants::{USDC_DECIMALS, WAD_DECIMALS};
use crate::errors::AegisError;
use crate::execution::aave_client::ChainReader;
use crate::types::wad_ray::{format_fixed, parse_decimal, parse_units, round_display, units_to_decimal};
use crate::types::{AccountSnapshot, AccountView, Mode};

// ---------------------------------------------------------------------------
// Pure derivations
// ---------------------------------------------------------------------------

/// aWETH balance in ETH; `0` until the first read.
pub fn balance_eth(raw: Option<U256>) -> Decimal {
    raw.map(|r| units_to_decimal(r, WAD_DECIMALS))
        .unwrap_or(Decimal::ZERO)
}

/// Balance as displayed: four decimals.
pub fn balance_display(raw: Option<U256>) -> String {
    format_fixed(balance_eth(raw), 4)
}

/// USD value of the balance, two decimals. Unknown price counts as 0.
pub fn balance_usd_value(raw: Option<U256>, eth_price: Option<Decimal>) -> Decimal {
    let price = eth_price.unwrap_or(Decimal::ZERO);
    round_display(balance_eth(raw) * price, 2)
}

/// USDC allowance as displayed; `---` until the first read.
pub fn allowance_display(raw: Option<U256>) -> String {
    match raw {
        Some(r) => format_fixed(units_to_decimal(r, USDC_DECIMALS), 2),
        None => "---".into(),
    }
}

/// Whether a repay of `amount` must be preceded by an approval.
///
/// Earn mode never needs one (ETH goes through the gateway). An empty,
/// unparsable or non-positive amount needs none. Otherwise approval is
/// needed iff the allowance is unknown or strictly below the amount at
/// the token's scale.
pub fn needs_approval(mode: Mode, amount: &str, allowance: Option<U256>, decimals: u32) -> bool {
    if mode == Mode::Earn {
        return false;
    }
    match parse_decimal(amount) {
        Some(value) if value > Decimal::ZERO => {}
        _ => return false,
    }
    let Ok(requested) = parse_units(amount, decimals) else {
        return false;
    };
    match allowance {
        None => true,
        Some(allowed) => allowed < requested,
    }
}

// ---------------------------------------------------------------------------
// RefreshHandle
// ---------------------------------------------------------------------------

/// Wakes all three poll loops at once. Timers are unaffected.
#[derive(Clone)]
pub struct RefreshHandle {
    wakers: Arc<[Notify; 3]>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self {
            wakers: Arc::new([Notify::new(), Notify::new(), Notify::new()]),
        }
    }

    pub fn refresh_all(&self) {
        debug!("refresh requested for all account reads");
        for waker in self.wakers.iter() {
            // notify_one stores a permit when the loop is mid-read.
            waker.notify_one();
        }
    }

    fn waker(&self, read: ReadKind) -> &Notify {
        &self.wakers[read as usize]
    }

    /// Consume stored wake-ups; returns how many loops had one pending.
    #[cfg(test)]
    pub(crate) fn take_pending(&self) -> usize {
        use futures::FutureExt;
        self.wakers
            .iter()
            .filter(|w| w.notified().now_or_never().is_some())
            .count()
    }
}

impl Default for RefreshHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AccountAggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    AccountData = 0,
    Balance = 1,
    Allowance = 2,
}

impl ReadKind {
    fn name(self) -> &'static str {
        match self {
            ReadKind::AccountData => "account data",
            ReadKind::Balance => "balance",
            ReadKind::Allowance => "allowance",
        }
    }
}

pub struct AccountAggregator<R: ChainReader> {
    reader: Arc<R>,
    addresses: ChainAddresses,
    pool_rx: watch::Receiver<Address>,
    user_rx: watch::Receiver<Option<Address>>,
    account_interval: Duration,
    balance_interval: Duration,
    allowance_interval: Duration,
    account_tx: watch::Sender<AccountSnapshot>,
    balance_tx: watch::Sender<Option<U256>>,
    allowance_tx: watch::Sender<Option<U256>>,
    refresh: RefreshHandle,
}

impl<R: ChainReader> AccountAggregator<R> {
    pub fn new(
        reader: Arc<R>,
        addresses: ChainAddresses,
        pool_rx: watch::Receiver<Address>,
        user_rx: watch::Receiver<Option<Address>>,
        polling: &PollingTiming,
    ) -> Self {
        let (account_tx, _) = watch::channel(AccountSnapshot::default());
        let (balance_tx, _) = watch::channel(None);
        let (allowance_tx, _) = watch::channel(None);
        Self {
            reader,
            addresses,
            pool_rx,
            user_rx,
            account_interval: Duration::from_millis(polling.account_data_interval_ms),
            balance_interval: Duration::from_millis(polling.balance_interval_ms),
            allowance_interval: Duration::from_millis(polling.allowance_interval_ms),
            account_tx,
            balance_tx,
            allowance_tx,
            refresh: RefreshHandle::new(),
        }
    }

    pub fn subscribe_account(&self) -> watch::Receiver<AccountSnapshot> {
        self.account_tx.subscribe()
    }

    pub fn subscribe_balance(&self) -> watch::Receiver<Option<U256>> {
        self.balance_tx.subscribe()
    }

    pub fn subscribe_allowance(&self) -> watch::Receiver<Option<U256>> {
        self.allowance_tx.subscribe()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Derived view of the latest account snapshot.
    pub fn view(&self) -> AccountView {
        AccountView::derive(&self.account_tx.borrow())
    }

    /// Run all three reads inline, in order. Errors are logged, not returned.
    #[cfg(test)]
    pub(crate) async fn refresh_now(&self) {
        for read in [ReadKind::AccountData, ReadKind::Balance, ReadKind::Allowance] {
            self.poll(read).await;
        }
    }

    /// Spawn-free driver: runs the three loops until `shutdown`.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            account_ms = self.account_interval.as_millis() as u64,
            balance_ms = self.balance_interval.as_millis() as u64,
            allowance_ms = self.allowance_interval.as_millis() as u64,
            "account aggregator started"
        );
        tokio::join!(
            self.poll_loop(ReadKind::AccountData, self.account_interval, &shutdown),
            self.poll_loop(ReadKind::Balance, self.balance_interval, &shutdown),
            self.poll_loop(ReadKind::Allowance, self.allowance_interval, &shutdown),
        );
        info!("account aggregator stopped");
    }

    async fn poll_loop(&self, read: ReadKind, interval: Duration, shutdown: &CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let waker = self.refresh.waker(read);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                () = waker.notified() => debug!(read = read.name(), "manual refresh"),
            }
            self.poll(read).await;
        }
    }

    /// One read. A missing user makes it a no-op.
    async fn poll(&self, read: ReadKind) {
        let Some(user) = *self.user_rx.borrow() else {
            return;
        };
        let result = match read {
            ReadKind::AccountData => self.poll_account(user).await,
            ReadKind::Balance => self.poll_balance(user).await,
            ReadKind::Allowance => self.poll_allowance(user).await,
        };
        if let Err(e) = result {
            warn!(read = read.name(), error = %e, "poll failed, keeping previous snapshot");
        }
    }

    async fn poll_account(&self, user: Address) -> Result<(), AegisError> {
        let pool = *self.pool_rx.borrow();
        let snapshot = self.reader.user_account_data(pool, user).await?;
        let health = AccountView::derive(&snapshot).health;
        if health.is_critical() {
            warn!(health_factor = %health, "health factor critical");
        } else {
            debug!(health_factor = %health, "account data updated");
        }
        self.account_tx.send_replace(snapshot);
        Ok(())
    }

    async fn poll_balance(&self, user: Address) -> Result<(), AegisError> {
        let balance = self.reader.token_balance(self.addresses.a_weth, user).await?;
        self.balance_tx.send_replace(Some(balance));
        Ok(())
    }

    async fn poll_allowance(&self, user: Address) -> Result<(), AegisError> {
        let pool = *self.pool_rx.borrow();
        let allowance = self
            .reader
            .token_allowance(self.addresses.usdc, user, pool)
            .await?;
        self.allowance_tx.send_replace(Some(allowance));
        Ok(())
    }
}
