//! Live supply APY of the tracked reserve.
//!
//! Resolves the pool once, seeds the yield from `getReserveData`, then
//! re-emits it for every `ReserveDataUpdated` log of the tracked reserve.
//! Push-only: there is no timer. Any failure before streaming emits a single
//! `Unavailable` and ends the listener; a stream that ends later is logged
//! and the last reading stays.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::errors::AegisError;
use crate::execution::aave_client::{AaveClient, ChainReader};
use crate::execution::contracts::IPool;
use crate::types::wad_ray::ray_to_apy_percent;
use crate::types::YieldReading;

/// The part of a `ReserveDataUpdated` log the listener needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveUpdate {
    pub reserve: Address,
    pub liquidity_rate: U256,
}

pub type ReserveUpdateStream = BoxStream<'static, Result<ReserveUpdate, AegisError>>;

// ---------------------------------------------------------------------------
// ReserveFeed
// ---------------------------------------------------------------------------

/// Chain access for the listener.
pub trait ReserveFeed: Send + Sync + 'static {
    fn resolve_pool(&self) -> impl Future<Output = Result<Address, AegisError>> + Send;

    /// Current liquidity rate (RAY) of `asset`.
    fn reserve_liquidity_rate(
        &self,
        pool: Address,
        asset: Address,
    ) -> impl Future<Output = Result<U256, AegisError>> + Send;

    /// Subscribe to the pool's reserve updates. Items arrive in chain order.
    fn reserve_updates(
        &self,
        pool: Address,
    ) -> impl Future<Output = Result<ReserveUpdateStream, AegisError>> + Send;
}

/// [`ReserveFeed`] over an Alloy WebSocket provider (`eth_subscribe` logs).
pub struct AlloyReserveFeed {
    client: AaveClient,
    registry: Address,
}

impl AlloyReserveFeed {
    pub async fn connect(ws_url: &str, registry: Address) -> Result<Self, AegisError> {
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await?
            .erased();
        info!("reserve feed websocket connected");
        Ok(Self {
            client: AaveClient::new(provider),
            registry,
        })
    }
}

impl ReserveFeed for AlloyReserveFeed {
    async fn resolve_pool(&self) -> Result<Address, AegisError> {
        self.client.pool_address(self.registry).await
    }

    async fn reserve_liquidity_rate(&self, pool: Address, asset: Address) -> Result<U256, AegisError> {
        self.client.reserve_liquidity_rate(pool, asset).await
    }

    async fn reserve_updates(&self, pool: Address) -> Result<ReserveUpdateStream, AegisError> {
        let filter = Filter::new()
            .address(pool)
            .event_signature(IPool::ReserveDataUpdated::SIGNATURE_HASH);
        let subscription = self.client.provider().subscribe_logs(&filter).await?;

        let stream = subscription.into_stream().map(|log| {
            log.log_decode::<IPool::ReserveDataUpdated>()
                .map(|decoded| ReserveUpdate {
                    reserve: decoded.inner.data.reserve,
                    liquidity_rate: decoded.inner.data.liquidityRate,
                })
                .map_err(|e| AegisError::read("ReserveDataUpdated", e))
        });
        Ok(stream.boxed())
    }
}

// ---------------------------------------------------------------------------
// RateListener
// ---------------------------------------------------------------------------

/// Cancellation handle for a running listener.
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Tear down the subscription. Nothing is emitted after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    /// Wait for the listener task to end on its own.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "rate listener task panicked");
            }
        }
    }
}

pub struct RateListener<F: ReserveFeed> {
    feed: Arc<F>,
    asset: Address,
    yield_tx: watch::Sender<YieldReading>,
    cancel: CancellationToken,
}

impl<F: ReserveFeed> RateListener<F> {
    /// Start the listener for `asset`. It is cancelled by `shutdown` or by
    /// [`ListenerHandle::stop`].
    pub fn spawn(
        feed: Arc<F>,
        asset: Address,
        yield_tx: watch::Sender<YieldReading>,
        shutdown: &CancellationToken,
    ) -> ListenerHandle {
        let cancel = shutdown.child_token();
        let listener = Self {
            feed,
            asset,
            yield_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(async move { listener.run().await });
        ListenerHandle { cancel, task }
    }

    async fn run(self) {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => debug!("rate listener cancelled"),
            () = self.listen() => {}
        }
    }

    async fn listen(&self) {
        let pool = match self.seed().await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, asset = %self.asset, "rate listener failed to initialise");
                self.emit(YieldReading::Unavailable);
                return;
            }
        };

        // A seeded value stays on screen whatever happens to the subscription.
        let mut stream = match self.feed.reserve_updates(pool).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, pool = %pool, "reserve update subscription failed, keeping last yield");
                return;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(update) if update.reserve == self.asset => {
                    let apy = ray_to_apy_percent(update.liquidity_rate);
                    debug!(apy = %apy, "reserve rate updated");
                    self.emit(YieldReading::Rate(apy));
                }
                Ok(update) => trace!(reserve = %update.reserve, "ignoring other reserve"),
                Err(e) => warn!(error = %e, "undecodable reserve update skipped"),
            }
        }

        warn!("reserve update stream ended, keeping last yield");
    }

    /// Resolving -> Seeding. Returns the pool to subscribe on.
    async fn seed(&self) -> Result<Address, AegisError> {
        let pool = self.feed.resolve_pool().await?;
        info!(pool = %pool, "rate listener resolved pool");

        let rate = self.feed.reserve_liquidity_rate(pool, self.asset).await?;
        let apy = ray_to_apy_percent(rate);
        info!(apy = %apy, "initial yield");
        self.emit(YieldReading::Rate(apy));
        Ok(pool)
    }

    fn emit(&self, reading: YieldReading) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.yield_tx.send_replace(reading);
    }
}
