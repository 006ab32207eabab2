//! Active pool address: registry lookup with a configured fallback.
//!
//! The resolver is the only writer of the pool address. Dependents hold a
//! `watch::Receiver` and read it at use time, so a later successful lookup
//! is picked up without re-wiring anything.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AegisError;
use crate::execution::aave_client::ChainReader;

pub struct PoolAddressResolver<R: ChainReader> {
    reader: Arc<R>,
    registry: Address,
    pool_tx: watch::Sender<Address>,
}

impl<R: ChainReader> PoolAddressResolver<R> {
    /// Seeds the published address with `fallback`.
    pub fn new(reader: Arc<R>, registry: Address, fallback: Address) -> Self {
        let (pool_tx, _) = watch::channel(fallback);
        Self {
            reader,
            registry,
            pool_tx,
        }
    }

    /// One registry read. On failure the current value stays in place.
    pub async fn resolve(&self) -> Result<Address, AegisError> {
        match self.reader.pool_address(self.registry).await {
            Ok(pool) => {
                let previous = self.pool_tx.send_replace(pool);
                if previous != pool {
                    info!(pool = %pool, previous = %previous, "pool address resolved");
                } else {
                    debug!(pool = %pool, "pool address unchanged");
                }
                Ok(pool)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    registry = %self.registry,
                    current = %self.current(),
                    "pool lookup failed, keeping current address"
                );
                Err(e)
            }
        }
    }

    /// Latest published address (the fallback until a lookup succeeds).
    pub fn current(&self) -> Address {
        *self.pool_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Address> {
        self.pool_tx.subscribe()
    }

    /// Resolve once, then again every `refresh_interval` until shutdown.
    /// A zero interval resolves once and returns.
    pub async fn run(self: Arc<Self>, refresh_interval: Duration, shutdown: CancellationToken) {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            _ = self.resolve() => {}
        }

        if refresh_interval.is_zero() {
            debug!("pool address refresh disabled");
            return;
        }

        info!(interval_secs = refresh_interval.as_secs(), "pool address refresh started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("pool address resolver shutting down");
                    break;
                }
                () = tokio::time::sleep(refresh_interval) => {
                    // Failures are logged inside resolve().
                    let _ = self.resolve().await;
                }
            }
        }
    }
}
