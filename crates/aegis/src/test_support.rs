//! In-memory fakes shared by the component tests.

use alloy::primitives::{address, Address, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::ChainAddresses;
use crate::constants::{
    AAVE_V3_POOL_ADDRESSES_PROVIDER, AAVE_V3_POOL_FALLBACK, TOKEN_A_WETH, TOKEN_USDC,
    WRAPPED_TOKEN_GATEWAY,
};
use crate::errors::AegisError;
use crate::execution::aave_client::ChainReader;
use crate::types::AccountSnapshot;

pub const REGISTRY: Address = AAVE_V3_POOL_ADDRESSES_PROVIDER;
pub const FALLBACK_POOL: Address = AAVE_V3_POOL_FALLBACK;
pub const RESOLVED_POOL: Address = address!("00000000000000000000000000000000000000aa");
pub const GATEWAY: Address = WRAPPED_TOKEN_GATEWAY;
pub const USDC: Address = TOKEN_USDC;
pub const A_WETH: Address = TOKEN_A_WETH;
pub const USER: Address = address!("00000000000000000000000000000000000000e1");

pub fn chain_addresses() -> ChainAddresses {
    ChainAddresses {
        pool_addresses_provider: REGISTRY,
        pool_fallback: FALLBACK_POOL,
        wrapped_token_gateway: GATEWAY,
        usdc: USDC,
        a_weth: A_WETH,
    }
}

/// Scripted [`ChainReader`]. `Err(msg)` entries fail the matching read.
pub struct MockChain {
    pub pool: Mutex<Result<Address, String>>,
    pub account: Mutex<Result<AccountSnapshot, String>>,
    pub rate: Mutex<Result<U256, String>>,
    pub balance: Mutex<Result<U256, String>>,
    pub allowance: Mutex<Result<U256, String>>,
    pub pool_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub allowance_calls: AtomicUsize,
    /// `(pool, user)` of the last account read.
    pub last_account_args: Mutex<Option<(Address, Address)>>,
    /// `(owner, spender)` of the last allowance read.
    pub last_allowance_args: Mutex<Option<(Address, Address)>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            pool: Mutex::new(Ok(RESOLVED_POOL)),
            account: Mutex::new(Ok(AccountSnapshot::default())),
            rate: Mutex::new(Ok(U256::ZERO)),
            balance: Mutex::new(Ok(U256::ZERO)),
            allowance: Mutex::new(Ok(U256::ZERO)),
            pool_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            allowance_calls: AtomicUsize::new(0),
            last_account_args: Mutex::new(None),
            last_allowance_args: Mutex::new(None),
        }
    }
}

impl MockChain {
    pub fn failing_registry() -> Self {
        let chain = Self::default();
        chain.set_pool(Err("registry unreachable".into()));
        chain
    }

    pub fn set_pool(&self, value: Result<Address, String>) {
        *self.pool.lock().unwrap() = value;
    }

    pub fn set_account(&self, value: Result<AccountSnapshot, String>) {
        *self.account.lock().unwrap() = value;
    }

    pub fn set_balance(&self, value: Result<U256, String>) {
        *self.balance.lock().unwrap() = value;
    }

    pub fn set_allowance(&self, value: Result<U256, String>) {
        *self.allowance.lock().unwrap() = value;
    }
}

impl ChainReader for MockChain {
    async fn pool_address(&self, _registry: Address) -> Result<Address, AegisError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        self.pool
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| AegisError::Resolution { reason })
    }

    async fn user_account_data(
        &self,
        pool: Address,
        user: Address,
    ) -> Result<AccountSnapshot, AegisError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_account_args.lock().unwrap() = Some((pool, user));
        self.account
            .lock()
            .unwrap()
            .clone()
            .map_err(|e| AegisError::read("getUserAccountData", e))
    }

    async fn reserve_liquidity_rate(
        &self,
        _pool: Address,
        _asset: Address,
    ) -> Result<U256, AegisError> {
        self.rate
            .lock()
            .unwrap()
            .clone()
            .map_err(|e| AegisError::read("getReserveData", e))
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256, AegisError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance
            .lock()
            .unwrap()
            .clone()
            .map_err(|e| AegisError::read("balanceOf", e))
    }

    async fn token_allowance(
        &self,
        _token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AegisError> {
        self.allowance_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_allowance_args.lock().unwrap() = Some((owner, spender));
        self.allowance
            .lock()
            .unwrap()
            .clone()
            .map_err(|e| AegisError::read("allowance", e))
    }
}
