//! Aave V3 Sepolia client: typed reads plus calldata encoding.
//!
//! Reads go through the [`ChainReader`] trait so the resolver and the
//! aggregator can be driven by an in-memory fake in tests. Encoding is pure
//! and sync; submission lives in [`super::tx_submitter`].

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::DynProvider;
use alloy::sol_types::SolCall;
use std::future::Future;
use tracing::debug;

use crate::errors::AegisError;
use crate::types::AccountSnapshot;

use super::contracts::{IPool, IPoolAddressesProvider, IWrappedTokenGateway, IERC20};

/// Type-erased Alloy provider (HTTP or WebSocket) over Ethereum.
pub type ChainProvider = DynProvider;

// ---------------------------------------------------------------------------
// ChainReader
// ---------------------------------------------------------------------------

/// Every contract read the dashboard performs.
pub trait ChainReader: Send + Sync + 'static {
    /// `PoolAddressesProvider.getPool()`.
    fn pool_address(
        &self,
        registry: Address,
    ) -> impl Future<Output = Result<Address, AegisError>> + Send;

    /// `Pool.getUserAccountData(user)`.
    fn user_account_data(
        &self,
        pool: Address,
        user: Address,
    ) -> impl Future<Output = Result<AccountSnapshot, AegisError>> + Send;

    /// `Pool.getReserveData(asset).currentLiquidityRate` (RAY).
    fn reserve_liquidity_rate(
        &self,
        pool: Address,
        asset: Address,
    ) -> impl Future<Output = Result<U256, AegisError>> + Send;

    /// `ERC20.balanceOf(owner)`.
    fn token_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<U256, AegisError>> + Send;

    /// `ERC20.allowance(owner, spender)`.
    fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256, AegisError>> + Send;
}

// ---------------------------------------------------------------------------
// AaveClient
// ---------------------------------------------------------------------------

/// Alloy-backed [`ChainReader`] plus the calldata encoders for every write.
///
/// The pool address is passed per call: it is resolved at runtime and may
/// change, so no contract instance is cached.
#[derive(Clone)]
pub struct AaveClient {
    provider: ChainProvider,
}

impl AaveClient {
    pub fn new(provider: ChainProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ChainProvider {
        &self.provider
    }

    // -----------------------------------------------------------------------
    // Encode operations (sync, local ABI encoding only)
    // -----------------------------------------------------------------------

    /// Encode calldata for `Gateway.depositETH()`. The ETH amount travels as
    /// the transaction value.
    pub fn encode_deposit_eth(pool: Address, on_behalf_of: Address, referral_code: u16) -> Bytes {
        let call = IWrappedTokenGateway::depositETHCall {
            pool,
            onBehalfOf: on_behalf_of,
            referralCode: referral_code,
        };
        Bytes::from(call.abi_encode())
    }

    /// Encode calldata for `Gateway.withdrawETH()`.
    pub fn encode_withdraw_eth(pool: Address, amount: U256, on_behalf_of: Address) -> Bytes {
        let call = IWrappedTokenGateway::withdrawETHCall {
            pool,
            amount,
            onBehalfOf: on_behalf_of,
        };
        Bytes::from(call.abi_encode())
    }

    /// Encode calldata for `Pool.borrow()`.
    pub fn encode_borrow(
        asset: Address,
        amount: U256,
        interest_rate_mode: U256,
        referral_code: u16,
        on_behalf_of: Address,
    ) -> Bytes {
        let call = IPool::borrowCall {
            asset,
            amount,
            interestRateMode: interest_rate_mode,
            referralCode: referral_code,
            onBehalfOf: on_behalf_of,
        };
        Bytes::from(call.abi_encode())
    }

    /// Encode calldata for `Pool.repay()`.
    pub fn encode_repay(
        asset: Address,
        amount: U256,
        interest_rate_mode: U256,
        on_behalf_of: Address,
    ) -> Bytes {
        let call = IPool::repayCall {
            asset,
            amount,
            interestRateMode: interest_rate_mode,
            onBehalfOf: on_behalf_of,
        };
        Bytes::from(call.abi_encode())
    }

    /// Encode calldata for `ERC20.approve()`.
    pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
        let call = IERC20::approveCall { spender, amount };
        Bytes::from(call.abi_encode())
    }
}

impl ChainReader for AaveClient {
    async fn pool_address(&self, registry: Address) -> Result<Address, AegisError> {
        let registry = IPoolAddressesProvider::new(registry, self.provider.clone());
        registry
            .getPool()
            .call()
            .await
            .map_err(|e| AegisError::Resolution {
                reason: format!("getPool RPC call failed: {e}"),
            })
    }

    async fn user_account_data(
        &self,
        pool: Address,
        user: Address,
    ) -> Result<AccountSnapshot, AegisError> {
        let pool = IPool::new(pool, self.provider.clone());
        let result = pool
            .getUserAccountData(user)
            .call()
            .await
            .map_err(|e| AegisError::read("getUserAccountData", e))?;

        Ok(AccountSnapshot {
            total_collateral_base: result.totalCollateralBase,
            total_debt_base: result.totalDebtBase,
            available_borrows_base: result.availableBorrowsBase,
            current_liquidation_threshold: result.currentLiquidationThreshold,
            ltv: result.ltv,
            health_factor: result.healthFactor,
        })
    }

    async fn reserve_liquidity_rate(
        &self,
        pool: Address,
        asset: Address,
    ) -> Result<U256, AegisError> {
        let pool = IPool::new(pool, self.provider.clone());
        let data = pool
            .getReserveData(asset)
            .call()
            .await
            .map_err(|e| AegisError::read("getReserveData", e))?;

        let rate = U256::from(data.currentLiquidityRate);
        debug!(asset = %asset, liquidity_rate = %rate, "reserve data");
        Ok(rate)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AegisError> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| AegisError::read("balanceOf", e))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AegisError> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| AegisError::read("allowance", e))
    }
}
