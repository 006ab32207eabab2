//! Compile-time ABI definitions for on-chain contracts via Alloy `sol!`.
//!
//! Only the functions the dashboard reads or writes are declared.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

// ---------------------------------------------------------------------------
// Aave V3 PoolAddressesProvider
// ---------------------------------------------------------------------------

sol! {
    /// Registry holding the current Pool proxy address.
    #[sol(rpc)]
    interface IPoolAddressesProvider {
        function getPool() external view returns (address);
    }
}

// ---------------------------------------------------------------------------
// Aave V3 Pool
// ---------------------------------------------------------------------------

sol! {
    /// Aave V3 Pool contract: account data, reserve data, borrow and repay.
    #[sol(rpc)]
    interface IPool {
        /// Emitted on every reserve state update (supply, borrow, repay, ...).
        event ReserveDataUpdated(
            address indexed reserve,
            uint256 liquidityRate,
            uint256 stableBorrowRate,
            uint256 variableBorrowRate,
            uint256 liquidityIndex,
            uint256 variableBorrowIndex
        );

        /// Get aggregated user position data.
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        /// Get full reserve data (15 fields).
        function getReserveData(address asset) external view returns (
            uint256 configuration,
            uint128 liquidityIndex,
            uint128 currentLiquidityRate,
            uint128 variableBorrowIndex,
            uint128 currentVariableBorrowRate,
            uint128 currentStableBorrowRate,
            uint40 lastUpdateTimestamp,
            uint16 id,
            address aTokenAddress,
            address stableDebtTokenAddress,
            address variableDebtTokenAddress,
            address interestRateStrategyAddress,
            uint128 accruedToTreasury,
            uint128 unbacked,
            uint128 isolationModeTotalDebt
        );

        /// Borrow against supplied collateral.
        function borrow(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            uint16 referralCode,
            address onBehalfOf
        ) external;

        /// Repay borrowed asset.
        function repay(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            address onBehalfOf
        ) external returns (uint256);
    }
}

// ---------------------------------------------------------------------------
// Aave WrappedTokenGatewayV3
// ---------------------------------------------------------------------------

sol! {
    /// Wraps native ETH into WETH and supplies it (and the reverse).
    #[sol(rpc)]
    interface IWrappedTokenGateway {
        function depositETH(address pool, address onBehalfOf, uint16 referralCode) external payable;
        function withdrawETH(address pool, uint256 amount, address onBehalfOf) external;
    }
}

// ---------------------------------------------------------------------------
// ERC-20
// ---------------------------------------------------------------------------

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}
