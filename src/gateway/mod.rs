//! Chain Client Gateway
//!
//! Read-only access to the Djed contracts plus the wallet-session
//! capability (account permission, chain id).
//!
//! ## Architecture
//!
//! - **ChainGateway**: the trait the session controller depends on
//! - **RpcGateway**: JSON-RPC implementation (node for reads, wallet bridge
//!   for permission prompts)
//! - **abi**: selector and word encoding for `eth_call`
//! - **types**: snapshot types returned by the gateway
//!
//! Every call is asynchronous and may fail or be slow. Callers decide what
//! to do with failures; the gateway never retries on its own.

pub mod abi;
mod rpc;
mod types;

pub use rpc::{RpcConfig, RpcGateway};
pub use types::{
    percent, AccountDetails, Amount, ChainHandle, CoinBudgets, CoinsDetails, ContractBundle,
    ContractHandles, Decimals, SystemParams, BASE_COIN_DECIMALS,
};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Read and wallet operations against the chain
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Obtain a handle on the chain client
    async fn chain_handle(&self) -> GatewayResult<ChainHandle>;

    /// Ask the wallet for account access (may show a permission prompt)
    async fn request_accounts(&self) -> GatewayResult<Vec<Address>>;

    /// Chain id the wallet is currently connected to
    async fn chain_id(&self) -> GatewayResult<u64>;

    /// Resolve the controller, oracle and coin contracts
    async fn discover_contracts(&self) -> GatewayResult<ContractHandles>;

    /// Decimal precision of the stable and reserve coins
    async fn decimals_of(&self, stable_coin: Address, reserve_coin: Address)
        -> GatewayResult<Decimals>;

    /// Protocol-level figures; the oracle price is fetched only when an
    /// oracle contract is given
    async fn coin_details(
        &self,
        stable_coin: Address,
        reserve_coin: Address,
        djed: Address,
        decimals: Decimals,
        oracle: Option<Address>,
    ) -> GatewayResult<CoinsDetails>;

    /// Protocol parameters of the controller contract
    async fn system_params(&self, djed: Address) -> GatewayResult<SystemParams>;

    /// Balances of `account`
    async fn account_details(
        &self,
        handle: &ChainHandle,
        account: Address,
        stable_coin: Address,
        reserve_coin: Address,
        decimals: Decimals,
    ) -> GatewayResult<AccountDetails>;

    /// Purchasable amounts for a base coin balance
    async fn coin_budgets(
        &self,
        djed: Address,
        unscaled_balance_bc: U256,
        decimals: Decimals,
    ) -> GatewayResult<CoinBudgets>;
}

/// Errors that can occur when talking to the chain or the wallet
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Endpoint unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON-RPC error object (4001 is a user rejection)
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Wallet returned no accounts")]
    NoAccounts,
}

impl GatewayError {
    /// Whether the user declined a wallet prompt
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, GatewayError::Rpc { code: 4001, .. })
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
