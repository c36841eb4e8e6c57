//! JSON-RPC Chain Gateway
//!
//! Talks to two endpoints: a node for contract reads and a wallet bridge
//! (EIP-1193 over HTTP) for account permission and chain id.

use super::abi::{IDjed, IERC20, IOracle};
use super::types::*;
use super::{ChainGateway, GatewayError, GatewayResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Price-style reads on the controller take the payment amount of the
/// transaction in flight; zero for plain views
const VIEW_PAYMENT: U256 = U256::ZERO;

/// Configuration for the JSON-RPC gateway
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Node endpoint for `eth_call` and balance reads
    pub rpc_url: String,
    /// Wallet bridge endpoint for `eth_requestAccounts` / `eth_chainId`
    pub wallet_url: String,
    /// Address of the Djed controller contract
    pub djed_address: Address,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            wallet_url: "http://127.0.0.1:1248".to_string(),
            djed_address: Address::ZERO,
            request_timeout_ms: 10_000,
        }
    }
}

/// Ethereum JSON-RPC implementation of [`ChainGateway`]
pub struct RpcGateway {
    client: Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcGateway {
    /// Create a new gateway with the given configuration
    pub fn new(config: RpcConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call(&self, url: &str, method: &str, params: Value) -> GatewayResult<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::trace!(method, url, "JSON-RPC request");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rpc {
                code: i64::from(status.as_u16()),
                message: text,
            });
        }

        let body: RpcResponse = response.json().await.map_err(map_transport_error)?;
        unwrap_response(body)
    }

    /// `eth_call` at the latest block, decoded with the call's return types
    async fn eth_call<C>(&self, to: Address, call: C) -> GatewayResult<C::Return>
    where
        C: SolCall + Send,
    {
        let data = Bytes::from(call.abi_encode());
        let params = json!([{ "to": to, "data": data }, "latest"]);
        let value = self.call(&self.config.rpc_url, "eth_call", params).await?;

        let output: Bytes = decode_value(value)?;
        if output.is_empty() {
            return Err(GatewayError::Decode(format!(
                "empty return data from {} (no contract at {}?)",
                C::SIGNATURE,
                to
            )));
        }
        C::abi_decode_returns(&output, true)
            .map_err(|e| GatewayError::Decode(format!("{}: {}", C::SIGNATURE, e)))
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::Unavailable
    } else {
        GatewayError::Request(e)
    }
}

fn unwrap_response(body: RpcResponse) -> GatewayResult<Value> {
    if let Some(err) = body.error {
        return Err(GatewayError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| GatewayError::Decode("response has neither result nor error".to_string()))
}

fn as_str(value: &Value) -> GatewayResult<&str> {
    value
        .as_str()
        .ok_or_else(|| GatewayError::Decode(format!("expected a string result, got {}", value)))
}

/// Typed view of a JSON-RPC result (hex quantities, hex data)
fn decode_value<T: DeserializeOwned>(value: Value) -> GatewayResult<T> {
    let shown = value.to_string();
    serde_json::from_value(value)
        .map_err(|e| GatewayError::Decode(format!("unexpected result {}: {}", shown, e)))
}

fn parse_accounts(value: &Value) -> GatewayResult<Vec<Address>> {
    let items = value
        .as_array()
        .ok_or_else(|| GatewayError::Decode(format!("expected an account array, got {}", value)))?;

    items
        .iter()
        .map(|item| {
            let s = as_str(item)?;
            s.parse::<Address>()
                .map_err(|_| GatewayError::InvalidAddress(s.to_string()))
        })
        .collect()
}

/// `amount * 10^decimals / price`, zero when the price is zero
fn budget(balance: U256, price: U256, decimals: u8) -> Amount {
    if price.is_zero() {
        return Amount::new(U256::ZERO, decimals);
    }
    let raw = balance.saturating_mul(Amount::unit(decimals)) / price;
    Amount::new(raw, decimals)
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn chain_handle(&self) -> GatewayResult<ChainHandle> {
        let version = self
            .call(&self.config.rpc_url, "web3_clientVersion", json!([]))
            .await?;

        Ok(ChainHandle {
            endpoint: self.config.rpc_url.clone(),
            client_version: as_str(&version)?.to_string(),
        })
    }

    async fn request_accounts(&self) -> GatewayResult<Vec<Address>> {
        let value = self
            .call(&self.config.wallet_url, "eth_requestAccounts", json!([]))
            .await?;
        let accounts = parse_accounts(&value)?;
        if accounts.is_empty() {
            return Err(GatewayError::NoAccounts);
        }
        Ok(accounts)
    }

    async fn chain_id(&self) -> GatewayResult<u64> {
        let value = self
            .call(&self.config.wallet_url, "eth_chainId", json!([]))
            .await?;
        let id: U256 = decode_value(value)?;
        u64::try_from(id).map_err(|_| GatewayError::Decode(format!("chain id {} out of range", id)))
    }

    async fn discover_contracts(&self) -> GatewayResult<ContractHandles> {
        let djed = self.config.djed_address;
        let oracle = self.eth_call(djed, IDjed::oracleCall {}).await?._0;
        let stable_coin = self.eth_call(djed, IDjed::stableCoinCall {}).await?._0;
        let reserve_coin = self.eth_call(djed, IDjed::reserveCoinCall {}).await?._0;

        tracing::debug!(%djed, %oracle, %stable_coin, %reserve_coin, "Discovered contracts");

        Ok(ContractHandles {
            djed,
            oracle,
            stable_coin,
            reserve_coin,
        })
    }

    async fn decimals_of(
        &self,
        stable_coin: Address,
        reserve_coin: Address,
    ) -> GatewayResult<Decimals> {
        Ok(Decimals {
            sc: self.eth_call(stable_coin, IERC20::decimalsCall {}).await?._0,
            rc: self.eth_call(reserve_coin, IERC20::decimalsCall {}).await?._0,
        })
    }

    async fn coin_details(
        &self,
        stable_coin: Address,
        reserve_coin: Address,
        djed: Address,
        decimals: Decimals,
        oracle: Option<Address>,
    ) -> GatewayResult<CoinsDetails> {
        let amount = VIEW_PAYMENT;
        let sc_supply = self.eth_call(stable_coin, IERC20::totalSupplyCall {}).await?._0;
        let rc_supply = self.eth_call(reserve_coin, IERC20::totalSupplyCall {}).await?._0;
        let sc_price = self
            .eth_call(djed, IDjed::scPriceCall { currentPaymentAmount: amount })
            .await?
            ._0;
        let rc_target_price = self
            .eth_call(djed, IDjed::rcTargetPriceCall { currentPaymentAmount: amount })
            .await?
            ._0;
        let rc_buying_price = self
            .eth_call(djed, IDjed::rcBuyingPriceCall { currentPaymentAmount: amount })
            .await?
            ._0;
        let reserve = self
            .eth_call(djed, IDjed::RCall { currentPaymentAmount: amount })
            .await?
            ._0;
        let ratio = self.eth_call(djed, IDjed::ratioCall {}).await?._0;
        let scaling_factor = self.eth_call(djed, IDjed::scalingFactorCall {}).await?._0;

        let oracle_price = match oracle {
            Some(oracle) => {
                let price = self.eth_call(oracle, IOracle::readDataCall {}).await?._0;
                Some(Amount::base_coin(price))
            }
            None => None,
        };

        Ok(CoinsDetails {
            sc_supply: Amount::new(sc_supply, decimals.sc),
            sc_price: Amount::base_coin(sc_price),
            rc_supply: Amount::new(rc_supply, decimals.rc),
            rc_target_price: Amount::base_coin(rc_target_price),
            rc_buying_price: Amount::base_coin(rc_buying_price),
            reserve: Amount::base_coin(reserve),
            reserve_ratio: percent(ratio, scaling_factor),
            oracle_price,
        })
    }

    async fn system_params(&self, djed: Address) -> GatewayResult<SystemParams> {
        let scaling_factor = self.eth_call(djed, IDjed::scalingFactorCall {}).await?._0;
        let ratio_min = self.eth_call(djed, IDjed::reserveRatioMinCall {}).await?._0;
        let ratio_max = self.eth_call(djed, IDjed::reserveRatioMaxCall {}).await?._0;
        let fee = self.eth_call(djed, IDjed::feeCall {}).await?._0;
        let treasury_fee = self.eth_call(djed, IDjed::treasuryFeeCall {}).await?._0;
        let threshold_supply_sc = self.eth_call(djed, IDjed::thresholdSupplySCCall {}).await?._0;
        let rc_min_price = self.eth_call(djed, IDjed::rcMinPriceCall {}).await?._0;
        let tx_limit = self.eth_call(djed, IDjed::txLimitCall {}).await?._0;

        Ok(SystemParams {
            scaling_factor,
            reserve_ratio_min: percent(ratio_min, scaling_factor),
            reserve_ratio_max: percent(ratio_max, scaling_factor),
            fee: percent(fee, scaling_factor),
            treasury_fee: percent(treasury_fee, scaling_factor),
            threshold_supply_sc: Amount::base_coin(threshold_supply_sc),
            rc_min_price: Amount::base_coin(rc_min_price),
            tx_limit: Amount::base_coin(tx_limit),
        })
    }

    async fn account_details(
        &self,
        handle: &ChainHandle,
        account: Address,
        stable_coin: Address,
        reserve_coin: Address,
        decimals: Decimals,
    ) -> GatewayResult<AccountDetails> {
        let sc = self
            .eth_call(stable_coin, IERC20::balanceOfCall { account })
            .await?
            ._0;
        let rc = self
            .eth_call(reserve_coin, IERC20::balanceOfCall { account })
            .await?
            ._0;
        let bc_value = self
            .call(&handle.endpoint, "eth_getBalance", json!([account, "latest"]))
            .await?;
        let bc: U256 = decode_value(bc_value)?;

        Ok(AccountDetails {
            account,
            sc_balance: Amount::new(sc, decimals.sc),
            rc_balance: Amount::new(rc, decimals.rc),
            bc_balance: Amount::base_coin(bc),
            unscaled_balance_bc: bc,
        })
    }

    async fn coin_budgets(
        &self,
        djed: Address,
        unscaled_balance_bc: U256,
        decimals: Decimals,
    ) -> GatewayResult<CoinBudgets> {
        let amount = VIEW_PAYMENT;
        let sc_price = self
            .eth_call(djed, IDjed::scPriceCall { currentPaymentAmount: amount })
            .await?
            ._0;
        let rc_price = self
            .eth_call(djed, IDjed::rcBuyingPriceCall { currentPaymentAmount: amount })
            .await?
            ._0;

        Ok(CoinBudgets {
            sc_budget: budget(unscaled_balance_bc, sc_price, decimals.sc),
            rc_budget: budget(unscaled_balance_bc, rc_price, decimals.rc),
        })
    }
}
