//! Scripted gateway and opener for controller tests

use super::{OpenError, PageOpener};
use crate::gateway::*;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn contracts() -> ContractHandles {
    ContractHandles {
        djed: addr(0xd0),
        oracle: addr(0x0c),
        stable_coin: addr(0x5c),
        reserve_coin: addr(0x7c),
    }
}

#[derive(Default)]
pub struct CallCounts {
    pub chain_handle: AtomicUsize,
    pub request_accounts: AtomicUsize,
    pub chain_id: AtomicUsize,
    pub coin_details: AtomicUsize,
    pub system_params: AtomicUsize,
    pub account_details: AtomicUsize,
    pub coin_budgets: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// A gateway whose answers are set by the test
pub struct MockGateway {
    /// `None` makes `request_accounts` fail with a user rejection
    pub wallet_accounts: Mutex<Option<Vec<Address>>>,
    /// Makes `request_accounts` report that the wallet holds no accounts
    pub empty_wallet: AtomicBool,
    pub chain_id: AtomicU64,
    pub fail_discovery: AtomicBool,
    pub fail_account_details: AtomicBool,
    /// Delays applied to successive `account_details` calls
    pub account_delays: Mutex<VecDeque<Duration>>,
    pub calls: CallCounts,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            wallet_accounts: Mutex::new(Some(vec![addr(0xaa)])),
            empty_wallet: AtomicBool::new(false),
            chain_id: AtomicU64::new(1),
            fail_discovery: AtomicBool::new(false),
            fail_account_details: AtomicBool::new(false),
            account_delays: Mutex::new(VecDeque::new()),
            calls: CallCounts::default(),
        }
    }

    pub fn set_wallet_accounts(&self, accounts: Option<Vec<Address>>) {
        *self.wallet_accounts.lock().unwrap() = accounts;
    }

    pub fn delay_next_account_details(&self, delay: Duration) {
        self.account_delays.lock().unwrap().push_back(delay);
    }

    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn chain_handle(&self) -> GatewayResult<ChainHandle> {
        Self::bump(&self.calls.chain_handle);
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable);
        }
        Ok(ChainHandle {
            endpoint: "mock://chain".to_string(),
            client_version: "mock/v1".to_string(),
        })
    }

    async fn request_accounts(&self) -> GatewayResult<Vec<Address>> {
        Self::bump(&self.calls.request_accounts);
        if self.empty_wallet.load(Ordering::SeqCst) {
            return Err(GatewayError::NoAccounts);
        }
        let accounts = self.wallet_accounts.lock().unwrap().clone();
        accounts.ok_or(GatewayError::Rpc {
            code: 4001,
            message: "User rejected the request.".to_string(),
        })
    }

    async fn chain_id(&self) -> GatewayResult<u64> {
        Self::bump(&self.calls.chain_id);
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn discover_contracts(&self) -> GatewayResult<ContractHandles> {
        Ok(contracts())
    }

    async fn decimals_of(&self, _sc: Address, _rc: Address) -> GatewayResult<Decimals> {
        Ok(Decimals { sc: 6, rc: 6 })
    }

    async fn coin_details(
        &self,
        _stable_coin: Address,
        _reserve_coin: Address,
        _djed: Address,
        decimals: Decimals,
        oracle: Option<Address>,
    ) -> GatewayResult<CoinsDetails> {
        let call = Self::bump(&self.calls.coin_details) as u64;
        Ok(CoinsDetails {
            sc_supply: Amount::new(U256::from(call), decimals.sc),
            sc_price: Amount::base_coin(U256::from(1u64)),
            rc_supply: Amount::new(U256::from(call), decimals.rc),
            rc_target_price: Amount::base_coin(U256::from(1u64)),
            rc_buying_price: Amount::base_coin(U256::from(1u64)),
            reserve: Amount::base_coin(U256::from(100u64)),
            reserve_ratio: 400.0,
            oracle_price: oracle.map(|_| Amount::base_coin(U256::from(2u64))),
        })
    }

    async fn system_params(&self, _djed: Address) -> GatewayResult<SystemParams> {
        Self::bump(&self.calls.system_params);
        Ok(SystemParams {
            scaling_factor: U256::from(1_000_000u64),
            reserve_ratio_min: 400.0,
            reserve_ratio_max: 800.0,
            fee: 1.5,
            treasury_fee: 0.25,
            threshold_supply_sc: Amount::new(U256::ZERO, 6),
            rc_min_price: Amount::base_coin(U256::ZERO),
            tx_limit: Amount::new(U256::ZERO, 6),
        })
    }

    async fn account_details(
        &self,
        _handle: &ChainHandle,
        account: Address,
        _stable_coin: Address,
        _reserve_coin: Address,
        decimals: Decimals,
    ) -> GatewayResult<AccountDetails> {
        let call = Self::bump(&self.calls.account_details) as u64;
        let delay = self.account_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_account_details.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        Ok(AccountDetails {
            account,
            sc_balance: Amount::new(U256::from(call), decimals.sc),
            rc_balance: Amount::new(U256::ZERO, decimals.rc),
            bc_balance: Amount::base_coin(U256::from(10u64)),
            unscaled_balance_bc: U256::from(10u64),
        })
    }

    async fn coin_budgets(
        &self,
        _djed: Address,
        unscaled_balance_bc: U256,
        decimals: Decimals,
    ) -> GatewayResult<CoinBudgets> {
        Self::bump(&self.calls.coin_budgets);
        Ok(CoinBudgets {
            sc_budget: Amount::new(unscaled_balance_bc, decimals.sc),
            rc_budget: Amount::new(unscaled_balance_bc, decimals.rc),
        })
    }
}

/// Records opened URLs instead of launching a browser
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl PageOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<(), OpenError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
