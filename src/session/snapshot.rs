//! Published session state

use crate::gateway::{
    AccountDetails, ChainHandle, CoinBudgets, CoinsDetails, ContractBundle, SystemParams,
};
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Startup phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Point-in-time view of the session
///
/// Account-scoped figures are only exposed while an account is connected;
/// use [`SessionSnapshot::account_details`] and
/// [`SessionSnapshot::coin_budgets`] to read them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    /// Wallet accounts; the first one is the active account
    pub accounts: Vec<Address>,
    /// Chain id last reported by the wallet
    pub chain_id: Option<u64>,
    pub is_wrong_chain: bool,
    pub chain: Option<ChainHandle>,
    pub contracts: Option<ContractBundle>,
    pub coins_details: Option<CoinsDetails>,
    pub system_params: Option<SystemParams>,
    pub(crate) account_details: Option<AccountDetails>,
    pub(crate) coin_budgets: Option<CoinBudgets>,
    pub coins_updated_at: Option<DateTime<Utc>>,
    pub account_updated_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Chain client and protocol contracts are resolved
    pub fn is_wallet_installed(&self) -> bool {
        self.chain.is_some() && self.contracts.is_some()
    }

    /// Installed and at least one account is connected
    pub fn is_wallet_connected(&self) -> bool {
        self.is_wallet_installed() && !self.accounts.is_empty()
    }

    pub fn active_account(&self) -> Option<Address> {
        self.accounts.first().copied()
    }

    pub fn account_details(&self) -> Option<&AccountDetails> {
        if self.accounts.is_empty() {
            return None;
        }
        self.account_details.as_ref()
    }

    pub fn coin_budgets(&self) -> Option<&CoinBudgets> {
        if self.accounts.is_empty() {
            return None;
        }
        self.coin_budgets.as_ref()
    }

    pub(crate) fn clear_account_figures(&mut self) {
        self.account_details = None;
        self.coin_budgets = None;
        self.account_updated_at = None;
    }
}
