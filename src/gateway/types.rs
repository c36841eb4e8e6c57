//! Data types returned by the chain gateway
//!
//! Every figure is a point-in-time snapshot. Refreshes replace a whole
//! snapshot object, never individual fields.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Decimal places of the base coin (the chain's native currency)
pub const BASE_COIN_DECIMALS: u8 = 18;

/// An unsigned on-chain quantity together with its decimal precision
///
/// Formatting is exact: `raw = 1234500, decimals = 6` displays as `1.2345`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Amount {
    /// Unscaled integer value as stored on chain
    pub raw: U256,
    /// Number of decimal places
    pub decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Amount in base coin units (18 decimals)
    pub fn base_coin(raw: U256) -> Self {
        Self::new(raw, BASE_COIN_DECIMALS)
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// `10^decimals` as a U256
    pub fn unit(decimals: u8) -> U256 {
        U256::from(10u64).pow(U256::from(decimals))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.raw.to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return f.write_str(&digits);
        }

        let padded = if digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
        let frac_part = frac_part.trim_end_matches('0');

        if frac_part.is_empty() {
            f.write_str(int_part)
        } else {
            write!(f, "{}.{}", int_part, frac_part)
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A percentage derived from a contract value and the protocol scaling factor
///
/// Two decimal places of precision are kept.
pub fn percent(value: U256, scaling_factor: U256) -> f64 {
    if scaling_factor.is_zero() {
        return 0.0;
    }
    let basis_points = value.saturating_mul(U256::from(10_000u64)) / scaling_factor;
    basis_points.saturating_to::<u128>() as f64 / 100.0
}

/// Identity of the chain client the session talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHandle {
    /// JSON-RPC endpoint used for reads
    pub endpoint: String,
    /// Value reported by `web3_clientVersion`
    pub client_version: String,
}

/// Addresses of the protocol contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractHandles {
    /// The Djed controller contract
    pub djed: Address,
    pub oracle: Address,
    pub stable_coin: Address,
    pub reserve_coin: Address,
}

/// Decimal precision of the two protocol tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimals {
    pub sc: u8,
    pub rc: u8,
}

/// Contracts plus their decimals, discovered once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBundle {
    #[serde(flatten)]
    pub contracts: ContractHandles,
    pub decimals: Decimals,
}

impl ContractBundle {
    pub fn djed(&self) -> Address {
        self.contracts.djed
    }

    pub fn oracle(&self) -> Address {
        self.contracts.oracle
    }

    pub fn stable_coin(&self) -> Address {
        self.contracts.stable_coin
    }

    pub fn reserve_coin(&self) -> Address {
        self.contracts.reserve_coin
    }
}

/// Protocol-level figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinsDetails {
    /// Stable coin total supply
    pub sc_supply: Amount,
    /// Stable coin price in base coin
    pub sc_price: Amount,
    /// Reserve coin total supply
    pub rc_supply: Amount,
    /// Reserve coin target (selling) price in base coin
    pub rc_target_price: Amount,
    /// Reserve coin buying price in base coin
    pub rc_buying_price: Amount,
    /// Base coin held in reserve
    pub reserve: Amount,
    /// Reserve ratio in percent
    pub reserve_ratio: f64,
    /// Oracle exchange rate, present only when the oracle was queried
    pub oracle_price: Option<Amount>,
}

/// Protocol parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemParams {
    pub scaling_factor: U256,
    /// Minimum reserve ratio in percent
    pub reserve_ratio_min: f64,
    /// Maximum reserve ratio in percent
    pub reserve_ratio_max: f64,
    /// Minting/redemption fee in percent
    pub fee: f64,
    /// Treasury fee in percent
    pub treasury_fee: f64,
    pub threshold_supply_sc: Amount,
    pub rc_min_price: Amount,
    pub tx_limit: Amount,
}

/// Balances of the active account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDetails {
    pub account: Address,
    pub sc_balance: Amount,
    pub rc_balance: Amount,
    pub bc_balance: Amount,
    /// Base coin balance in wei, the input to budget computation
    pub unscaled_balance_bc: U256,
}

/// How much of each coin the active account can currently buy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinBudgets {
    pub sc_budget: Amount,
    pub rc_budget: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::new(U256::from(1_234_500u64), 6).to_string(), "1.2345");
        assert_eq!(Amount::new(U256::from(5u64), 3).to_string(), "0.005");
        assert_eq!(Amount::new(U256::from(42_000u64), 3).to_string(), "42");
        assert_eq!(Amount::new(U256::ZERO, 6).to_string(), "0");
        assert_eq!(Amount::new(U256::from(7u64), 0).to_string(), "7");
    }

    #[test]
    fn test_amount_serializes_as_decimal_string() {
        let amount = Amount::base_coin(U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1.5\"");
    }

    #[test]
    fn test_percent() {
        let scaling = U256::from(1_000_000u64);
        assert_eq!(percent(U256::from(4_000_000u64), scaling), 400.0);
        assert_eq!(percent(U256::from(15_000u64), scaling), 1.5);
        assert_eq!(percent(U256::from(1u64), U256::ZERO), 0.0);
    }
}
