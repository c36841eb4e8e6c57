//! Contract interfaces read by the gateway
//!
//! Selectors, calldata and return decoding are generated by `sol!`.

use alloy_sol_types::sol;

sol! {
    /// Djed controller views
    interface IDjed {
        function oracle() external view returns (address);
        function stableCoin() external view returns (address);
        function reserveCoin() external view returns (address);

        function scPrice(uint256 currentPaymentAmount) external view returns (uint256);
        function rcTargetPrice(uint256 currentPaymentAmount) external view returns (uint256);
        function rcBuyingPrice(uint256 currentPaymentAmount) external view returns (uint256);
        function R(uint256 currentPaymentAmount) external view returns (uint256);
        function ratio() external view returns (uint256);

        function scalingFactor() external view returns (uint256);
        function reserveRatioMin() external view returns (uint256);
        function reserveRatioMax() external view returns (uint256);
        function fee() external view returns (uint256);
        function treasuryFee() external view returns (uint256);
        function thresholdSupplySC() external view returns (uint256);
        function rcMinPrice() external view returns (uint256);
        function txLimit() external view returns (uint256);
    }

    /// Stable and reserve coin tokens
    interface IERC20 {
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    interface IOracle {
        function readData() external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, U256};
    use alloy_sol_types::{SolCall, SolValue};

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(IERC20::decimalsCall::SELECTOR, [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(IERC20::totalSupplyCall::SELECTOR, [0x18, 0x16, 0x0d, 0xdd]);
        assert_eq!(IERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(IDjed::scPriceCall::SIGNATURE, "scPrice(uint256)");
    }

    #[test]
    fn test_encode_balance_of() {
        let data = IERC20::balanceOfCall {
            account: Address::with_last_byte(0xaa),
        }
        .abi_encode();

        assert_eq!(
            hex::encode_prefixed(data),
            "0x70a0823100000000000000000000000000000000000000000000000000000000000000aa"
        );
    }

    #[test]
    fn test_decode_returns() {
        let word = U256::from(42u64).abi_encode();
        let price = IDjed::scPriceCall::abi_decode_returns(&word, true).unwrap();
        assert_eq!(price._0, U256::from(42u64));

        let addr = Address::repeat_byte(0x11).abi_encode();
        let oracle = IDjed::oracleCall::abi_decode_returns(&addr, true).unwrap();
        assert_eq!(oracle._0, Address::repeat_byte(0x11));
    }

    #[test]
    fn test_decode_rejects_bad_returns() {
        assert!(IERC20::totalSupplyCall::abi_decode_returns(&[], true).is_err());
        assert!(IERC20::totalSupplyCall::abi_decode_returns(&[0x12, 0x34], true).is_err());

        // 256 does not fit in uint8
        let too_big = U256::from(256u64).abi_encode();
        assert!(IERC20::decimalsCall::abi_decode_returns(&too_big, true).is_err());
    }
}
