use serde::{Deserialize, Serialize};

use super::Chain;

/// Native-token balance of one address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub address: String,
    pub chain: Chain,
    /// Balance in whole native tokens (ETH, POL, BNB)
    pub balance_native: f64,
    /// USD value (2dp), when the native token could be priced
    #[serde(default)]
    pub balance_usd: Option<f64>,
    pub source: String,
}

/// Whether `address` looks like an EVM address: `0x` and 40 hex digits.
pub fn is_evm_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_evm_address() {
        assert!(is_evm_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_evm_address("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_evm_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604"));
        assert!(!is_evm_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604g"));
        assert!(!is_evm_address("vitalik.eth"));
    }
}
