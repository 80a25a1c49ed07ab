//! Health factor sources and address validation

mod aave;

pub use aave::AavePoolSource;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Produces the current health factor for an address
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Query the current health factor of `address`
    async fn health_factor(&self, address: &str) -> Result<f64>;
}

/// Format check applied to addresses before they reach the registry
pub trait AddressValidator: Send + Sync {
    /// Whether `candidate` is an acceptable address
    fn is_valid(&self, candidate: &str) -> bool;
}

static ETH_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"));

/// Accepts `0x`-prefixed 20-byte hex addresses.
///
/// Mixed-case input is not checked against its EIP-55 checksum.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthAddressValidator;

impl AddressValidator for EthAddressValidator {
    fn is_valid(&self, candidate: &str) -> bool {
        ETH_ADDRESS.is_match(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2", true)]
    #[case("0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2", true)]
    #[case("87870bca3f3fd6335c3f4ce8392d69350b4fa4e2", false)]
    #[case("0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e", false)]
    #[case("0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2ff", false)]
    #[case("0xZZ870bca3f3fd6335c3f4ce8392d69350b4fa4e2", false)]
    #[case("hello", false)]
    #[case("", false)]
    fn test_eth_address_validation(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(EthAddressValidator.is_valid(candidate), expected);
    }
}
