//! Parameterised provider capabilities.
//!
//! Price, market and sentiment providers implement the resilience layer's
//! `SingleSource`/`BatchSource` directly. The capabilities here take request
//! parameters (a chain, an address, filters), so the service binds those per
//! request before handing the call to the orchestrator.

use async_trait::async_trait;
use chainfeed_resilience::{ProviderFailure, ProviderId};

use crate::models::{
    Chain, DefiYield, GasPrice, ProtocolFees, ProtocolTvl, Stablecoin, WalletBalance, YieldQuery,
};

/// A provider that reports gas price tiers for a chain.
///
/// # Example
///
/// ```ignore
/// struct FixedGas;
///
/// #[async_trait]
/// impl GasOracle for FixedGas {
///     fn provider(&self) -> ProviderId {
///         Cow::Borrowed("fixed")
///     }
///
///     async fn gas_price(&self, chain: Chain) -> Result<GasPrice, ProviderFailure> {
///         Ok(GasPrice { chain, slow_gwei: 1.0, standard_gwei: 2.0, fast_gwei: 3.0, source: "fixed".into() })
///     }
/// }
/// ```
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Identifier used for rate limiting and diagnostics.
    fn provider(&self) -> ProviderId;

    /// Whether `chain` can be served at all, checked without a network call.
    ///
    /// Runs before a rate-limit slot is taken, so a chain the provider
    /// cannot serve never consumes its quota.
    fn check(&self, _chain: Chain) -> Result<(), ProviderFailure> {
        Ok(())
    }

    /// Gas tiers for `chain`.
    ///
    /// Chains the provider cannot serve fail with an `Unsupported` or
    /// `Config` failure before any network call.
    async fn gas_price(&self, chain: Chain) -> Result<GasPrice, ProviderFailure>;
}

/// A provider that reports native-token balances.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Balance of `address` on `chain`, without a USD value.
    async fn native_balance(&self, chain: Chain, address: &str)
        -> Result<WalletBalance, ProviderFailure>;
}

/// A provider of DeFi aggregates: yields, TVL, fees and stablecoins.
#[async_trait]
pub trait DefiSource: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Pools matching `query`, largest TVL first, at most `query.limit`.
    async fn yields(&self, query: &YieldQuery) -> Result<Vec<DefiYield>, ProviderFailure>;

    /// The `limit` largest protocols by TVL.
    async fn top_protocols(&self, limit: usize) -> Result<Vec<ProtocolTvl>, ProviderFailure>;

    /// TVL of one protocol by slug (e.g. "aave").
    async fn protocol_tvl(&self, slug: &str) -> Result<ProtocolTvl, ProviderFailure>;

    /// The `limit` protocols with the highest 24h fees.
    async fn protocol_fees(&self, limit: usize) -> Result<Vec<ProtocolFees>, ProviderFailure>;

    /// The `limit` largest stablecoins by circulating supply.
    async fn stablecoins(&self, limit: usize) -> Result<Vec<Stablecoin>, ProviderFailure>;
}
