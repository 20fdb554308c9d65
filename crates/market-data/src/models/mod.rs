//! Market data models
//!
//! This module contains the public record shapes returned by the tools:
//! - `chain` - Supported EVM chains ([`Chain`])
//! - `price` - Spot price records ([`PriceRecord`])
//! - `market` - Market-wide aggregates ([`MarketOverview`], [`TrendingCoin`], [`FearGreed`])
//! - `gas` - Gas price tiers ([`GasPrice`])
//! - `defi` - Yield pools, protocol TVL and fees, stablecoins
//! - `wallet` - Native balances ([`WalletBalance`])
//!
//! Every record is serde round-trippable; the orchestrator stores them in the
//! cache as JSON.

mod chain;
mod defi;
mod gas;
mod market;
mod price;
mod wallet;

pub use chain::{Chain, ParseChainError};
pub use defi::{DefiYield, ProtocolFees, ProtocolTvl, Stablecoin, YieldQuery};
pub use gas::GasPrice;
pub use market::{FearGreed, MarketOverview, TrendingCoin};
pub use price::PriceRecord;
pub use wallet::{is_evm_address, WalletBalance};

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
