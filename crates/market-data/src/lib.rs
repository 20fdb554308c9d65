//! Chainfeed Market Data Crate
//!
//! This crate provides the crypto market data tools served by Chainfeed:
//! typed records, the concrete upstream providers, and the
//! [`MarketDataService`] that turns each tool request into a fallback plan
//! for the resilience layer.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Spot prices with partial fulfilment across CoinGecko, CoinCap and DexScreener
//! - Market overview and trending coins (CoinGecko)
//! - The Crypto Fear & Greed index (alternative.me)
//! - Gas prices from explorer gas oracles with a JSON-RPC fallback
//! - Native wallet balances over JSON-RPC, valued in USD
//! - DeFi yields, protocol TVL and fees, and stablecoin supply (DefiLlama)
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +----------------------+
//! |  Tool request    | --> |  MarketDataService   |  (cache key, TTL, source order)
//! +------------------+     +----------------------+
//!                                  |
//!                                  v
//!                       +----------------------+
//!                       | FallbackOrchestrator |  (chainfeed-resilience)
//!                       +----------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (CoinGecko, RPC, etc.)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceRecord`], [`MarketOverview`], [`TrendingCoin`], [`FearGreed`], [`GasPrice`] - Records
//! - [`DefiYield`], [`ProtocolTvl`], [`ProtocolFees`], [`Stablecoin`], [`WalletBalance`] - Records
//! - [`Chain`] - Supported EVM chains
//! - [`GasOracle`], [`BalanceOracle`], [`DefiSource`] - Parameterised capabilities
//! - [`ProviderSettings`] - Endpoints and credentials

pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod service;


pub use config::{ExplorerEndpoint, ProviderSettings};
pub use errors::{Result, ServiceError};
pub use models::{
    Chain, DefiYield, FearGreed, GasPrice, MarketOverview, ParseChainError, PriceRecord,
    ProtocolFees, ProtocolTvl, Stablecoin, TrendingCoin, WalletBalance, YieldQuery,
};
pub use provider::coincap::CoinCapProvider;
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::defillama::DefiLlamaProvider;
pub use provider::dexscreener::DexScreenerProvider;
pub use provider::explorer::ExplorerGasOracle;
pub use provider::fear_greed::FearGreedProvider;
pub use provider::rpc::RpcProvider;
pub use provider::{BalanceOracle, DefiSource, GasOracle};
pub use service::{MarketDataService, MarketDataServiceBuilder, MarketDataServiceTrait};
