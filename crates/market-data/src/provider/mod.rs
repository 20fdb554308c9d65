//! Concrete data providers.
//!
//! This module contains:
//! - Parameterised capabilities ([`GasOracle`], [`BalanceOracle`], [`DefiSource`])
//! - Shared HTTP plumbing (client construction, error mapping)
//! - One module per upstream API
//!
//! # Architecture
//!
//! Providers never see each other or the cache. Each one turns an HTTP
//! response into typed records and reports failures as `ProviderFailure`;
//! ordering, rate limiting, caching and fallback are the orchestrator's job.
//!
//! | Provider      | Capability                                   |
//! |---------------|----------------------------------------------|
//! | coingecko     | prices (batch), market overview, trending    |
//! | coincap       | prices (batch, one request per symbol)       |
//! | dexscreener   | prices (batch, one search per symbol)        |
//! | fear_greed    | fear & greed index                           |
//! | explorer      | gas oracle (ethereum, arbitrum, base)        |
//! | rpc           | gas and native balances over JSON-RPC        |
//! | defillama     | yields, protocol TVL and fees, stablecoins   |

mod http;
mod traits;

pub mod coincap;
pub mod coingecko;
pub mod defillama;
pub mod dexscreener;
pub mod explorer;
pub mod fear_greed;
pub mod rpc;

pub use traits::{BalanceOracle, DefiSource, GasOracle};
