use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EVM chains the gas tools understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Base,
    Arbitrum,
    Polygon,
    Optimism,
    Bsc,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Ethereum,
        Chain::Base,
        Chain::Arbitrum,
        Chain::Polygon,
        Chain::Optimism,
        Chain::Bsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum",
            Chain::Polygon => "polygon",
            Chain::Optimism => "optimism",
            Chain::Bsc => "bsc",
        }
    }

    /// Ticker of the chain's gas token.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Base | Chain::Arbitrum | Chain::Optimism => "ETH",
            Chain::Polygon => "POL",
            Chain::Bsc => "BNB",
        }
    }

    /// Keyless PublicNode endpoint, used when no RPC URL is configured.
    pub fn public_rpc_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://ethereum-rpc.publicnode.com",
            Chain::Base => "https://base-rpc.publicnode.com",
            Chain::Arbitrum => "https://arbitrum-one-rpc.publicnode.com",
            Chain::Polygon => "https://polygon-bor-rpc.publicnode.com",
            Chain::Optimism => "https://optimism-rpc.publicnode.com",
            Chain::Bsc => "https://bsc-rpc.publicnode.com",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Unsupported chain: {0}. Supported: ethereum, base, arbitrum, polygon, optimism, bsc")]
pub struct ParseChainError(pub String);

impl FromStr for Chain {
    type Err = ParseChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Chain::ALL
            .into_iter()
            .find(|chain| chain.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseChainError(s.to_string()))
    }
}
