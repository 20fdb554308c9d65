use serde::{Deserialize, Serialize};

use super::Chain;

/// Gas price tiers for one chain, in gwei.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasPrice {
    pub chain: Chain,
    pub slow_gwei: f64,
    pub standard_gwei: f64,
    pub fast_gwei: f64,
    pub source: String,
}
