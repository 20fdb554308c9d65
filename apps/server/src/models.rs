use chainfeed_resilience::{AttemptReport, Fetched, Freshness};
use serde::Serialize;

/// Envelope for every tool response.
#[derive(Serialize, Debug)]
pub struct ToolResponse<T> {
    pub data: T,
    pub freshness: Freshness,
    /// Providers that supplied `data`; empty for cached and stale answers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,
    /// Every provider tried during this request, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptReport>,
}

impl<T> From<Fetched<T>> for ToolResponse<T> {
    fn from(fetched: Fetched<T>) -> Self {
        Self {
            providers: fetched
                .diagnostics
                .contributors()
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
            attempts: fetched.diagnostics.report(),
            freshness: fetched.freshness,
            data: fetched.value,
        }
    }
}
