//! Alternative.me Crypto Fear & Greed Index (keyless).

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{ProviderFailure, ProviderId, SingleSource};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::models::FearGreed;
use crate::provider::http::{build_client, send_json};

/// Provider ID constant
pub const PROVIDER_ID: &str = "fear_greed";

/// Attribution carried in the record
const SOURCE: &str = "alternative.me";

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    #[serde(default)]
    value_classification: String,
    /// Unix seconds, as a string
    timestamp: String,
}

pub struct FearGreedProvider {
    client: Client,
    base_url: String,
}

impl FearGreedProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_index(&self) -> Result<FearGreed, ProviderFailure> {
        let url = format!("{}/", self.base_url);
        let response: FngResponse = send_json(
            PROVIDER_ID,
            self.client
                .get(url)
                .query(&[("limit", "1"), ("format", "json")]),
        )
        .await?;
        parse_index(response)
    }
}

fn parse_index(response: FngResponse) -> Result<FearGreed, ProviderFailure> {
    let entry = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderFailure::no_data(PROVIDER_ID, "No data in response"))?;

    let value = entry
        .value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            ProviderFailure::decode(PROVIDER_ID, format!("Invalid index value: {}", entry.value))
        })?;

    let timestamp = entry
        .timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| {
            ProviderFailure::decode(PROVIDER_ID, format!("Invalid timestamp: {}", entry.timestamp))
        })?;

    Ok(FearGreed {
        value,
        classification: entry.value_classification,
        timestamp,
        source: SOURCE.to_string(),
    })
}

#[async_trait]
impl SingleSource<FearGreed> for FearGreedProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn fetch(&self) -> Result<FearGreed, ProviderFailure> {
        self.fetch_index().await
    }
}

#[cfg(test)]
mod tests {
    use chainfeed_resilience::FailureKind;

    use super::*;

    fn parse(json: &str) -> Result<FearGreed, ProviderFailure> {
        parse_index(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_parse_index() {
        let index = parse(
            r#"{"name": "Fear and Greed Index", "data": [
                {"value": "72", "value_classification": "Greed", "timestamp": "1717200000", "time_until_update": "3600"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(index.value, 72);
        assert_eq!(index.classification, "Greed");
        assert_eq!(index.timestamp.timestamp(), 1_717_200_000);
        assert_eq!(index.source, "alternative.me");
    }

    #[test]
    fn test_empty_data_is_no_data() {
        assert_eq!(parse(r#"{"data": []}"#).unwrap_err().kind, FailureKind::NoData);
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let err = parse(r#"{"data": [{"value": "140", "timestamp": "1717200000"}]}"#).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }
}
