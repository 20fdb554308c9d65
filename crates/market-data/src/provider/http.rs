//! Shared HTTP plumbing: client construction and response-to-failure mapping.

use std::time::Duration;

use chainfeed_resilience::{FailureKind, ProviderFailure};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("chainfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send `request` and decode a JSON body.
///
/// - transport error: `Network` (`Timeout` when the client timer fired)
/// - HTTP 429: `RateLimited`
/// - any other non-2xx: `Status` with a truncated body
/// - undecodable body: `Decode`
///
/// Request URLs are stripped from transport errors since some carry API keys.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_failure(provider, e))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderFailure::rate_limited(provider));
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_failure(provider, e))?;

    if !status.is_success() {
        return Err(ProviderFailure::status(provider, status.as_u16(), &body));
    }

    decode_body(provider, &body)
}

pub(crate) fn decode_body<T: DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, ProviderFailure> {
    serde_json::from_str(body)
        .map_err(|e| ProviderFailure::decode(provider, format!("Invalid response: {}", e)))
}

fn transport_failure(provider: &'static str, error: reqwest::Error) -> ProviderFailure {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    ProviderFailure::new(
        provider,
        kind,
        format!("HTTP error: {}", error.without_url()),
    )
}

/// Accept a number, a numeric string, or null.
///
/// Several free APIs send prices as strings, and some switch between the two.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    Ok(
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(NumberOrString::Number(n)) => Some(n),
            Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().ok(),
            None => None,
        }
        .filter(|n| n.is_finite()),
    )
}
