//! Error types and retry classification for the resilience layer.
//!
//! This module provides:
//! - [`ProviderFailure`]: One provider could not satisfy one attempt
//! - [`FailureKind`]: Why it failed (credential problem, outage, bad input, ...)
//! - [`FetchError`]: What crosses the orchestrator boundary
//! - [`RetryClass`]: Classification recorded in fallback diagnostics

mod retry;

pub use retry::RetryClass;

use std::fmt;

use thiserror::Error;

use crate::ProviderId;

/// Why a single provider attempt failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// Transport-level error (DNS, connection reset, TLS).
    Network,
    /// The provider answered with a non-success HTTP status.
    Status(u16),
    /// The provider rate limited the request (HTTP 429).
    RateLimited,
    /// The call did not finish within the configured timeout.
    Timeout,
    /// Missing credential or endpoint; raised before any network call.
    Config,
    /// The provider does not handle this parameter (e.g. an unsupported chain).
    Unsupported,
    /// The provider answered but had nothing for the request.
    NoData,
    /// The response could not be decoded.
    Decode,
}

impl FailureKind {
    /// Returns the retry classification for this failure.
    ///
    /// Every class continues the fallback chain; the class only tells the
    /// diagnostics whether the provider itself looks unhealthy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network | Self::Status(_) | Self::RateLimited | Self::Timeout => {
                RetryClass::FailoverWithPenalty
            }
            Self::Config | Self::Unsupported | Self::NoData | Self::Decode => {
                RetryClass::NextProvider
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Status(code) => write!(f, "status {}", code),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Timeout => write!(f, "timeout"),
            Self::Config => write!(f, "config"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::NoData => write!(f, "no data"),
            Self::Decode => write!(f, "decode"),
        }
    }
}

/// A single provider could not satisfy the request.
///
/// Configuration problems share this shape so they take part in fallback
/// ordering like any other failure.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("[{provider}] {message}")]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<ProviderId>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn network(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::Network, message)
    }

    pub fn status(provider: impl Into<ProviderId>, code: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        Self::new(
            provider,
            FailureKind::Status(code),
            format!("HTTP {}: {}", code, snippet),
        )
    }

    pub fn rate_limited(provider: impl Into<ProviderId>) -> Self {
        Self::new(provider, FailureKind::RateLimited, "Rate limit exceeded")
    }

    pub fn config(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::Config, message)
    }

    pub fn unsupported(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::Unsupported, message)
    }

    pub fn no_data(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::NoData, message)
    }

    pub fn decode(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::Decode, message)
    }

    pub fn retry_class(&self) -> RetryClass {
        self.kind.retry_class()
    }
}

/// Errors that cross the orchestrator boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every source in the plan failed and no cached value could substitute.
    #[error("All providers failed: {}", describe_attempts(.attempts, .unresolved, .hint.as_deref()))]
    AllProvidersFailed {
        /// Each attempt's failure, in priority order.
        attempts: Vec<ProviderFailure>,
        /// Keys nobody answered (batch plans only).
        unresolved: Vec<String>,
        /// Suggested alternative input supplied by the plan.
        hint: Option<String>,
    },

    /// The plan had no sources and nothing was cached.
    #[error("No providers configured for '{cache_key}'")]
    NoSources { cache_key: String },
}

impl FetchError {
    /// Individual provider failures, empty for non-provider errors.
    pub fn attempts(&self) -> &[ProviderFailure] {
        match self {
            Self::AllProvidersFailed { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

fn describe_attempts(attempts: &[ProviderFailure], unresolved: &[String], hint: Option<&str>) -> String {
    let mut out = if attempts.is_empty() {
        "no attempts were made".to_string()
    } else {
        attempts
            .iter()
            .map(|a| format!("{}: {}", a.provider, a.message))
            .collect::<Vec<_>>()
            .join("; ")
    };
    if !unresolved.is_empty() {
        out.push_str(&format!(" (unresolved: {})", unresolved.join(", ")));
    }
    if let Some(hint) = hint {
        out.push_str(&format!(". {}", hint));
    }
    out
}
