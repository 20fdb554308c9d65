//! Fallback state for one logical request.
//!
//! Records every provider attempt in order together with the keys already
//! answered and the keys still outstanding. Returned to callers as
//! diagnostics so the fallback walk can be inspected after the fact.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::errors::ProviderFailure;
use crate::ProviderId;

/// What happened when a provider was tried.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    /// The provider answered this many keys (1 for single-result plans).
    Success { keys: usize },
    /// The provider failed; the chain moved on.
    Failed(ProviderFailure),
}

/// Record of a single provider attempt.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Ordered attempts plus the resolved/remaining key sets.
#[derive(Clone, Debug, Default)]
pub struct FallbackState {
    attempts: Vec<ProviderAttempt>,
    resolved: BTreeSet<String>,
    /// Outstanding keys, in the caller's order.
    remaining: Vec<String>,
}

impl FallbackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a batch with every key outstanding. Duplicates are collapsed.
    pub fn with_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = BTreeSet::new();
        let remaining = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();
        Self {
            attempts: Vec::new(),
            resolved: BTreeSet::new(),
            remaining,
        }
    }

    pub fn record_success(&mut self, provider: ProviderId, keys: usize) {
        self.attempts.push(ProviderAttempt {
            provider,
            outcome: AttemptOutcome::Success { keys },
        });
    }

    pub fn record_failure(&mut self, failure: ProviderFailure) {
        self.attempts.push(ProviderAttempt {
            provider: failure.provider.clone(),
            outcome: AttemptOutcome::Failed(failure),
        });
    }

    /// Move `key` from remaining to resolved.
    ///
    /// Returns false when the key was never requested or is already resolved;
    /// an earlier provider's answer is final.
    pub fn resolve(&mut self, key: &str) -> bool {
        match self.remaining.iter().position(|k| k == key) {
            Some(index) => {
                let key = self.remaining.remove(index);
                self.resolved.insert(key);
                true
            }
            None => false,
        }
    }

    pub fn attempts(&self) -> &[ProviderAttempt] {
        &self.attempts
    }

    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn resolved(&self) -> &BTreeSet<String> {
        &self.resolved
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(ProviderAttempt::is_success)
    }

    /// Providers that contributed data, in the order they were tried.
    pub fn contributors(&self) -> Vec<&ProviderId> {
        self.attempts
            .iter()
            .filter(|a| a.is_success())
            .map(|a| &a.provider)
            .collect()
    }

    /// Every failure, in the order the providers were tried.
    pub fn failures(&self) -> Vec<&ProviderFailure> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed(failure) => Some(failure),
                AttemptOutcome::Success { .. } => None,
            })
            .collect()
    }

    pub(crate) fn into_failures(self) -> Vec<ProviderFailure> {
        self.attempts
            .into_iter()
            .filter_map(|a| match a.outcome {
                AttemptOutcome::Failed(failure) => Some(failure),
                AttemptOutcome::Success { .. } => None,
            })
            .collect()
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success { keys } => format!("{}: SUCCESS ({})", a.provider, keys),
                AttemptOutcome::Failed(failure) => {
                    format!("{}: ERROR ({}: {})", a.provider, failure.kind, failure.message)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Serializable view for API responses.
    pub fn report(&self) -> Vec<AttemptReport> {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success { keys } => AttemptReport {
                    provider: a.provider.to_string(),
                    success: true,
                    keys: Some(*keys),
                    error: None,
                },
                AttemptOutcome::Failed(failure) => AttemptReport {
                    provider: a.provider.to_string(),
                    success: false,
                    keys: None,
                    error: Some(failure.message.clone()),
                },
            })
            .collect()
    }
}

/// One attempt as reported to API clients.
#[derive(Clone, Debug, Serialize)]
pub struct AttemptReport {
    pub provider: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
