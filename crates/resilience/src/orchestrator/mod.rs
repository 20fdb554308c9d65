//! Fallback orchestration for provider chains.
//!
//! The orchestrator runs one logical request through:
//! - Fresh cache lookup (a hit never touches a provider or limiter)
//! - Providers in priority order, each gated by its rate limiter and bounded
//!   by the call timeout (limiter waits are never charged to the timeout)
//! - Partial-result merging for batch requests
//! - Stale cache fallback when every provider failed
//!
//! Individual provider failures are recorded in a [`FallbackState`] and never
//! propagated directly; only [`FetchError::AllProvidersFailed`] or a stale
//! value crosses this boundary.

mod source;
mod state;

pub use source::{batch_source_fn, source_fn, BatchSource, FnBatchSource, FnSource, SingleSource};
pub use state::{AttemptOutcome, AttemptReport, FallbackState, ProviderAttempt};

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::cache::{Cache, Payload};
use crate::config::FallbackPolicy;
use crate::errors::{FailureKind, FetchError, ProviderFailure};
use crate::rate_limiter::RateLimiters;
use crate::ProviderId;

/// Where a returned value came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Freshness {
    /// Fetched from a provider during this request.
    Live,
    /// Served from a fresh cache entry.
    Cached,
    /// Every provider failed; served from an expired entry within the stale window.
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Stale => "stale",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Stale)
    }
}

impl Serialize for Freshness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A value plus how it was obtained.
#[derive(Clone, Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub freshness: Freshness,
    pub diagnostics: FallbackState,
}

impl<T> Fetched<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            freshness: self.freshness,
            diagnostics: self.diagnostics,
        }
    }
}

/// Fallback chain for a single-result request.
pub struct SinglePlan<T> {
    pub cache_key: String,
    pub ttl: Duration,
    pub sources: Vec<Arc<dyn SingleSource<T>>>,
}

impl<T> SinglePlan<T> {
    pub fn new(cache_key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl,
            sources: Vec::new(),
        }
    }

    /// Append a source; sources are tried in the order they are added.
    pub fn source(mut self, source: impl SingleSource<T> + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn shared_source(mut self, source: Arc<dyn SingleSource<T>>) -> Self {
        self.sources.push(source);
        self
    }
}

/// Fallback chain for a multi-key request that may be answered piecewise.
pub struct BatchPlan<T> {
    pub cache_key: String,
    pub ttl: Duration,
    pub keys: Vec<String>,
    pub sources: Vec<Arc<dyn BatchSource<T>>>,
    /// Suggested alternative surfaced when nothing could be resolved.
    pub hint: Option<String>,
}

impl<T> BatchPlan<T> {
    pub fn new(cache_key: impl Into<String>, ttl: Duration, keys: Vec<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl,
            keys,
            sources: Vec::new(),
            hint: None,
        }
    }

    pub fn source(mut self, source: impl BatchSource<T> + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn shared_source(mut self, source: Arc<dyn BatchSource<T>>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Runs fallback plans against the shared cache and rate limiters.
pub struct FallbackOrchestrator {
    cache: Arc<Cache>,
    limiters: Arc<RateLimiters>,
    policy: FallbackPolicy,
}

impl FallbackOrchestrator {
    pub fn new(cache: Arc<Cache>, limiters: Arc<RateLimiters>, policy: FallbackPolicy) -> Self {
        Self {
            cache,
            limiters,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn limiters(&self) -> &Arc<RateLimiters> {
        &self.limiters
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Run a single-result plan.
    ///
    /// 1. Fresh cache hit returns immediately
    /// 2. Sources in order; the first success is cached with the plan TTL
    /// 3. All failed: stale entry within `stale_max_age`, else an aggregated error
    pub async fn run<T>(&self, plan: &SinglePlan<T>) -> Result<Fetched<T>, FetchError>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        if let Some(value) = self.fresh::<T>(&plan.cache_key) {
            debug!("Cache hit for '{}'", plan.cache_key);
            return Ok(Fetched {
                value,
                freshness: Freshness::Cached,
                diagnostics: FallbackState::new(),
            });
        }

        let mut state = FallbackState::new();

        for source in &plan.sources {
            let provider = source.provider();
            if let Err(failure) = source.ready() {
                debug!(
                    "Skipping '{}' for '{}': {}",
                    provider, plan.cache_key, failure.message
                );
                state.record_failure(failure);
                continue;
            }
            self.limiters.acquire(&provider).await;

            match self.call(&provider, source.fetch()).await {
                Ok(value) => {
                    state.record_success(provider.clone(), 1);
                    self.store(&plan.cache_key, &value, plan.ttl);
                    debug!("'{}' answered by '{}'", plan.cache_key, provider);
                    return Ok(Fetched {
                        value,
                        freshness: Freshness::Live,
                        diagnostics: state,
                    });
                }
                Err(failure) => {
                    warn!(
                        "Provider '{}' failed for '{}' ({}, {:?}): {}",
                        provider,
                        plan.cache_key,
                        failure.kind,
                        failure.retry_class(),
                        failure.message
                    );
                    state.record_failure(failure);
                }
            }
        }

        self.stale_or_fail(&plan.cache_key, plan.sources.is_empty(), state, Vec::new(), None)
    }

    /// Run a batch plan, merging partial answers across providers.
    ///
    /// Each provider is asked only for the keys no earlier provider answered;
    /// an earlier answer is final. The merged set is cached under the plan's
    /// key with the shortest TTL among the plan and every contributing source.
    pub async fn run_batch<T>(
        &self,
        plan: &BatchPlan<T>,
    ) -> Result<Fetched<BTreeMap<String, T>>, FetchError>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        if let Some(value) = self.fresh::<BTreeMap<String, T>>(&plan.cache_key) {
            debug!("Cache hit for '{}'", plan.cache_key);
            return Ok(Fetched {
                value,
                freshness: Freshness::Cached,
                diagnostics: FallbackState::new(),
            });
        }

        let mut state = FallbackState::with_keys(plan.keys.iter().cloned());
        if state.is_complete() {
            return Ok(Fetched {
                value: BTreeMap::new(),
                freshness: Freshness::Live,
                diagnostics: state,
            });
        }

        let mut merged: BTreeMap<String, T> = BTreeMap::new();
        let mut ttl = plan.ttl;

        for source in &plan.sources {
            if state.is_complete() {
                break;
            }

            let provider = source.provider();
            let request = state.remaining().to_vec();
            let result = if source.per_key_calls() {
                self.fan_out(&provider, source.as_ref(), &request).await
            } else {
                self.limiters.acquire(&provider).await;
                self.call(&provider, source.fetch_batch(&request)).await
            };

            match result {
                Ok(found) => {
                    let answered = self.merge(&mut state, &mut merged, found);
                    if answered == 0 {
                        debug!(
                            "Provider '{}' resolved none of {} keys for '{}'",
                            provider,
                            request.len(),
                            plan.cache_key
                        );
                        state.record_failure(ProviderFailure::no_data(
                            provider,
                            "None of the requested keys were returned",
                        ));
                        continue;
                    }

                    if let Some(source_ttl) = source.ttl() {
                        ttl = ttl.min(source_ttl);
                    }
                    debug!(
                        "Provider '{}' resolved {}/{} keys for '{}'",
                        provider,
                        answered,
                        request.len(),
                        plan.cache_key
                    );
                    state.record_success(provider, answered);
                }
                Err(failure) => {
                    warn!(
                        "Provider '{}' failed for '{}' ({}, {:?}): {}",
                        provider,
                        plan.cache_key,
                        failure.kind,
                        failure.retry_class(),
                        failure.message
                    );
                    state.record_failure(failure);
                }
            }
        }

        if !merged.is_empty() {
            if !state.is_complete() {
                info!(
                    "Partial result for '{}': unresolved {:?}",
                    plan.cache_key,
                    state.remaining()
                );
            }
            self.store(&plan.cache_key, &merged, ttl);
            return Ok(Fetched {
                value: merged,
                freshness: Freshness::Live,
                diagnostics: state,
            });
        }

        let unresolved = state.remaining().to_vec();
        self.stale_or_fail(
            &plan.cache_key,
            plan.sources.is_empty(),
            state,
            unresolved,
            plan.hint.clone(),
        )
    }

    /// Ask a one-key-per-request source for each key in turn.
    ///
    /// Every call takes its own limiter slot and gets its own timeout, so a
    /// saturated quota delays later keys without failing them. Answers
    /// gathered before a failing key are kept; the source only fails when
    /// no key was answered and at least one call failed.
    async fn fan_out<T>(
        &self,
        provider: &ProviderId,
        source: &dyn BatchSource<T>,
        keys: &[String],
    ) -> Result<HashMap<String, T>, ProviderFailure> {
        let mut found = HashMap::new();
        let mut last_failure = None;

        for key in keys {
            self.limiters.acquire(provider).await;
            match self
                .call(provider, source.fetch_batch(std::slice::from_ref(key)))
                .await
            {
                Ok(answer) => found.extend(answer),
                Err(failure) => {
                    debug!("Provider '{}' failed for key '{}': {}", provider, key, failure);
                    last_failure = Some(failure);
                }
            }
        }

        match last_failure {
            Some(failure) if found.is_empty() => Err(failure),
            _ => Ok(found),
        }
    }

    /// Keep answers for outstanding keys only; returns how many were taken.
    fn merge<T>(
        &self,
        state: &mut FallbackState,
        merged: &mut BTreeMap<String, T>,
        found: HashMap<String, T>,
    ) -> usize {
        let mut answered = 0;
        for (key, value) in found {
            if state.resolve(&key) {
                merged.insert(key, value);
                answered += 1;
            }
        }
        answered
    }

    /// Await a provider call, bounded by the policy's call timeout.
    async fn call<T, F>(&self, provider: &ProviderId, call: F) -> Result<T, ProviderFailure>
    where
        F: Future<Output = Result<T, ProviderFailure>>,
    {
        match tokio::time::timeout(self.policy.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderFailure::new(
                provider.clone(),
                FailureKind::Timeout,
                format!("No response within {:?}", self.policy.call_timeout),
            )),
        }
    }

    fn stale_or_fail<V>(
        &self,
        cache_key: &str,
        no_sources: bool,
        state: FallbackState,
        unresolved: Vec<String>,
        hint: Option<String>,
    ) -> Result<Fetched<V>, FetchError>
    where
        V: DeserializeOwned,
    {
        let stale = self
            .cache
            .get_stale(cache_key, self.policy.stale_max_age)
            .and_then(|payload| decode::<V>(cache_key, &payload));

        if let Some(value) = stale {
            info!(
                "Returning stale cache for '{}' after: {}",
                cache_key,
                state.summary()
            );
            return Ok(Fetched {
                value,
                freshness: Freshness::Stale,
                diagnostics: state,
            });
        }

        if no_sources {
            return Err(FetchError::NoSources {
                cache_key: cache_key.to_string(),
            });
        }

        warn!("All providers failed for '{}': {}", cache_key, state.summary());
        Err(FetchError::AllProvidersFailed {
            attempts: state.into_failures(),
            unresolved,
            hint,
        })
    }

    fn fresh<V: DeserializeOwned>(&self, cache_key: &str) -> Option<V> {
        self.cache
            .get(cache_key)
            .and_then(|payload| decode(cache_key, &payload))
    }

    /// Cache `value`; a value that cannot be serialised is returned uncached.
    fn store<V: Serialize>(&self, cache_key: &str, value: &V, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(json) => self.cache.set(cache_key, Payload::from(json), ttl),
            Err(e) => warn!("Not caching '{}': {}", cache_key, e),
        }
    }
}

fn decode<V: DeserializeOwned>(cache_key: &str, payload: &Payload) -> Option<V> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring undecodable cache entry '{}': {}", cache_key, e);
            None
        }
    }
}
