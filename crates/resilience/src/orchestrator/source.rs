//! Provider capability shapes consumed by the orchestrator.
//!
//! Concrete providers implement one of the two traits; the orchestrator only
//! sees success or failure and, for batches, which keys came back.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::errors::ProviderFailure;
use crate::ProviderId;

/// A provider that answers one logical request with one value.
///
/// # Example
///
/// ```ignore
/// struct FearGreedSource(Arc<FearGreedProvider>);
///
/// #[async_trait]
/// impl SingleSource<FearGreed> for FearGreedSource {
///     fn provider(&self) -> ProviderId {
///         Cow::Borrowed("fear_greed")
///     }
///
///     async fn fetch(&self) -> Result<FearGreed, ProviderFailure> {
///         self.0.fetch_index().await
///     }
/// }
/// ```
#[async_trait]
pub trait SingleSource<T>: Send + Sync {
    /// Identifier used for rate limiting and diagnostics.
    fn provider(&self) -> ProviderId;

    /// Pre-network check run before any rate-limit slot is taken.
    ///
    /// A source that already knows it cannot answer (missing credentials,
    /// unsupported target) reports that here and keeps its quota intact.
    fn ready(&self) -> Result<(), ProviderFailure> {
        Ok(())
    }

    async fn fetch(&self) -> Result<T, ProviderFailure>;
}

/// A provider that answers a set of keys, possibly only some of them.
#[async_trait]
pub trait BatchSource<T>: Send + Sync {
    /// Identifier used for rate limiting and diagnostics.
    fn provider(&self) -> ProviderId;

    /// Upper bound on how long this provider's answers should be cached.
    ///
    /// `None` defers to the plan's TTL.
    fn ttl(&self) -> Option<Duration> {
        None
    }

    /// Whether the upstream only answers one key per request.
    ///
    /// When set, the orchestrator calls [`fetch_batch`](Self::fetch_batch)
    /// once per outstanding key, taking a rate-limit slot and applying the
    /// call timeout to each call separately.
    fn per_key_calls(&self) -> bool {
        false
    }

    /// Fetch values for `keys`. Keys missing from the map are unresolved.
    async fn fetch_batch(&self, keys: &[String]) -> Result<HashMap<String, T>, ProviderFailure>;
}

/// A named closure acting as a [`SingleSource`].
pub struct FnSource<F> {
    provider: ProviderId,
    call: F,
}

/// Wrap an async closure as a single-result source.
pub fn source_fn<T, F>(provider: impl Into<ProviderId>, call: F) -> FnSource<F>
where
    F: Fn() -> BoxFuture<'static, Result<T, ProviderFailure>> + Send + Sync,
{
    FnSource {
        provider: provider.into(),
        call,
    }
}

#[async_trait]
impl<T, F> SingleSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn() -> BoxFuture<'static, Result<T, ProviderFailure>> + Send + Sync,
{
    fn provider(&self) -> ProviderId {
        self.provider.clone()
    }

    async fn fetch(&self) -> Result<T, ProviderFailure> {
        (self.call)().await
    }
}

/// A named closure acting as a [`BatchSource`].
pub struct FnBatchSource<F> {
    provider: ProviderId,
    ttl: Option<Duration>,
    per_key_calls: bool,
    call: F,
}

impl<F> FnBatchSource<F> {
    /// Cap the TTL of batches this source contributes to.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Have the orchestrator ask for one key per call.
    pub fn with_per_key_calls(mut self) -> Self {
        self.per_key_calls = true;
        self
    }
}

/// Wrap an async closure as a batch source.
pub fn batch_source_fn<T, F>(provider: impl Into<ProviderId>, call: F) -> FnBatchSource<F>
where
    F: Fn(Vec<String>) -> BoxFuture<'static, Result<HashMap<String, T>, ProviderFailure>>
        + Send
        + Sync,
{
    FnBatchSource {
        provider: provider.into(),
        ttl: None,
        per_key_calls: false,
        call,
    }
}

#[async_trait]
impl<T, F> BatchSource<T> for FnBatchSource<F>
where
    T: Send + 'static,
    F: Fn(Vec<String>) -> BoxFuture<'static, Result<HashMap<String, T>, ProviderFailure>>
        + Send
        + Sync,
{
    fn provider(&self) -> ProviderId {
        self.provider.clone()
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn per_key_calls(&self) -> bool {
        self.per_key_calls
    }

    async fn fetch_batch(&self, keys: &[String]) -> Result<HashMap<String, T>, ProviderFailure> {
        (self.call)(keys.to_vec()).await
    }
}
