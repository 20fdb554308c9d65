//! Sliding-window rate limiter for data providers.
//!
//! Each provider gets its own window: an ordered queue of call timestamps.
//! [`RateLimiter::acquire`] trims timestamps older than the window, waits
//! while the window is full, then records the call. Across any rolling
//! window no more than `max_calls` calls are recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::clock::{saturating_add, Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::ProviderId;

/// Sliding-window limiter for a single provider.
///
/// Thread-safe: concurrent `acquire()` calls serialize their check-and-append
/// step on an internal mutex, but sleep with the mutex released.
pub struct RateLimiter {
    provider: ProviderId,
    config: RateLimitConfig,
    /// Call timestamps in chronological order.
    calls: Mutex<VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter on the system clock.
    pub fn new(provider: impl Into<ProviderId>, config: RateLimitConfig) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a limiter that reads time from `clock`.
    ///
    /// `max_calls` is clamped to at least 1; a zero quota would block forever.
    pub fn with_clock(
        provider: impl Into<ProviderId>,
        mut config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        config.max_calls = config.max_calls.max(1);
        Self {
            provider: provider.into(),
            calls: Mutex::new(VecDeque::with_capacity(config.max_calls as usize)),
            config,
            clock,
        }
    }

    /// Lock the timestamp queue, recovering from poison if necessary.
    ///
    /// The queue is only ever trimmed or appended, so a poisoned lock still
    /// holds a chronologically ordered sequence.
    fn lock_calls(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.calls.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Rate limiter mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Drop every timestamp at or before `now - window` (a prefix of the queue).
    fn trim(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a call if the window has room, otherwise report how long until
    /// the oldest call leaves the window.
    fn check_and_record(&self) -> Result<(), Duration> {
        let mut calls = self.lock_calls();
        let now = self.clock.now();
        self.trim(&mut calls, now);

        if calls.len() < self.config.max_calls as usize {
            calls.push_back(now);
            return Ok(());
        }

        // Window is full; calls is non-empty because max_calls >= 1
        let oldest = calls.front().copied().unwrap_or(now);
        let wait = saturating_add(oldest, self.config.window).saturating_duration_since(now);
        Err(wait.max(Duration::from_millis(1)))
    }

    /// Wait until a call slot is free, then record the call.
    ///
    /// Cancel-safe: dropping the future while it waits records nothing.
    pub async fn acquire(&self) {
        loop {
            match self.check_and_record() {
                Ok(()) => {
                    debug!("Rate limiter: acquired slot for '{}'", self.provider);
                    return;
                }
                Err(wait) => {
                    debug!(
                        "Rate limiter: waiting {:?} for provider '{}'",
                        wait, self.provider
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Record a call only if a slot is free right now.
    pub fn try_acquire(&self) -> bool {
        self.check_and_record().is_ok()
    }

    /// Number of calls recorded inside the current window.
    pub fn in_window(&self) -> usize {
        let mut calls = self.lock_calls();
        let now = self.clock.now();
        self.trim(&mut calls, now);
        calls.len()
    }

    /// Forget every recorded call.
    pub fn reset(&self) {
        self.lock_calls().clear();
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Per-provider limiters, built once at startup and shared by every request.
#[derive(Default)]
pub struct RateLimiters {
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one limiter per configured provider.
    pub fn from_configs(configs: &HashMap<String, RateLimitConfig>) -> Self {
        Self::from_configs_with_clock(configs, Arc::new(SystemClock))
    }

    pub fn from_configs_with_clock(
        configs: &HashMap<String, RateLimitConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut limiters = Self::new();
        for (provider, config) in configs {
            limiters.insert(Arc::new(RateLimiter::with_clock(
                provider.clone(),
                config.clone(),
                clock.clone(),
            )));
        }
        limiters
    }

    /// Register (or replace) a provider's limiter.
    pub fn insert(&mut self, limiter: Arc<RateLimiter>) {
        self.limiters.insert(limiter.provider().to_string(), limiter);
    }

    /// The shared limiter for `provider`, if one is configured.
    pub fn get(&self, provider: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(provider).cloned()
    }

    /// Wait on `provider`'s limiter; providers without one are not paced.
    pub async fn acquire(&self, provider: &str) {
        match self.limiters.get(provider) {
            Some(limiter) => limiter.acquire().await,
            None => debug!("Rate limiter: no limit configured for '{}'", provider),
        }
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
