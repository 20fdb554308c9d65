//! Integration tests for the fallback orchestrator.
//!
//! Every scenario drives time explicitly, either through a [`ManualClock`]
//! shared with the cache or a paused tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainfeed_resilience::{
    batch_source_fn, source_fn, BatchPlan, Cache, FailureKind, FallbackOrchestrator,
    FallbackPolicy, FetchError, Freshness, ManualClock, ProviderFailure, RateLimitConfig,
    RateLimiter, RateLimiters, SinglePlan,
};
use futures::FutureExt;

// =============================================================================
// Helpers
// =============================================================================

fn orchestrator_with_clock() -> (FallbackOrchestrator, ManualClock) {
    let clock = ManualClock::new();
    let cache = Arc::new(Cache::with_clock(1_000, Arc::new(clock.clone())));
    let orchestrator = FallbackOrchestrator::new(
        cache,
        Arc::new(RateLimiters::new()),
        FallbackPolicy {
            stale_max_age: Duration::from_secs(300),
            call_timeout: Duration::from_secs(10),
        },
    );
    (orchestrator, clock)
}

/// Shared log of which provider was called with which keys.
type CallLog = Arc<Mutex<Vec<(String, Vec<String>)>>>;

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

// =============================================================================
// Single-result plans
// =============================================================================

#[tokio::test]
async fn test_fallback_order_returns_second_provider() {
    let (orchestrator, _clock) = orchestrator_with_clock();
    let order = Arc::new(Mutex::new(Vec::new()));

    let order_a = order.clone();
    let order_b = order.clone();
    let plan = SinglePlan::new("gas:ethereum", Duration::from_secs(15))
        .source(source_fn("explorer", move || {
            order_a.lock().unwrap().push("explorer");
            async { Err(ProviderFailure::config("explorer", "No API key configured for ethereum")) }
                .boxed()
        }))
        .source(source_fn("rpc", move || {
            order_b.lock().unwrap().push("rpc");
            async { Ok(21.5f64) }.boxed()
        }));

    let fetched = orchestrator.run(&plan).await.unwrap();

    assert_eq!(fetched.value, 21.5);
    assert_eq!(fetched.freshness, Freshness::Live);
    assert_eq!(*order.lock().unwrap(), vec!["explorer", "rpc"]);

    let failures = fetched.diagnostics.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].provider, "explorer");
    assert_eq!(failures[0].kind, FailureKind::Config);
}

#[tokio::test]
async fn test_all_fail_returns_stale_value() {
    let (orchestrator, clock) = orchestrator_with_clock();

    let healthy = SinglePlan::new("fear_greed", Duration::from_secs(60))
        .source(source_fn("fear_greed", || async { Ok(55u32) }.boxed()));
    orchestrator.run(&healthy).await.unwrap();

    clock.advance(Duration::from_secs(120));

    let broken = SinglePlan::<u32>::new("fear_greed", Duration::from_secs(60)).source(source_fn(
        "fear_greed",
        || async { Err(ProviderFailure::status("fear_greed", 503, "Service Unavailable")) }.boxed(),
    ));
    let fetched = orchestrator.run(&broken).await.unwrap();

    assert_eq!(fetched.value, 55);
    assert_eq!(fetched.freshness, Freshness::Stale);
    assert_eq!(fetched.diagnostics.failures().len(), 1);
}

#[tokio::test]
async fn test_all_fail_without_stale_lists_every_provider() {
    let (orchestrator, clock) = orchestrator_with_clock();

    let healthy = SinglePlan::new("market_overview", Duration::from_secs(60))
        .source(source_fn("coingecko", || async { Ok(1u32) }.boxed()));
    orchestrator.run(&healthy).await.unwrap();

    // Past the stale window
    clock.advance(Duration::from_secs(301));

    let plan: SinglePlan<u32> = SinglePlan::new("market_overview", Duration::from_secs(60))
        .source(source_fn("coingecko", || {
            async { Err(ProviderFailure::rate_limited("coingecko")) }.boxed()
        }))
        .source(source_fn("coincap", || {
            async { Err(ProviderFailure::network("coincap", "connection refused")) }.boxed()
        }));

    let err = orchestrator.run(&plan).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("coingecko: Rate limit exceeded"));
    assert!(message.contains("coincap: connection refused"));

    match err {
        FetchError::AllProvidersFailed { attempts, .. } => {
            let providers: Vec<_> = attempts.iter().map(|a| a.provider.to_string()).collect();
            assert_eq!(providers, vec!["coingecko", "coincap"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_distinct_cache_keys_do_not_share_results() {
    let (orchestrator, _clock) = orchestrator_with_clock();

    let eth = SinglePlan::new("gas:ethereum", Duration::from_secs(15))
        .source(source_fn("rpc", || async { Ok(20.0f64) }.boxed()));
    let base = SinglePlan::new("gas:base", Duration::from_secs(15))
        .source(source_fn("rpc", || async { Ok(0.01f64) }.boxed()));

    assert_eq!(orchestrator.run(&eth).await.unwrap().value, 20.0);
    let fetched = orchestrator.run(&base).await.unwrap();
    assert_eq!(fetched.value, 0.01);
    assert_eq!(fetched.freshness, Freshness::Live);
}

// =============================================================================
// Batch plans
// =============================================================================

#[tokio::test]
async fn test_partial_batch_merge_queries_only_remaining_keys() {
    let (orchestrator, _clock) = orchestrator_with_clock();
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));

    let log_a = calls.clone();
    let log_b = calls.clone();
    let plan = BatchPlan::new("prices:1,2,3", Duration::from_secs(30), keys(&["1", "2", "3"]))
        .source(batch_source_fn("A", move |requested: Vec<String>| {
            log_a.lock().unwrap().push(("A".to_string(), requested));
            async { Ok(HashMap::from([("1".to_string(), 10u32), ("2".to_string(), 20u32)])) }
                .boxed()
        }))
        .source(batch_source_fn("B", move |requested: Vec<String>| {
            log_b.lock().unwrap().push(("B".to_string(), requested));
            async {
                // B also knows "1", but A's answer is final
                Ok(HashMap::from([("1".to_string(), 99u32), ("3".to_string(), 30u32)]))
            }
            .boxed()
        }));

    let fetched = orchestrator.run_batch(&plan).await.unwrap();

    assert_eq!(fetched.value.len(), 3);
    assert_eq!(fetched.value["1"], 10);
    assert_eq!(fetched.value["3"], 30);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, keys(&["1", "2", "3"]));
    assert_eq!(calls[1], ("B".to_string(), keys(&["3"])));
}

#[tokio::test]
async fn test_batch_stops_once_every_key_resolved() {
    let (orchestrator, _clock) = orchestrator_with_clock();
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));

    let log = calls.clone();
    let plan = BatchPlan::new("prices:BTC", Duration::from_secs(30), keys(&["BTC"]))
        .source(batch_source_fn("coingecko", |_keys| {
            async { Ok(HashMap::from([("BTC".to_string(), 65_000u32)])) }.boxed()
        }))
        .source(batch_source_fn("coincap", move |requested: Vec<String>| {
            log.lock().unwrap().push(("coincap".to_string(), requested));
            async { Ok(HashMap::new()) }.boxed()
        }));

    orchestrator.run_batch(&plan).await.unwrap();
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_batch_is_success_with_omissions() {
    let (orchestrator, _clock) = orchestrator_with_clock();
    let plan = BatchPlan::new("prices:BTC,NOPE", Duration::from_secs(30), keys(&["BTC", "NOPE"]))
        .source(batch_source_fn("coingecko", |_keys| {
            async { Ok(HashMap::from([("BTC".to_string(), 1u32)])) }.boxed()
        }))
        .source(batch_source_fn("dexscreener", |_keys| {
            async { Err(ProviderFailure::no_data("dexscreener", "No pairs found")) }.boxed()
        }));

    let fetched = orchestrator.run_batch(&plan).await.unwrap();
    assert_eq!(fetched.value.keys().collect::<Vec<_>>(), vec!["BTC"]);
    assert_eq!(fetched.diagnostics.remaining(), &["NOPE".to_string()]);
    assert_eq!(fetched.freshness, Freshness::Live);
}

#[tokio::test]
async fn test_batch_all_fail_enumerates_unresolved_keys() {
    let (orchestrator, _clock) = orchestrator_with_clock();
    let plan: BatchPlan<u32> =
        BatchPlan::new("prices:FOO,BAR", Duration::from_secs(30), keys(&["FOO", "BAR"]))
            .source(batch_source_fn("coingecko", |_keys| {
                async { Err(ProviderFailure::rate_limited("coingecko")) }.boxed()
            }))
            .hint("Try the full CoinGecko id, e.g. 'bitcoin'");

    let err = orchestrator.run_batch(&plan).await.unwrap_err();
    match err {
        FetchError::AllProvidersFailed {
            unresolved, hint, ..
        } => {
            assert_eq!(unresolved, keys(&["FOO", "BAR"]));
            assert!(hint.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_stale_fallback() {
    let (orchestrator, clock) = orchestrator_with_clock();

    let healthy = BatchPlan::new("prices:ETH", Duration::from_secs(30), keys(&["ETH"]))
        .source(batch_source_fn("coingecko", |_keys| {
            async { Ok(HashMap::from([("ETH".to_string(), 3_000u32)])) }.boxed()
        }));
    orchestrator.run_batch(&healthy).await.unwrap();

    clock.advance(Duration::from_secs(45));

    let broken: BatchPlan<u32> = BatchPlan::new("prices:ETH", Duration::from_secs(30), keys(&["ETH"]))
        .source(batch_source_fn("coingecko", |_keys| {
            async { Err(ProviderFailure::network("coingecko", "reset")) }.boxed()
        }));
    let fetched = orchestrator.run_batch(&broken).await.unwrap();

    assert_eq!(fetched.freshness, Freshness::Stale);
    assert_eq!(fetched.value["ETH"], 3_000);
}

// =============================================================================
// Rate limiting and timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_each_attempt_is_paced_by_its_limiter() {
    let limiter = Arc::new(RateLimiter::new(
        "coingecko",
        RateLimitConfig {
            max_calls: 1,
            window: Duration::from_secs(60),
        },
    ));
    let mut limiters = RateLimiters::new();
    limiters.insert(limiter.clone());

    let orchestrator = FallbackOrchestrator::new(
        Arc::new(Cache::new(100)),
        Arc::new(limiters),
        FallbackPolicy::default(),
    );

    let start = tokio::time::Instant::now();
    for symbol in ["BTC", "ETH"] {
        let plan = SinglePlan::new(format!("price:{symbol}"), Duration::from_secs(30))
            .source(source_fn("coingecko", || async { Ok(1u32) }.boxed()));
        orchestrator.run(&plan).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(limiter.in_window(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_recorded_as_failure() {
    let orchestrator = FallbackOrchestrator::new(
        Arc::new(Cache::new(100)),
        Arc::new(RateLimiters::new()),
        FallbackPolicy {
            stale_max_age: Duration::from_secs(300),
            call_timeout: Duration::from_secs(5),
        },
    );

    let plan: SinglePlan<u32> = SinglePlan::new("trending", Duration::from_secs(300)).source(
        source_fn("coingecko", || {
            async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(1u32)
            }
            .boxed()
        }),
    );

    let err = orchestrator.run(&plan).await.unwrap_err();
    assert_eq!(err.attempts().len(), 1);
    assert_eq!(err.attempts()[0].kind, FailureKind::Timeout);
}

fn saturated_orchestrator(provider: &'static str, call_timeout: Duration) -> (FallbackOrchestrator, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::new(
        provider,
        RateLimitConfig {
            max_calls: 1,
            window: Duration::from_secs(3),
        },
    ));
    let mut limiters = RateLimiters::new();
    limiters.insert(limiter.clone());

    let orchestrator = FallbackOrchestrator::new(
        Arc::new(Cache::new(100)),
        Arc::new(limiters),
        FallbackPolicy {
            stale_max_age: Duration::from_secs(300),
            call_timeout,
        },
    );
    (orchestrator, limiter)
}

#[tokio::test(start_paused = true)]
async fn test_per_key_source_waits_on_limiter_outside_call_timeout() {
    let (orchestrator, limiter) = saturated_orchestrator("dexscreener", Duration::from_secs(1));
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));

    let log_dex = log.clone();
    let plan = BatchPlan::new("dex_prices:AAA,BBB", Duration::from_secs(15), keys(&["AAA", "BBB"]))
        .source(
            batch_source_fn("dexscreener", move |requested| {
                log_dex
                    .lock()
                    .unwrap()
                    .push(("dexscreener".to_string(), requested.clone()));
                async move {
                    Ok(requested
                        .into_iter()
                        .map(|symbol| (symbol, 0.5f64))
                        .collect::<HashMap<_, _>>())
                }
                .boxed()
            })
            .with_per_key_calls(),
        );

    let start = tokio::time::Instant::now();
    let fetched = orchestrator.run_batch(&plan).await.unwrap();

    // The second key waited a full window for its slot, longer than the call timeout
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(fetched.freshness, Freshness::Live);
    assert_eq!(fetched.value.len(), 2);
    assert!(fetched.diagnostics.failures().is_empty());
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("dexscreener".to_string(), keys(&["AAA"])),
            ("dexscreener".to_string(), keys(&["BBB"])),
        ]
    );
    assert_eq!(limiter.in_window(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_key_source_keeps_answers_before_a_failing_key() {
    let (orchestrator, _limiter) = saturated_orchestrator("coincap", Duration::from_secs(1));

    let plan = BatchPlan::new("prices:AAA,BBB", Duration::from_secs(30), keys(&["AAA", "BBB"]))
        .source(
            batch_source_fn("coincap", |requested| {
                async move {
                    if requested == ["BBB"] {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok(HashMap::from([(requested[0].clone(), 2.0f64)]))
                }
                .boxed()
            })
            .with_per_key_calls(),
        );

    let fetched = orchestrator.run_batch(&plan).await.unwrap();

    assert_eq!(fetched.value.len(), 1);
    assert_eq!(fetched.value["AAA"], 2.0);
    assert_eq!(fetched.diagnostics.remaining().to_vec(), keys(&["BBB"]));
}

#[tokio::test(start_paused = true)]
async fn test_per_key_source_failing_every_key_reports_last_failure() {
    let (orchestrator, _limiter) = saturated_orchestrator("coincap", Duration::from_secs(1));

    let plan: BatchPlan<f64> =
        BatchPlan::new("prices:AAA,BBB", Duration::from_secs(30), keys(&["AAA", "BBB"])).source(
            batch_source_fn("coincap", |requested| {
                async move {
                    Err(ProviderFailure::no_data(
                        "coincap",
                        format!("Unknown asset {}", requested[0]),
                    ))
                }
                .boxed()
            })
            .with_per_key_calls(),
        );

    let err = orchestrator.run_batch(&plan).await.unwrap_err();
    assert_eq!(err.attempts().len(), 1);
    assert_eq!(err.attempts()[0].message, "Unknown asset BBB");
}
