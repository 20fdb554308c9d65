/// Classification for provider failures.
///
/// Used by the orchestrator's diagnostics to tell unhealthy providers apart
/// from providers that simply could not handle a request.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Provider looks unhealthy? |
/// |-------|-------------------|---------------------------|
/// | `FailoverWithPenalty` | Yes | Yes |
/// | `NextProvider` | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Failover to the next provider; the failure points at the provider.
    ///
    /// Used for transient errors like rate limiting (429), timeouts and
    /// upstream outages.
    FailoverWithPenalty,

    /// Try the next provider; this one cannot handle the request.
    ///
    /// Used for missing credentials, unsupported parameters and empty answers.
    NextProvider,
}
