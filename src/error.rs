//! Errors surfaced to callers and the small internal errors that never leave
//! a single module (see spec.md / SPEC_FULL.md §7).

use thiserror::Error;

/// Errors returned from `LoadBalancer::choose`.
///
/// Never thrown synchronously: every operation on `LoadBalancer` returns a
/// `Result`, so a caller's own error handling is always exercised through a
/// normal `match`/`?`, not a panic or an exception out of a strategy.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// `choose` was called while `activeClients` was empty.
    #[error("no endpoints available")]
    NoEndpointsAvailable,

    /// An operation was invoked after `shutdown()`.
    #[error("load balancer has been shut down")]
    ShutDown,

    /// The `choose` request was dropped before a selection completed, e.g.
    /// because `shutdown()` raced it.
    #[error("selection was cancelled")]
    Cancelled,

    /// A user-supplied weighting or selection strategy returned an error
    /// instead of panicking. Surfaced on `choose`'s result per §7, never
    /// allowed to poison the balancer.
    #[error("selection strategy failed: {0}")]
    Strategy(String),
}

/// Internal: a connect attempt failed. Mapped to a `Failed` event for the
/// affected Holder; never surfaced to callers.
#[derive(Debug, Error)]
#[error("connect failed: {0}")]
pub struct ConnectError(pub String);

/// Internal: the metrics subscription for an endpoint produced an error.
/// Logged; the Holder's prior metrics value is retained.
#[derive(Debug, Error)]
#[error("metrics subscription failed: {0}")]
pub struct MetricsError(pub String);
