//! External-collaborator interfaces (spec.md §6).
//!
//! These are the seams the balancer core is built against. Concrete
//! transports, failure detectors, metrics sources, and selection
//! algorithms are supplied by the caller and never implemented here — see
//! spec.md §1 "Out of scope".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ConnectError, MetricsError};
use crate::holder::Holder;

/// A reason string for a single failure emission. The source never
/// completes under normal operation (spec.md §6).
pub type FailureSignal = String;

/// `endpoint -> async endpoint`: attempts a connection. Must be idempotent
/// with respect to repeated invocations; the balancer may call it multiple
/// times per endpoint across reconnects.
#[async_trait]
pub trait Connector<C>: Send + Sync {
    async fn connect(&self, endpoint: &C) -> Result<(), ConnectError>;
}

/// `endpoint -> async stream of error`. Each emission is one failure.
pub trait FailureSource<C>: Send + Sync {
    fn subscribe(&self, endpoint: &C) -> mpsc::UnboundedReceiver<FailureSignal>;
}

/// `endpoint -> async stream of metrics snapshots`. Latest value wins; an
/// error emission is logged and the Holder's prior metrics value retained.
pub trait MetricsFactory<C, M>: Send + Sync {
    fn subscribe(&self, endpoint: &C) -> mpsc::UnboundedReceiver<Result<M, MetricsError>>;
}

/// Pure function `snapshot([Holder]) -> weights[]`, `weights[i] >= 0`.
///
/// Returns one weight per element of `snapshot`, in the same order.
pub trait WeightingStrategy<C, M>: Send + Sync {
    fn weigh(&self, snapshot: &[Arc<Holder<C, M>>]) -> Vec<f64>;
}

/// Pure function `(endpoints[], weights[]) -> async endpoint`. May be
/// stateful internally (round-robin cursor, reservoir sample, ...).
#[async_trait]
pub trait SelectionStrategy<C>: Send + Sync
where
    C: Clone + Send + Sync,
{
    async fn select(&self, endpoints: &[C], weights: &[f64]) -> Option<C>;
}

/// `total_endpoints -> desired_acquired`.
pub type ActiveCountPolicy = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// `quarantineCount -> duration >= 0`.
pub type Backoff = Arc<dyn Fn(usize) -> Duration + Send + Sync>;
