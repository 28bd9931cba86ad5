//! Default strategy implementations (spec.md §4.F):
//! equal weights, identity active-count policy, 10s constant backoff,
//! round-robin selection, never-fails FailureSource, immediate-success
//! Connector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ConnectError;
use crate::holder::Holder;
use crate::traits::{
    ActiveCountPolicy, Backoff, Connector, FailureSignal, FailureSource, SelectionStrategy,
    WeightingStrategy,
};

/// `weightingStrategy` default: every active endpoint gets weight 1.
pub struct EqualWeights;

impl<C, M> WeightingStrategy<C, M> for EqualWeights {
    fn weigh(&self, snapshot: &[Arc<Holder<C, M>>]) -> Vec<f64> {
        vec![1.0; snapshot.len()]
    }
}

/// `activeCountPolicy` default: every known endpoint should be acquired.
pub fn identity_active_count_policy() -> ActiveCountPolicy {
    Arc::new(|n_total: usize| n_total)
}

/// `backoff` default: 10s constant, regardless of `quarantineCount`.
pub fn constant_backoff(duration: Duration) -> Backoff {
    Arc::new(move |_quarantine_count: usize| duration)
}

pub fn default_backoff() -> Backoff {
    constant_backoff(Duration::from_secs(10))
}

/// `selectionStrategy` default: round-robin over endpoints with weight > 0.
///
/// Stateful only in its cursor; the weighted pair itself stays
/// side-effect-free, matching spec.md §4.E "selection is stateless at this
/// layer; any round-robin cursor... lives inside the selection strategy."
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        RoundRobin { cursor: AtomicUsize::new(0) }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C> SelectionStrategy<C> for RoundRobin
where
    C: Clone + Send + Sync,
{
    async fn select(&self, endpoints: &[C], weights: &[f64]) -> Option<C> {
        let eligible: Vec<&C> = endpoints
            .iter()
            .zip(weights.iter())
            .filter(|(_, &w)| w > 0.0)
            .map(|(e, _)| e)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % eligible.len();
        Some(eligible[i].clone())
    }
}

/// `failureSource` default: never fails. The returned receiver never yields
/// an item because the matching sender is held open for the lifetime of
/// this strategy instead of being dropped.
pub struct NeverFails {
    // Keeps every subscription's sender alive so the receiver never
    // observes a closed channel, matching "the stream never completes".
    held: Mutex<Vec<mpsc::UnboundedSender<FailureSignal>>>,
}

impl NeverFails {
    pub fn new() -> Self {
        NeverFails { held: Mutex::new(Vec::new()) }
    }
}

impl Default for NeverFails {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FailureSource<C> for NeverFails {
    fn subscribe(&self, _endpoint: &C) -> mpsc::UnboundedReceiver<FailureSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.held.lock().push(tx);
        rx
    }
}

/// `connector` default: every connect attempt succeeds immediately.
pub struct ImmediateSuccess;

#[async_trait]
impl<C> Connector<C> for ImmediateSuccess
where
    C: Send + Sync,
{
    async fn connect(&self, _endpoint: &C) -> Result<(), ConnectError> {
        Ok(())
    }
}
