//! SelectionPipeline (spec.md §4.E): snapshot the active set, weigh it, ask
//! the selection strategy for one endpoint.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::controller::Pools;
use crate::error::BalancerError;
use crate::holder::Holder;
use crate::traits::{SelectionStrategy, WeightingStrategy};

pub(crate) struct SelectionPipeline<C, M> {
    pools: Arc<Pools<C, M>>,
    weighting_strategy: Arc<dyn WeightingStrategy<C, M>>,
    selection_strategy: Arc<dyn SelectionStrategy<C>>,
}

impl<C, M> SelectionPipeline<C, M>
where
    C: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub(crate) fn new(
        pools: Arc<Pools<C, M>>,
        weighting_strategy: Arc<dyn WeightingStrategy<C, M>>,
        selection_strategy: Arc<dyn SelectionStrategy<C>>,
    ) -> Self {
        SelectionPipeline { pools, weighting_strategy, selection_strategy }
    }

    pub(crate) async fn choose(&self) -> Result<C, BalancerError> {
        let snapshot: Vec<Arc<Holder<C, M>>> = self.pools.active.read().clone();
        if snapshot.is_empty() {
            return Err(BalancerError::NoEndpointsAvailable);
        }

        // User-supplied strategies are untrusted code; a panic in either one
        // is caught and surfaced on the result instead of unwinding through
        // `choose` into the caller (spec.md §7).
        let weights = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.weighting_strategy.weigh(&snapshot)
        })) {
            Ok(weights) => weights,
            Err(_) => return Err(BalancerError::Strategy("weighting strategy panicked".into())),
        };
        let endpoints: Vec<C> = snapshot.iter().map(|h| h.endpoint().clone()).collect();

        let selected = AssertUnwindSafe(self.selection_strategy.select(&endpoints, &weights))
            .catch_unwind()
            .await;
        match selected {
            Ok(Some(endpoint)) => Ok(endpoint),
            Ok(None) => Err(BalancerError::NoEndpointsAvailable),
            Err(_) => Err(BalancerError::Strategy("selection strategy panicked".into())),
        }
    }
}
