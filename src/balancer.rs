//! LoadBalancer facade (spec.md §4.F): build-time configuration and the
//! public operations `choose`, `list_all_clients`, `list_active_clients`,
//! `shutdown`. Mirrors the teacher's `BalancerConfig`/`BalancerFactory`
//! (`examples/linkerd-linkerd-tcp/src/lb/config.rs`,
//! `.../src/balancer/factory.rs`) pattern: a plain config struct with a
//! `build` method, generalized from "build one concrete proxy" to "build a
//! generic load balancer over caller-supplied collaborators."

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::controller::{Collaborators, LifecycleController, Pools};
use crate::error::BalancerError;
use crate::membership::MembershipEvent;
use crate::selection::SelectionPipeline;
use crate::strategies::{
    default_backoff, identity_active_count_policy, EqualWeights, ImmediateSuccess, NeverFails,
    RoundRobin,
};
use crate::traits::{
    ActiveCountPolicy, Backoff, Connector, FailureSource, MetricsFactory, SelectionStrategy,
    WeightingStrategy,
};

/// Build-time configuration (spec.md §4.F). `metrics_factory` and
/// `membership` are the only required fields; everything else defaults to
/// the spec's stated defaults.
pub struct BalancerBuilder<C, M> {
    name: Option<String>,
    weighting_strategy: Arc<dyn WeightingStrategy<C, M>>,
    active_count_policy: ActiveCountPolicy,
    backoff: Backoff,
    selection_strategy: Arc<dyn SelectionStrategy<C>>,
    failure_source: Arc<dyn FailureSource<C>>,
    connector: Arc<dyn Connector<C>>,
    metrics_factory: Arc<dyn MetricsFactory<C, M>>,
}

impl<C, M> BalancerBuilder<C, M>
where
    C: Eq + Hash + Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// `metrics_factory` is the one collaborator with no sensible default
    /// (spec.md §4.F) and so is required up front; everything else can be
    /// overridden via the builder methods below.
    pub fn new(metrics_factory: Arc<dyn MetricsFactory<C, M>>) -> Self {
        BalancerBuilder {
            name: None,
            weighting_strategy: Arc::new(EqualWeights),
            active_count_policy: identity_active_count_policy(),
            backoff: default_backoff(),
            selection_strategy: Arc::new(RoundRobin::new()),
            failure_source: Arc::new(NeverFails::new()),
            connector: Arc::new(ImmediateSuccess),
            metrics_factory,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn weighting_strategy(mut self, strategy: Arc<dyn WeightingStrategy<C, M>>) -> Self {
        self.weighting_strategy = strategy;
        self
    }

    pub fn active_count_policy(mut self, policy: ActiveCountPolicy) -> Self {
        self.active_count_policy = policy;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn constant_backoff(self, duration: Duration) -> Self {
        self.backoff(crate::strategies::constant_backoff(duration))
    }

    pub fn selection_strategy(mut self, strategy: Arc<dyn SelectionStrategy<C>>) -> Self {
        self.selection_strategy = strategy;
        self
    }

    pub fn failure_source(mut self, source: Arc<dyn FailureSource<C>>) -> Self {
        self.failure_source = source;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector<C>>) -> Self {
        self.connector = connector;
        self
    }

    /// Builds the load balancer and starts pumping `membership` into the
    /// lifecycle controller.
    pub fn build<S>(self, membership: S) -> LoadBalancer<C, M>
    where
        S: Stream<Item = MembershipEvent<C>> + Send + 'static,
    {
        let pools = Arc::new(Pools::new());
        let collaborators = Arc::new(Collaborators {
            connector: self.connector,
            failure_source: self.failure_source,
            metrics_factory: self.metrics_factory,
            active_count_policy: self.active_count_policy,
            backoff: self.backoff,
        });
        let controller = Arc::new(LifecycleController::new(pools.clone(), collaborators));
        let selection = SelectionPipeline::new(pools.clone(), self.weighting_strategy, self.selection_strategy);

        let membership_task = {
            let controller = controller.clone();
            tokio::spawn(async move {
                tokio::pin!(membership);
                while let Some(event) = membership.next().await {
                    controller.dispatch(event);
                }
                // Stream completion does not terminate the load balancer
                // (spec.md §6).
            })
        };

        LoadBalancer {
            name: self.name,
            pools,
            controller,
            selection,
            membership_task,
            shut_down: AtomicBool::new(false),
        }
    }
}

pub struct LoadBalancer<C, M> {
    name: Option<String>,
    pools: Arc<Pools<C, M>>,
    controller: Arc<LifecycleController<C, M>>,
    selection: SelectionPipeline<C, M>,
    membership_task: JoinHandle<()>,
    shut_down: AtomicBool,
}

impl<C, M> LoadBalancer<C, M>
where
    C: Eq + Hash + Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Snapshots the active set, weighs it, and asks the selection strategy
    /// for one endpoint (spec.md §4.E).
    pub async fn choose(&self) -> Result<C, BalancerError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BalancerError::ShutDown);
        }
        self.selection.choose().await
    }

    /// Snapshot of the domain of `clients`: every known endpoint, in any
    /// state.
    pub async fn list_all_clients(&self) -> Vec<C> {
        self.pools.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of `activeClients`: endpoints currently `CONNECTED`.
    pub async fn list_active_clients(&self) -> Vec<C> {
        self.pools.active.read().iter().map(|h| h.endpoint().clone()).collect()
    }

    /// Unsubscribes the membership stream and every Holder's driver.
    /// Idempotent; subsequent `choose` calls return `ShutDown`.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.membership_task.abort();
        self.controller.shutdown_all();
    }
}
