//! LifecycleController (spec.md §4.D): wires Holders into the state graph,
//! consumes membership events, and enforces the active-count policy.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::holder::{Holder, HolderEvent, HolderState, Subscriptions};
use crate::membership::{MembershipEvent, MembershipKind};
use crate::queue::RandomizedQueue;
use crate::state_machine::{self, Fsm};
use crate::traits::{ActiveCountPolicy, Backoff, Connector, FailureSource, MetricsFactory};

/// The four collections of spec.md §3, shared between the controller and
/// every Holder's own state machine.
pub(crate) struct Pools<C, M> {
    pub clients: DashMap<C, Arc<Holder<C, M>>>,
    pub idle: RandomizedQueue<Arc<Holder<C, M>>>,
    pub acquired: DashSet<C>,
    pub active: RwLock<Vec<Arc<Holder<C, M>>>>,
}

impl<C: Eq + Hash, M> Pools<C, M> {
    pub(crate) fn new() -> Self {
        Pools {
            clients: DashMap::new(),
            idle: RandomizedQueue::new(),
            acquired: DashSet::new(),
            active: RwLock::new(Vec::new()),
        }
    }
}

/// The collaborators and policies the controller and Holders consult,
/// bundled so a `HolderFsm` can carry one `Arc` instead of five.
pub(crate) struct Collaborators<C, M> {
    pub connector: Arc<dyn Connector<C>>,
    pub failure_source: Arc<dyn FailureSource<C>>,
    pub metrics_factory: Arc<dyn MetricsFactory<C, M>>,
    pub active_count_policy: ActiveCountPolicy,
    pub backoff: Backoff,
}

/// Re-evaluates the active-count policy and, if under-acquired, promotes
/// one arbitrary idle Holder to `CONNECTING`. Called on every `IDLE` entry
/// (spec.md §4.D) and, per the REDESIGN note of spec.md §9, on every `ADD`
/// as well — so a burst of simultaneous ADDs doesn't under-acquire while
/// every Holder is still transitioning into `IDLE`.
fn reconsider_active_count<C, M>(pools: &Pools<C, M>, collaborators: &Collaborators<C, M>)
where
    C: Eq + Hash + Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    let total = pools.clients.len();
    let desired = (collaborators.active_count_policy)(total);
    if desired > pools.acquired.len() {
        if let Some(candidate) = pools.idle.poll_random() {
            candidate.submit(HolderEvent::Connect);
        }
    }
}

/// The `Fsm` implementation for a single Holder's state graph. One instance
/// per Holder; `holder` is this machine's context (spec.md §9 "cyclic
/// reference between Holder and its state machine").
struct HolderFsm<C, M> {
    holder: Arc<Holder<C, M>>,
    pools: Arc<Pools<C, M>>,
    collaborators: Arc<Collaborators<C, M>>,
}

#[async_trait]
impl<C, M> Fsm for HolderFsm<C, M>
where
    C: Eq + Hash + Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    type State = HolderState;
    type Event = HolderEvent;

    fn transition(&self, state: HolderState, event: HolderEvent) -> Option<HolderState> {
        use HolderEvent::*;
        use HolderState::*;
        match (state, event) {
            (Idle, Connect) => Some(Connecting),
            (Idle, Failed) => Some(Quarantined),
            (Idle, Connected) => Some(Connected),
            (Idle, Remove) => Some(Removed),

            (Connecting, Connected) => Some(Connected),
            (Connecting, Failed) => Some(Quarantined),
            (Connecting, Remove) => Some(Removed),

            (Connected, Failed) => Some(Quarantined),
            (Connected, Remove) => Some(Removed),
            (Connected, Stop) => Some(Idle),

            (Quarantined, Unquarantine) => Some(Idle),
            (Quarantined, Remove) => Some(Removed),
            (Quarantined, Connected) => Some(Connected),

            _ => None,
        }
    }

    fn is_ignored(&self, state: HolderState, event: HolderEvent) -> bool {
        use HolderEvent::*;
        use HolderState::*;
        matches!(
            (state, event),
            (Connected, Connected) | (Connected, Connect) | (Quarantined, Failed)
        )
    }

    async fn on_enter(&self, state: HolderState) -> Option<HolderEvent> {
        match state {
            HolderState::Idle => {
                self.holder.set_state(HolderState::Idle);
                self.pools.idle.offer(self.holder.clone());
                reconsider_active_count(&self.pools, &self.collaborators);
                None
            }
            HolderState::Connecting => {
                self.holder.set_state(HolderState::Connecting);
                self.pools.acquired.insert(self.holder.endpoint().clone());
                spawn_connect(self.holder.clone(), self.collaborators.connector.clone());
                None
            }
            HolderState::Connected => {
                self.holder.set_state(HolderState::Connected);
                self.holder.reset_quarantine_count();
                self.pools.active.write().push(self.holder.clone());
                None
            }
            HolderState::Quarantined => {
                self.holder.set_state(HolderState::Quarantined);
                self.pools.acquired.remove(self.holder.endpoint());
                self.holder.cancel_connect_task();
                // Only a real transition into QUARANTINED bumps the counter;
                // `is_ignored` keeps a repeat FAILED from ever reaching here
                // while already quarantined (spec.md §4.D).
                let count = self.holder.record_failure();
                let delay = (self.collaborators.backoff)(count);
                let holder = self.holder.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    holder.submit(HolderEvent::Unquarantine);
                });
                None
            }
            HolderState::Removed => {
                self.holder.set_state(HolderState::Removed);
                let endpoint = self.holder.endpoint().clone();
                self.pools.active.write().retain(|h| h.endpoint() != &endpoint);
                self.pools.idle.remove(&self.holder);
                self.pools.acquired.remove(&endpoint);
                self.pools.clients.remove(&endpoint);
                self.holder.shutdown();
                None
            }
        }
    }

    async fn on_exit(&self, state: HolderState) -> Option<HolderEvent> {
        if state == HolderState::Connected {
            let endpoint = self.holder.endpoint().clone();
            self.pools.active.write().retain(|h| h.endpoint() != &endpoint);
        }
        None
    }
}

/// Spawns a connect attempt, stored as the Holder's `connectTask`. Success
/// submits `Connected`; failure submits `Failed`. The quarantine counter is
/// only bumped on the actual `QUARANTINED` entry, not here, so a `Failed`
/// that the FSM ignores (already quarantined) never double-counts.
fn spawn_connect<C, M>(holder: Arc<Holder<C, M>>, connector: Arc<dyn Connector<C>>)
where
    C: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    let task_holder = holder.clone();
    let task = tokio::spawn(async move {
        match connector.connect(task_holder.endpoint()).await {
            Ok(()) => task_holder.submit(HolderEvent::Connected),
            Err(err) => {
                log::debug!("connect failed: {err}");
                task_holder.submit(HolderEvent::Failed);
            }
        }
    });
    holder.replace_connect_task(task);
}

async fn metrics_loop<C, M>(
    holder: Arc<Holder<C, M>>,
    mut rx: mpsc::UnboundedReceiver<Result<M, crate::error::MetricsError>>,
) where
    M: Send + Sync + 'static,
{
    while let Some(update) = rx.recv().await {
        match update {
            Ok(metrics) => holder.set_metrics(metrics),
            Err(err) => log::warn!("metrics subscription error, retaining prior value: {err}"),
        }
    }
}

async fn failure_loop<C, M>(holder: Arc<Holder<C, M>>, mut rx: mpsc::UnboundedReceiver<String>)
where
    M: Send + Sync + 'static,
{
    while let Some(reason) = rx.recv().await {
        log::debug!("failure signal for endpoint: {reason}");
        holder.submit(HolderEvent::Failed);
    }
}

pub(crate) struct LifecycleController<C, M> {
    pools: Arc<Pools<C, M>>,
    collaborators: Arc<Collaborators<C, M>>,
}

impl<C, M> LifecycleController<C, M>
where
    C: Eq + Hash + Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    pub(crate) fn new(pools: Arc<Pools<C, M>>, collaborators: Arc<Collaborators<C, M>>) -> Self {
        LifecycleController { pools, collaborators }
    }

    pub(crate) fn dispatch(&self, event: MembershipEvent<C>) {
        match event.kind {
            MembershipKind::Add => self.handle_add(event.endpoint),
            MembershipKind::Remove => self.handle_remove(&event.endpoint),
        }
    }

    fn handle_add(&self, endpoint: C) {
        let holder = Holder::new(endpoint.clone());
        match self.pools.clients.entry(endpoint) {
            Entry::Occupied(_) => return, // known endpoint: ADD is ignored
            Entry::Vacant(slot) => {
                slot.insert(holder.clone());
            }
        }
        self.initialize(holder);
        reconsider_active_count(&self.pools, &self.collaborators);
    }

    fn handle_remove(&self, endpoint: &C) {
        if let Some(holder) = self.pools.clients.get(endpoint) {
            holder.submit(HolderEvent::Remove);
        }
        // Unknown endpoint + non-ADD: ignored.
    }

    fn initialize(&self, holder: Arc<Holder<C, M>>) {
        let metrics_rx = self.collaborators.metrics_factory.subscribe(holder.endpoint());
        let metrics_task = tokio::spawn(metrics_loop(holder.clone(), metrics_rx));

        let failure_rx = self.collaborators.failure_source.subscribe(holder.endpoint());
        let failure_task = tokio::spawn(failure_loop(holder.clone(), failure_rx));

        let fsm = Arc::new(HolderFsm {
            holder: holder.clone(),
            pools: self.pools.clone(),
            collaborators: self.collaborators.clone(),
        });
        let fsm_handle = state_machine::spawn(fsm, HolderState::Idle);

        holder.set_subscriptions(Subscriptions { metrics_task, failure_task, fsm: fsm_handle });
    }

    /// Releases every Holder's subscriptions, bypassing the normal `REMOVE`
    /// state graph — used only by `LoadBalancer::shutdown`.
    pub(crate) fn shutdown_all(&self) {
        for entry in self.pools.clients.iter() {
            entry.value().shutdown();
        }
        self.pools.clients.clear();
        self.pools.active.write().clear();
        self.pools.acquired.clear();
    }
}
