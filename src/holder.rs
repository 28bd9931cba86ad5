//! Holder (spec.md §4.C): the per-endpoint record binding an endpoint to its
//! state-machine instance, metrics handle, failure subscription, and
//! connect subscription.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::state_machine::StateMachineHandle;

/// The five states of spec.md §3/§4.D.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum HolderState {
    Idle,
    Connecting,
    Connected,
    Quarantined,
    Removed,
}

/// Events accepted by a Holder's state machine, per spec.md §4.D's
/// transition tables.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum HolderEvent {
    Connect,
    Connected,
    Failed,
    Remove,
    Unquarantine,
    Stop,
}

/// Handles released together when a Holder enters `REMOVED`
/// (spec.md §3 Holder.subscriptions).
pub(crate) struct Subscriptions {
    pub metrics_task: JoinHandle<()>,
    pub failure_task: JoinHandle<()>,
    pub fsm: StateMachineHandle<HolderEvent>,
}

impl Subscriptions {
    fn abort(&self) {
        self.metrics_task.abort();
        self.failure_task.abort();
        self.fsm.abort();
    }
}

pub struct Holder<C, M> {
    endpoint: C,
    state: Mutex<HolderState>,
    metrics: Mutex<Option<M>>,
    quarantine_count: AtomicUsize,
    connect_task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) subscriptions: Mutex<Option<Subscriptions>>,
    shut_down: AtomicBool,
}

impl<C, M> Holder<C, M> {
    pub(crate) fn new(endpoint: C) -> Arc<Self> {
        Arc::new(Holder {
            endpoint,
            state: Mutex::new(HolderState::Idle),
            metrics: Mutex::new(None),
            quarantine_count: AtomicUsize::new(0),
            connect_task: Mutex::new(None),
            subscriptions: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &C {
        &self.endpoint
    }

    pub fn state(&self) -> HolderState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: HolderState) {
        *self.state.lock() = state;
    }

    pub fn quarantine_count(&self) -> usize {
        self.quarantine_count.load(Ordering::SeqCst)
    }

    /// Increments the failure counter. Returns the new value, used as the
    /// input to `backoff` on entry to `QUARANTINED`.
    pub(crate) fn record_failure(&self) -> usize {
        self.quarantine_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invariant 5 (spec.md §3/§8): `quarantineCount = 0` immediately after
    /// a `CONNECTED` entry.
    pub(crate) fn reset_quarantine_count(&self) {
        self.quarantine_count.store(0, Ordering::SeqCst);
    }

    pub fn metrics(&self) -> Option<M>
    where
        M: Clone,
    {
        self.metrics.lock().clone()
    }

    pub(crate) fn set_metrics(&self, metrics: M) {
        *self.metrics.lock() = Some(metrics);
    }

    /// Replaces the current connect attempt, aborting any prior one — "a
    /// cancelled connect attempt that nonetheless completes is absorbed"
    /// (spec.md §5) because its eventual event still lands on this Holder's
    /// FSM channel, which silently drops it once `REMOVED`.
    pub(crate) fn replace_connect_task(&self, task: JoinHandle<()>) {
        if let Some(prev) = self.connect_task.lock().replace(task) {
            prev.abort();
        }
    }

    /// Aborts and clears the current connect attempt, if any. Called on
    /// entry to `QUARANTINED` so invariant 3 (spec.md §3: "a Holder in
    /// QUARANTINED has no pending connect task") holds even when the
    /// `Failed` event came from the FailureSource rather than the connect
    /// attempt itself.
    pub(crate) fn cancel_connect_task(&self) {
        if let Some(task) = self.connect_task.lock().take() {
            task.abort();
        }
    }

    pub(crate) fn set_subscriptions(&self, subs: Subscriptions) {
        *self.subscriptions.lock() = Some(subs);
    }

    /// Submits `event` to this Holder's own state-machine instance. A no-op
    /// before `initialize()` has run or after the driver has been aborted.
    pub(crate) fn submit(&self, event: HolderEvent) {
        if let Some(subs) = self.subscriptions.lock().as_ref() {
            subs.fsm.submit(event);
        }
    }

    /// Releases all subscriptions and the current connect attempt.
    /// Idempotent (spec.md §4.C).
    pub(crate) fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.connect_task.lock().take() {
            task.abort();
        }
        if let Some(subs) = self.subscriptions.lock().take() {
            subs.abort();
        }
    }
}

// Identity is the endpoint alone, letting `RandomizedQueue<Arc<Holder<C, M>>>`
// (keyed by `C: PartialEq`) remove a specific Holder from `idleClients`.
impl<C: PartialEq, M> PartialEq for Holder<C, M> {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint
    }
}
