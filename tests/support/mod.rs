//! Scripted test-double collaborators for the scenario tests in
//! `scenarios.rs`, in the spirit of the teacher's own `tests/mocks/`
//! (`examples/linkerd-linkerd-tcp/tests/mocks/mock_namerd.rs`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use balancer_core::{ConnectError, Connector, FailureSignal, FailureSource, MetricsFactory};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub type Endpoint = &'static str;

/// A connector whose per-endpoint behavior is scripted: each call to
/// `connect` for an endpoint consumes the next scripted outcome, or
/// succeeds forever once the script is exhausted.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<Endpoint, Vec<Result<(), String>>>>,
    suspended: Mutex<Vec<Endpoint>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues outcomes for `endpoint`, consumed in order, oldest first.
    pub fn script(&self, endpoint: Endpoint, outcomes: Vec<Result<(), String>>) {
        self.scripts.lock().insert(endpoint, outcomes);
    }

    /// Marks `endpoint`'s connect attempts as never completing.
    pub fn suspend(&self, endpoint: Endpoint) {
        self.suspended.lock().push(endpoint);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector<Endpoint> for ScriptedConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.suspended.lock().contains(endpoint) {
            std::future::pending::<()>().await;
            unreachable!();
        }
        let next = self.scripts.lock().get_mut(endpoint).and_then(|outcomes| {
            if outcomes.is_empty() {
                None
            } else {
                Some(outcomes.remove(0))
            }
        });
        match next {
            Some(Ok(())) | None => Ok(()),
            Some(Err(reason)) => Err(ConnectError(reason)),
        }
    }
}

/// A failure source whose emissions are driven entirely by the test: call
/// `fail(endpoint)` to push one failure signal.
#[derive(Default)]
pub struct ManualFailureSource {
    senders: Mutex<HashMap<Endpoint, mpsc::UnboundedSender<FailureSignal>>>,
}

impl ManualFailureSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, endpoint: Endpoint) {
        if let Some(tx) = self.senders.lock().get(endpoint) {
            let _ = tx.send("injected failure".to_string());
        }
    }
}

impl FailureSource<Endpoint> for ManualFailureSource {
    fn subscribe(&self, endpoint: &Endpoint) -> mpsc::UnboundedReceiver<FailureSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().insert(*endpoint, tx);
        rx
    }
}

/// A metrics factory that never emits; every Holder keeps its initial
/// (unset) metrics value. Sufficient for scenarios that don't assert on
/// metrics content.
#[derive(Default)]
pub struct NoMetrics {
    held: Mutex<Vec<mpsc::UnboundedSender<Result<(), balancer_core::MetricsError>>>>,
}

impl NoMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl MetricsFactory<Endpoint, ()> for NoMetrics {
    fn subscribe(
        &self,
        _endpoint: &Endpoint,
    ) -> mpsc::UnboundedReceiver<Result<(), balancer_core::MetricsError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.held.lock().push(tx);
        rx
    }
}
