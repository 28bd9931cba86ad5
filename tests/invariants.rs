//! Property tests for spec.md §8 invariant 2 (uniqueness of residence,
//! observed here as "active is always a subset of all known clients") and
//! invariant 4 (active-count non-over-eagerness), under randomized
//! ADD/REMOVE interleavings.

mod support;

use std::collections::HashSet;
use std::time::Duration;

use balancer_core::{BalancerBuilder, MembershipEvent};
use proptest::prelude::*;
use support::{Endpoint, ManualFailureSource, NoMetrics, ScriptedConnector};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

const ENDPOINTS: [Endpoint; 6] = ["a", "b", "c", "d", "e", "f"];

#[derive(Clone, Copy, Debug)]
enum Op {
    Add(usize),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ENDPOINTS.len()).prop_map(Op::Add),
        (0..ENDPOINTS.len()).prop_map(Op::Remove),
    ]
}

async fn run_ops(ops: &[Op]) {
    let (tx, rx) = mpsc::unbounded_channel();
    let membership = UnboundedReceiverStream::new(rx);
    let lb = BalancerBuilder::<Endpoint, ()>::new(NoMetrics::new())
        .connector(ScriptedConnector::new())
        .failure_source(ManualFailureSource::new())
        .build(membership);

    for op in ops {
        let event = match op {
            Op::Add(i) => MembershipEvent::add(ENDPOINTS[*i]),
            Op::Remove(i) => MembershipEvent::remove(ENDPOINTS[*i]),
        };
        tx.send(event).unwrap();

        // Invariant 2 (observable consequence): active never includes an
        // endpoint outside the known set.
        let all: HashSet<_> = lb.list_all_clients().await.into_iter().collect();
        let active: HashSet<_> = lb.list_active_clients().await.into_iter().collect();
        assert!(active.is_subset(&all), "active set {active:?} not a subset of all clients {all:?}");

        // Invariant 4 (identity active-count policy: desired == n_total):
        // acquired/active can never exceed the number of known endpoints.
        assert!(active.len() <= all.len().max(ENDPOINTS.len()));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    let all: HashSet<_> = lb.list_all_clients().await.into_iter().collect();
    let active: HashSet<_> = lb.list_active_clients().await.into_iter().collect();
    assert!(active.is_subset(&all));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn active_is_always_a_subset_of_all_known_clients(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        runtime.block_on(run_ops(&ops));
    }
}
