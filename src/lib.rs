//! A client-side load balancer core: endpoint lifecycle, quarantine/backoff,
//! and weighted selection. The transport, failure detection, metrics, and
//! membership sources are external collaborators, supplied by the caller
//! through the traits in [`traits`].

mod balancer;
mod controller;
mod error;
mod holder;
mod membership;
mod queue;
mod selection;
mod state_machine;
mod strategies;
mod traits;

pub use balancer::{BalancerBuilder, LoadBalancer};
pub use error::{BalancerError, ConnectError, MetricsError};
pub use holder::{Holder, HolderState};
pub use membership::{MembershipEvent, MembershipKind};
pub use queue::RandomizedQueue;
pub use strategies::{
    constant_backoff, default_backoff, identity_active_count_policy, EqualWeights,
    ImmediateSuccess, NeverFails, RoundRobin,
};
pub use traits::{
    ActiveCountPolicy, Backoff, Connector, FailureSignal, FailureSource, MetricsFactory,
    SelectionStrategy, WeightingStrategy,
};
