//! Membership events: the external signal that tells the controller which
//! endpoints currently exist (spec.md §3 "Lifecycle", §6 "Membership stream").

/// Whether an endpoint is entering or leaving the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipKind {
    Add,
    Remove,
}

/// One membership change for a single endpoint.
#[derive(Clone, Debug)]
pub struct MembershipEvent<C> {
    pub kind: MembershipKind,
    pub endpoint: C,
}

impl<C> MembershipEvent<C> {
    pub fn add(endpoint: C) -> Self {
        MembershipEvent { kind: MembershipKind::Add, endpoint }
    }

    pub fn remove(endpoint: C) -> Self {
        MembershipEvent { kind: MembershipKind::Remove, endpoint }
    }
}
