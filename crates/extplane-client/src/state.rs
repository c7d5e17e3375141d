//! Subscription state tracking

use std::time::Instant;

use extplane_protocol::{Dataref, DatarefId};

/// Where a dataref is in the subscription lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Not known to the client
    Unregistered,
    /// Queued or in flight, waiting for its first value
    PendingRegistration,
    /// Acknowledged by the server
    Registered,
    /// `unsub` being queued
    ///
    /// The server never acknowledges `unsub`, so the manager drops the
    /// dataref within the same `unregister` call. This state is never
    /// observed between calls.
    PendingUnregistration,
}

impl SubscriptionState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unregistered => "Unregistered",
            Self::PendingRegistration => "Pending registration",
            Self::Registered => "Registered",
            Self::PendingUnregistration => "Pending unregistration",
        }
    }
}

/// The single subscription awaiting its first value push
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub dataref: Dataref,
    /// When the `sub` was sent
    pub since: Instant,
    /// Whether a stall has already been reported for this attempt
    pub stall_reported: bool,
}

impl InFlight {
    pub fn new(dataref: Dataref) -> Self {
        Self {
            dataref,
            since: Instant::now(),
            stall_reported: false,
        }
    }

    pub fn id(&self) -> &DatarefId {
        self.dataref.id()
    }
}

/// Point-in-time copy of the subscription sets
///
/// `pending_registration` lists the in-flight dataref first, followed by the
/// queue in the order it will be serviced. `registered` is sorted by identity.
/// `pending_unregistration` is empty in any snapshot taken between calls;
/// see [`SubscriptionState::PendingUnregistration`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSnapshot {
    pub registered: Vec<Dataref>,
    pub pending_registration: Vec<Dataref>,
    pub pending_unregistration: Vec<Dataref>,
    pub in_flight: Option<Dataref>,
}

impl SubscriptionSnapshot {
    /// How many of the three sets contain a dataref with this identity
    pub fn occurrences(&self, id: &DatarefId) -> usize {
        self.registered
            .iter()
            .chain(&self.pending_registration)
            .chain(&self.pending_unregistration)
            .filter(|d| d.id() == id)
            .count()
    }

    /// Total datarefs known to the client
    pub fn len(&self) -> usize {
        self.registered.len() + self.pending_registration.len() + self.pending_unregistration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
