// navigation/events.rs

//! Outward event stream. Every consumer gets its own receiver; events published
//! before a consumer subscribed are not replayed.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::debug;

use super::state::{EmergencyAction, EmergencyKind, NavigationState};
use crate::core::geometry::Coordinate;
use crate::core::route::RouteStep;
use crate::proximity::{ProximityKind, ProximityTier};

/// Everything the session tells the feedback/UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    /// Lifecycle state changed
    StatusChanged(NavigationState),
    /// Accepted position
    PositionUpdated(Coordinate),
    /// Deviation moved by at least a meter
    DeviationChanged(f64),
    /// Turn warning
    UpcomingTurn {
        /// Index into the plan's steps
        step_index: usize,
        /// The step
        step: RouteStep,
        /// Early warning / approaching / at turn
        tier: ProximityTier,
        /// Straight-line distance to the turn, meters
        distance_m: f64,
    },
    /// Destination reached (emitted once per session)
    DestinationReached(Coordinate),
    /// Reroute request sent
    ReroutingStarted,
    /// Reroute request finished
    ReroutingFinished {
        /// Whether a new plan was installed
        success: bool,
    },
    /// Crossing or hazard warning
    ProximityWarning {
        /// Emitting engine
        kind: ProximityKind,
        /// Candidate id
        candidate_id: String,
        /// Distance, meters
        distance_m: f64,
        /// Urgency
        tier: ProximityTier,
    },
    /// A warned crossing or hazard no longer applies
    ProximityCleared {
        /// Emitting engine
        kind: ProximityKind,
        /// Candidate id
        candidate_id: String,
    },
    /// Recoverable failure worth telling the user about
    Error(String),
    /// Emergency accepted
    EmergencyRaised {
        /// What happened
        kind: EmergencyKind,
        /// Requested response
        action: EmergencyAction,
    },
}

/// Multi-consumer event channel
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<NavigationEvent>>,
    closed: bool,
}

impl EventBus {
    /// Bus without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver for events published from now on. After `close` the
    /// receiver is already disconnected.
    pub fn subscribe(&mut self) -> Receiver<NavigationEvent> {
        let (tx, rx) = unbounded();
        if !self.closed {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Sends to every live subscriber, forgetting those that hung up
    pub fn publish(&mut self, event: NavigationEvent) {
        if self.closed {
            return;
        }
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Disconnects all subscribers. Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.subscribers.clear();
        debug!("Event bus closed");
        true
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
