// navigation/state.rs

//! Lifecycle states of a navigation session and the emergency taxonomy that can
//! override them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of emergency was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    /// User pressed the emergency control
    UserInitiated,
    /// Hazard directly ahead
    HazardAhead,
    /// Crossing judged unsafe
    UnsafeCrossing,
    /// Navigation itself failed
    NavigationError,
    /// Device battery is low
    BatteryLow,
    /// User is running out of time
    TimeConstraint,
    /// Network connectivity lost
    Connectivity,
    /// Anything else
    Other,
}

impl EmergencyKind {
    /// Rank used for preemption; higher wins
    pub fn priority(&self) -> u8 {
        match self {
            EmergencyKind::UserInitiated => 100,
            EmergencyKind::HazardAhead => 90,
            EmergencyKind::UnsafeCrossing => 80,
            EmergencyKind::NavigationError => 60,
            EmergencyKind::BatteryLow => 50,
            EmergencyKind::Connectivity => 40,
            EmergencyKind::TimeConstraint => 30,
            EmergencyKind::Other => 10,
        }
    }
}

/// Response requested for an emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyAction {
    /// End navigation
    Stop,
    /// Request a fresh route from the current position
    Reroute,
    /// Reroute around the current position
    Detour,
    /// Pause navigation
    Pause,
    /// Notify only
    AlertUser,
    /// Notify only; the walker should slow down
    SlowDown,
}

/// Navigation lifecycle state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum NavigationState {
    /// No route loaded
    #[default]
    Idle,
    /// Following a route
    Active,
    /// Route kept, positions not consumed
    Paused,
    /// Waiting for a new route
    Rerouting,
    /// Destination reached; grace window running
    Arrived,
    /// Recoverable failure that needs `resume`
    Error(String),
    /// Emergency override in progress
    Emergency {
        /// What happened
        kind: EmergencyKind,
        /// What is being done about it
        action: EmergencyAction,
    },
}

impl NavigationState {
    /// Short state name
    pub fn name(&self) -> &'static str {
        match self {
            NavigationState::Idle => "idle",
            NavigationState::Active => "active",
            NavigationState::Paused => "paused",
            NavigationState::Rerouting => "rerouting",
            NavigationState::Arrived => "arrived",
            NavigationState::Error(_) => "error",
            NavigationState::Emergency { .. } => "emergency",
        }
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NavigationState::Error(reason) => write!(f, "error ({})", reason),
            NavigationState::Emergency { kind, action } => {
                write!(f, "emergency ({:?}, {:?})", kind, action)
            }
            other => f.write_str(other.name()),
        }
    }
}
