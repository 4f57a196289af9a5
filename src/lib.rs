//! PathSense - accessible pedestrian navigation engine
//!
//! This library tracks a walker's position against a turn-by-turn route and
//! turns the result into discrete, throttled notifications: upcoming turns,
//! street crossings, hazards, off-route rerouting and arrival. Location and
//! routing are reached through the `LocationProvider` and `RoutingProvider`
//! traits; cues are rendered behind `FeedbackSink`.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod error;
pub mod feedback;
pub mod navigation;
pub mod proximity;
pub mod providers;

// Re-export commonly used items for easier access
pub use config::{NavigationProfile, NavigatorConfig};
pub use crate::core::{Coordinate, ManeuverKind, PositionSample, RoutePlan, RouteProgressTracker, RouteStep, TrackingState};
pub use error::{ConfigError, LocationError, NavigationError, RoutingError};
pub use feedback::{FeedbackCue, FeedbackDispatcher, FeedbackPolicy, FeedbackSink, HapticPattern, LogFeedbackSink};
pub use navigation::{EmergencyAction, EmergencyKind, NavigationEvent, NavigationSession, NavigationState};
pub use proximity::{ProximityCandidate, ProximityEngine, ProximityKind, ProximityTier, Severity};
pub use providers::{LocationProvider, RoutingProvider};
