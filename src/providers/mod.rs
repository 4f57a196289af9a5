// providers/mod.rs

//! External collaborators the session talks to: the platform location source and
//! the remote routing service, plus simulated stand-ins for both.

pub mod location;
pub mod retry;
pub mod routing;
pub mod simulated;

pub use location::{LocationProvider, LocationService, PositionSender, position_feed};
pub use retry::RetryPolicy;
pub use routing::RoutingProvider;
pub use simulated::{ReplayLocationProvider, StraightLineRouter, walk_samples};
