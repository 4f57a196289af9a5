// core/mod.rs

//! Geometry, route model and route progress tracking. Everything below the
//! navigation state machine that deals with where the walker is relative to the
//! route.

pub mod geometry;
pub mod route;
pub mod tracker;

pub use geometry::{Coordinate, PolylineProjection};
pub use route::{AvoidArea, ManeuverKind, PositionSample, RoutePlan, RouteStep};
pub use tracker::{RouteProgressTracker, TrackingState};
