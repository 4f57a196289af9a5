// providers/routing.rs
//! Seam to the remote directions service.

use crate::core::geometry::Coordinate;
use crate::core::route::{AvoidArea, RoutePlan};
use crate::error::RoutingError;

/// Computes a walking route. Implementations may be slow and may fail; the
/// session calls them from a worker thread.
pub trait RoutingProvider: Send + Sync {
    /// Route from `origin` to `destination`, steering clear of `avoid_areas`
    fn calculate_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        avoid_areas: &[AvoidArea],
    ) -> Result<RoutePlan, RoutingError>;
}
