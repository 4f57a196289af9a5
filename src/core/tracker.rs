// core/tracker.rs

//! Maps the stream of position samples onto the active route. Maintains the
//! smoothed position, deviation with on/off-route hysteresis, completion,
//! remaining distance/time and the next turn still ahead.

use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;

use super::geometry::{self, Coordinate};
use super::route::{PositionSample, RoutePlan};
use crate::config::TrackerSettings;
use crate::error::NavigationError;

/// Upper bound on the smoothing window
pub const MAX_SMOOTHING_WINDOW: usize = 5;

/// Snapshot of route progress after the latest accepted sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingState {
    /// Rolling average of the last samples
    pub smoothed_position: Option<Coordinate>,
    /// Latest accepted raw position
    pub raw_position: Option<Coordinate>,
    /// Closest route point to the smoothed position
    pub closest_point: Option<Coordinate>,
    /// Distance from the smoothed position to the route, meters
    pub deviation_m: f64,
    /// Hysteresis-filtered route status
    pub is_on_route: bool,
    /// Consecutive in-tolerance samples
    pub consecutive_on_route: u32,
    /// Consecutive out-of-tolerance samples
    pub consecutive_off_route: u32,
    /// Completed share of the route in [0, 1]
    pub completed_fraction: f64,
    /// Distance left along the route, meters
    pub remaining_distance_m: f64,
    /// Estimated time left, seconds
    pub remaining_time_s: f64,
    /// Index into `RoutePlan::steps` of the next turn not yet passed
    pub next_turn_index: Option<usize>,
    /// Along-route distance to that turn, meters
    pub distance_to_next_turn_m: Option<f64>,
    /// Segment the raw position projects onto
    pub segment_index: usize,
}

impl Default for TrackingState {
    fn default() -> Self {
        TrackingState {
            smoothed_position: None,
            raw_position: None,
            closest_point: None,
            deviation_m: 0.0,
            is_on_route: true,
            consecutive_on_route: 0,
            consecutive_off_route: 0,
            completed_fraction: 0.0,
            remaining_distance_m: 0.0,
            remaining_time_s: 0.0,
            next_turn_index: None,
            distance_to_next_turn_m: None,
            segment_index: 0,
        }
    }
}

/// Route plus precomputed along-track anchors
#[derive(Debug, Clone)]
struct TrackedRoute {
    plan: RoutePlan,
    length_m: f64,
    total_m: f64,
    // along-track position of each step start
    step_anchors: Vec<f64>,
    // furthest along-track distance reached; never decreases
    furthest_along_m: f64,
}

impl TrackedRoute {
    fn new(plan: RoutePlan) -> Self {
        let length_m = geometry::polyline_length(&plan.polyline);
        let step_anchors = plan
            .steps
            .iter()
            .map(|step| {
                geometry::project_onto_polyline(&step.start, &plan.polyline)
                    .map(|projection| projection.along_m)
                    .unwrap_or(0.0)
            })
            .collect();
        let total_m = plan.effective_distance_m();

        TrackedRoute {
            plan,
            length_m,
            total_m,
            step_anchors,
            furthest_along_m: 0.0,
        }
    }

    /// First turn step whose anchor is still ahead of the furthest progress
    fn next_turn(&self) -> Option<(usize, f64)> {
        self.plan
            .steps
            .iter()
            .zip(&self.step_anchors)
            .enumerate()
            .find(|(_, (step, anchor))| step.maneuver.is_turn() && **anchor > self.furthest_along_m)
            .map(|(index, (_, anchor))| (index, *anchor))
    }
}

/// Tracks progress of position samples along one route plan
pub struct RouteProgressTracker {
    settings: TrackerSettings,
    route: Option<TrackedRoute>,
    window: VecDeque<Coordinate>,
    state: TrackingState,
    last_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl RouteProgressTracker {
    /// Creates an idle tracker
    pub fn new(settings: TrackerSettings) -> Self {
        RouteProgressTracker {
            settings,
            route: None,
            window: VecDeque::with_capacity(MAX_SMOOTHING_WINDOW),
            state: TrackingState::default(),
            last_timestamp: None,
        }
    }

    /// Starts tracking a plan, clearing every previous field
    pub fn start_tracking(&mut self, plan: RoutePlan) -> Result<(), NavigationError> {
        plan.validate()?;
        self.window.clear();
        self.last_timestamp = None;
        self.install(plan);
        info!(
            "Tracking started: {:.0} m, {} steps",
            self.state.remaining_distance_m,
            self.route.as_ref().map_or(0, |r| r.plan.steps.len())
        );
        Ok(())
    }

    /// Swaps in a rerouted plan. Progress and hysteresis restart; the
    /// smoothing window and sample ordering are kept.
    pub fn replace_route(&mut self, plan: RoutePlan) -> Result<(), NavigationError> {
        plan.validate()?;
        let smoothed = self.state.smoothed_position;
        let raw = self.state.raw_position;
        self.install(plan);
        self.state.smoothed_position = smoothed;
        self.state.raw_position = raw;
        info!("Route replaced: {:.0} m remaining", self.state.remaining_distance_m);
        Ok(())
    }

    fn install(&mut self, plan: RoutePlan) {
        let route = TrackedRoute::new(plan);
        let next = route.next_turn();
        self.state = TrackingState {
            remaining_distance_m: route.length_m,
            remaining_time_s: route.plan.total_duration_s,
            next_turn_index: next.map(|(index, _)| index),
            distance_to_next_turn_m: next.map(|(_, anchor)| anchor),
            ..TrackingState::default()
        };
        self.route = Some(route);
    }

    /// Releases the route. Safe to call repeatedly.
    pub fn stop_tracking(&mut self) {
        if self.route.take().is_some() {
            debug!("Tracking stopped");
        }
        self.window.clear();
        self.last_timestamp = None;
        self.state = TrackingState::default();
    }

    /// Whether a route is loaded
    pub fn is_tracking(&self) -> bool {
        self.route.is_some()
    }

    /// Active plan, if any
    pub fn route(&self) -> Option<&RoutePlan> {
        self.route.as_ref().map(|r| &r.plan)
    }

    /// Latest snapshot
    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// Marks the route finished regardless of the last projection
    pub fn mark_arrived(&mut self) {
        self.state.completed_fraction = 1.0;
        self.state.remaining_distance_m = 0.0;
        self.state.remaining_time_s = 0.0;
        self.state.next_turn_index = None;
        self.state.distance_to_next_turn_m = None;
    }

    /// Feeds one position sample and returns the updated snapshot
    pub fn update_position(&mut self, sample: &PositionSample) -> Result<TrackingState, NavigationError> {
        if !sample.coordinate.is_valid() {
            return Err(NavigationError::InvalidSample(format!(
                "{:?} is not a valid coordinate",
                sample.coordinate
            )));
        }
        if let Some(last) = self.last_timestamp {
            if sample.timestamp < last {
                return Err(NavigationError::OutOfOrderSample {
                    received: sample.timestamp,
                    last_accepted: last,
                });
            }
        }

        let settings = &self.settings;
        let route = self.route.as_mut().ok_or(NavigationError::NotTracking)?;
        self.last_timestamp = Some(sample.timestamp);

        // Smoothing
        let window_size = settings.smoothing_window.clamp(1, MAX_SMOOTHING_WINDOW);
        self.window.push_back(sample.coordinate);
        while self.window.len() > window_size {
            self.window.pop_front();
        }
        let smoothed = average(&self.window);
        let raw = sample.coordinate;

        // Deviation against the smoothed position
        let polyline = &route.plan.polyline;
        let (closest, deviation) = if polyline.len() < 2 {
            (polyline.first().copied().unwrap_or(smoothed), 0.0)
        } else {
            let closest = geometry::closest_point_on_polyline(&smoothed, polyline);
            (closest, geometry::distance(&smoothed, &closest))
        };

        // Hysteresis
        let state = &mut self.state;
        if deviation <= settings.deviation_threshold_m {
            state.consecutive_on_route = state.consecutive_on_route.saturating_add(1);
            state.consecutive_off_route = 0;
            if !state.is_on_route && state.consecutive_on_route >= settings.on_route_confirmations {
                state.is_on_route = true;
                info!("Back on route (deviation {:.1} m)", deviation);
            }
        } else {
            state.consecutive_off_route = state.consecutive_off_route.saturating_add(1);
            state.consecutive_on_route = 0;
            if state.is_on_route && state.consecutive_off_route >= settings.off_route_confirmations {
                state.is_on_route = false;
                info!("Off route (deviation {:.1} m)", deviation);
            }
        }

        // Progress against the raw position
        let (along, segment_index) = match geometry::project_onto_polyline(&raw, polyline) {
            Some(projection) if polyline.len() >= 2 => (projection.along_m, projection.segment_index),
            _ => (0.0, 0),
        };
        route.furthest_along_m = route.furthest_along_m.max(along);

        let remaining = if polyline.len() < 2 {
            geometry::distance(&raw, &route.plan.destination)
        } else {
            (route.length_m - along).max(0.0)
        };
        let completed = if route.total_m > 0.0 {
            (1.0 - remaining / route.total_m).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let remaining_time = match sample.speed_mps {
            Some(speed) if speed > settings.min_informative_speed_mps => remaining / speed,
            _ => route.plan.total_duration_s * (1.0 - completed),
        };

        let next = route.next_turn();

        state.smoothed_position = Some(smoothed);
        state.raw_position = Some(raw);
        state.closest_point = Some(closest);
        state.deviation_m = deviation;
        state.completed_fraction = completed;
        state.remaining_distance_m = remaining;
        state.remaining_time_s = remaining_time;
        state.segment_index = segment_index;
        state.next_turn_index = next.map(|(index, _)| index);
        state.distance_to_next_turn_m = next.map(|(_, anchor)| (anchor - along).max(0.0));

        debug!(
            "Sample: deviation {:.1} m, on_route {}, completed {:.3}, remaining {:.0} m",
            deviation, state.is_on_route, completed, remaining
        );

        Ok(state.clone())
    }
}

fn average(points: &VecDeque<Coordinate>) -> Coordinate {
    let n = points.len().max(1) as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), c| (lat + c.latitude, lon + c.longitude));
    Coordinate::new(lat / n, lon / n)
}
