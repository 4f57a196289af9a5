// core/route.rs

//! Route plans as returned by a routing provider, plus the position samples that
//! are tracked against them. A plan is immutable once handed to a session and is
//! replaced wholesale on reroute.

use super::geometry::{self, Coordinate};
use crate::error::NavigationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maneuver at the start of a route step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    /// Regular left turn
    Left,
    /// Regular right turn
    Right,
    /// Bear left
    SlightLeft,
    /// Bear right
    SlightRight,
    /// Hard left
    SharpLeft,
    /// Hard right
    SharpRight,
    /// Turn back
    UTurn,
    /// Continue ahead
    Straight,
    /// Join another path
    Merge,
    /// Leave the current path
    Exit,
    /// Anything the provider could not name
    Unknown,
}

impl ManeuverKind {
    /// Everything except going straight (or not knowing) needs an announcement
    pub fn is_turn(&self) -> bool {
        !matches!(self, ManeuverKind::Straight | ManeuverKind::Unknown)
    }

    /// Maneuver for a heading change in degrees (positive = clockwise)
    pub fn from_bearing_change(delta_deg: f64) -> Self {
        // fold into (-180, 180]
        let delta = (delta_deg + 180.0).rem_euclid(360.0) - 180.0;
        let magnitude = delta.abs();
        let right = delta > 0.0;
        match magnitude {
            m if m < 15.0 => ManeuverKind::Straight,
            m if m < 45.0 => if right { ManeuverKind::SlightRight } else { ManeuverKind::SlightLeft },
            m if m < 120.0 => if right { ManeuverKind::Right } else { ManeuverKind::Left },
            m if m < 170.0 => if right { ManeuverKind::SharpRight } else { ManeuverKind::SharpLeft },
            _ => ManeuverKind::UTurn,
        }
    }

    /// Short spoken form, e.g. "turn left"
    pub fn phrase(&self) -> &'static str {
        match self {
            ManeuverKind::Left => "turn left",
            ManeuverKind::Right => "turn right",
            ManeuverKind::SlightLeft => "bear left",
            ManeuverKind::SlightRight => "bear right",
            ManeuverKind::SharpLeft => "sharp left",
            ManeuverKind::SharpRight => "sharp right",
            ManeuverKind::UTurn => "make a U-turn",
            ManeuverKind::Straight => "continue straight",
            ManeuverKind::Merge => "merge",
            ManeuverKind::Exit => "take the exit",
            ManeuverKind::Unknown => "continue",
        }
    }
}

impl FromStr for ManeuverKind {
    type Err = std::convert::Infallible;

    /// Parses provider maneuver strings. Anything unrecognised is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Ok(match normalised.as_str() {
            "left" | "turn_left" => ManeuverKind::Left,
            "right" | "turn_right" => ManeuverKind::Right,
            "slight_left" => ManeuverKind::SlightLeft,
            "slight_right" => ManeuverKind::SlightRight,
            "sharp_left" => ManeuverKind::SharpLeft,
            "sharp_right" => ManeuverKind::SharpRight,
            "uturn" | "u_turn" => ManeuverKind::UTurn,
            "straight" | "continue" | "depart" => ManeuverKind::Straight,
            "merge" => ManeuverKind::Merge,
            "exit" | "ramp" => ManeuverKind::Exit,
            _ => ManeuverKind::Unknown,
        })
    }
}

/// One turn-by-turn instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Human-readable instruction
    pub instruction: String,
    /// Maneuver performed at `start`
    pub maneuver: ManeuverKind,
    /// Where the step (and its maneuver) begins
    pub start: Coordinate,
    /// Where the step ends
    pub end: Coordinate,
    /// Step length, meters
    pub distance_m: f64,
    /// Expected walking time, seconds
    pub duration_s: f64,
}

/// Area the routing provider should route around
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvoidArea {
    /// Centre of the area
    pub center: Coordinate,
    /// Radius, meters
    pub radius_m: f64,
}

/// Full turn-by-turn route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Dense path geometry
    pub polyline: Vec<Coordinate>,
    /// Instructions in travel order
    pub steps: Vec<RouteStep>,
    /// Total length, meters
    pub total_distance_m: f64,
    /// Total expected time, seconds
    pub total_duration_s: f64,
    /// First point of the route
    pub origin: Coordinate,
    /// Last point of the route
    pub destination: Coordinate,
}

impl RoutePlan {
    /// Builds a single-step straight plan. Used by the simulated router.
    pub fn straight_line(origin: Coordinate, destination: Coordinate, walking_speed_mps: f64) -> Self {
        let length = geometry::distance(&origin, &destination);
        let duration = if walking_speed_mps > 0.0 { length / walking_speed_mps } else { 0.0 };

        RoutePlan {
            polyline: vec![origin, destination],
            steps: vec![RouteStep {
                instruction: "Head towards the destination".to_string(),
                maneuver: ManeuverKind::Straight,
                start: origin,
                end: destination,
                distance_m: length,
                duration_s: duration,
            }],
            total_distance_m: length,
            total_duration_s: duration,
            origin,
            destination,
        }
    }

    /// Rejects plans the tracker cannot follow: no geometry, invalid
    /// coordinates, or negative totals.
    pub fn validate(&self) -> Result<(), NavigationError> {
        if self.polyline.is_empty() {
            return Err(NavigationError::InvalidRoute("polyline is empty".to_string()));
        }
        if let Some(index) = self.polyline.iter().position(|c| !c.is_valid()) {
            return Err(NavigationError::InvalidRoute(format!(
                "polyline point {} is not a valid coordinate",
                index
            )));
        }
        if !self.origin.is_valid() || !self.destination.is_valid() {
            return Err(NavigationError::InvalidRoute(
                "origin or destination is not a valid coordinate".to_string(),
            ));
        }
        if let Some(index) = self
            .steps
            .iter()
            .position(|s| !s.start.is_valid() || !s.end.is_valid())
        {
            return Err(NavigationError::InvalidRoute(format!(
                "step {} has an invalid coordinate",
                index
            )));
        }
        if !(self.total_distance_m >= 0.0) || !(self.total_duration_s >= 0.0) {
            return Err(NavigationError::InvalidRoute(
                "totals must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Plan distance, falling back to the polyline length when the provider
    /// reported nothing useful
    pub fn effective_distance_m(&self) -> f64 {
        if self.total_distance_m > 0.0 {
            self.total_distance_m
        } else {
            geometry::polyline_length(&self.polyline)
        }
    }
}

/// One fix from the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Reported position
    pub coordinate: Coordinate,
    /// Fix time
    pub timestamp: DateTime<Utc>,
    /// Ground speed in m/s, if the provider knows it
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy in meters, if known
    pub accuracy_m: Option<f64>,
}

impl PositionSample {
    /// Sample without speed or accuracy
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        PositionSample {
            coordinate,
            timestamp,
            speed_mps: None,
            accuracy_m: None,
        }
    }

    /// Same sample with a known speed
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}
