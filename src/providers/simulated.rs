// providers/simulated.rs

//! Stand-in providers for demos and tests: a location provider that replays a
//! prepared walk on a background thread, and a router that draws straight lines
//! with a single sidestep around avoid areas.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::location::{LocationProvider, PositionSender};
use super::routing::RoutingProvider;
use crate::core::geometry::{self, Coordinate};
use crate::core::route::{AvoidArea, ManeuverKind, PositionSample, RoutePlan, RouteStep};
use crate::error::{LocationError, RoutingError};

/// Samples every `spacing_m` meters along `polyline`, walking at `speed_mps`
/// from `start`. The last vertex is always included.
pub fn walk_samples(
    polyline: &[Coordinate],
    spacing_m: f64,
    speed_mps: f64,
    start: DateTime<Utc>,
) -> Vec<PositionSample> {
    if polyline.is_empty() || spacing_m <= 0.0 || speed_mps <= 0.0 {
        return Vec::new();
    }

    let cumulative = geometry::cumulative_lengths(polyline);
    let total = cumulative.last().copied().unwrap_or(0.0);
    let mut stations: Vec<f64> = (0..)
        .map(|i| i as f64 * spacing_m)
        .take_while(|d| *d < total)
        .collect();
    stations.push(total);

    stations
        .into_iter()
        .map(|along| {
            let coordinate = point_at(polyline, &cumulative, along);
            let offset = ChronoDuration::milliseconds((along / speed_mps * 1000.0).round() as i64);
            PositionSample::new(coordinate, start + offset).with_speed(speed_mps)
        })
        .collect()
}

fn point_at(polyline: &[Coordinate], cumulative: &[f64], along: f64) -> Coordinate {
    for i in 1..polyline.len() {
        if along <= cumulative[i] {
            let length = cumulative[i] - cumulative[i - 1];
            let t = if length > 0.0 { (along - cumulative[i - 1]) / length } else { 0.0 };
            let (a, b) = (&polyline[i - 1], &polyline[i]);
            return Coordinate::new(
                a.latitude + t * (b.latitude - a.latitude),
                a.longitude + t * (b.longitude - a.longitude),
            );
        }
    }
    polyline[polyline.len() - 1]
}

/// Replays prepared samples at a fixed wall-clock interval
pub struct ReplayLocationProvider {
    samples: Arc<Vec<PositionSample>>,
    interval: Duration,
    cursor: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    failure: Option<LocationError>,
}

impl ReplayLocationProvider {
    /// Provider that will replay `samples`, one every `interval`
    pub fn new(samples: Vec<PositionSample>, interval: Duration) -> Self {
        ReplayLocationProvider {
            samples: Arc::new(samples),
            interval,
            cursor: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            failure: None,
        }
    }

    /// Makes `start` and `current_fix` fail with `error`
    pub fn failing_with(mut self, error: LocationError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of samples already delivered
    pub fn delivered(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl LocationProvider for ReplayLocationProvider {
    fn start(&mut self, sink: PositionSender) -> Result<(), LocationError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.stop();
        self.running.store(true, Ordering::SeqCst);

        let samples = Arc::clone(&self.samples);
        let cursor = Arc::clone(&self.cursor);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        self.worker = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let index = cursor.load(Ordering::SeqCst);
                let Some(sample) = samples.get(index) else {
                    break;
                };
                sink.offer(*sample);
                cursor.store(index + 1, Ordering::SeqCst);
                std::thread::sleep(interval);
            }
            debug!("Replay worker exiting");
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn current_fix(&mut self, _timeout: Duration) -> Result<PositionSample, LocationError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let index = self.cursor.load(Ordering::SeqCst).saturating_sub(1);
        self.samples.get(index).copied().ok_or(LocationError::NoFix)
    }
}

impl Drop for ReplayLocationProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Router returning straight lines, sidestepping the first blocking avoid area
#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    walking_speed_mps: f64,
}

impl StraightLineRouter {
    /// Router assuming the given walking speed
    pub fn new(walking_speed_mps: f64) -> Self {
        StraightLineRouter { walking_speed_mps }
    }

    fn detour(&self, origin: Coordinate, destination: Coordinate, area: &AvoidArea) -> RoutePlan {
        let heading = geometry::bearing(&origin, &destination).to_radians();
        let clearance = area.radius_m * 1.5;
        // step out to the right of the direct line
        let waypoint = area
            .center
            .offset_m(-heading.sin() * clearance, heading.cos() * clearance);

        let first_leg = geometry::distance(&origin, &waypoint);
        let second_leg = geometry::distance(&waypoint, &destination);
        let turn = ManeuverKind::from_bearing_change(
            geometry::bearing(&waypoint, &destination) - geometry::bearing(&origin, &waypoint),
        );
        let speed = self.walking_speed_mps.max(0.1);

        RoutePlan {
            polyline: vec![origin, waypoint, destination],
            steps: vec![
                RouteStep {
                    instruction: "Step aside from the obstruction".to_string(),
                    maneuver: ManeuverKind::Straight,
                    start: origin,
                    end: waypoint,
                    distance_m: first_leg,
                    duration_s: first_leg / speed,
                },
                RouteStep {
                    instruction: format!("{} towards the destination", turn.phrase()),
                    maneuver: turn,
                    start: waypoint,
                    end: destination,
                    distance_m: second_leg,
                    duration_s: second_leg / speed,
                },
            ],
            total_distance_m: first_leg + second_leg,
            total_duration_s: (first_leg + second_leg) / speed,
            origin,
            destination,
        }
    }
}

impl RoutingProvider for StraightLineRouter {
    fn calculate_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        avoid_areas: &[AvoidArea],
    ) -> Result<RoutePlan, RoutingError> {
        if avoid_areas
            .iter()
            .any(|area| geometry::distance(&area.center, &destination) <= area.radius_m)
        {
            return Err(RoutingError::NoRoute);
        }

        let direct = [origin, destination];
        let blocking = avoid_areas.iter().find(|area| {
            let closest = geometry::closest_point_on_polyline(&area.center, &direct);
            geometry::distance(&closest, &area.center) < area.radius_m
        });

        Ok(match blocking {
            Some(area) => self.detour(origin, destination, area),
            None => RoutePlan::straight_line(origin, destination, self.walking_speed_mps),
        })
    }
}
