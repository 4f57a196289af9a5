// src/main.rs
// Demo entry point: walks a simulated user along an L-shaped route and logs the
// feedback cues the session produces.

// - env_logger: set RUST_LOG=info (or debug) to see the session at work.
// - Optional first argument: path to a YAML navigator config.
use chrono::Utc;
use log::{error, info};
use pathsense::core::geometry;
use pathsense::providers::{ReplayLocationProvider, StraightLineRouter, walk_samples};
use pathsense::proximity::Severity;
use pathsense::{
    Coordinate, FeedbackDispatcher, FeedbackPolicy, LogFeedbackSink, ManeuverKind, NavigationSession,
    NavigationState, NavigatorConfig, ProximityCandidate, RoutePlan, RouteStep,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const WALKING_SPEED_MPS: f64 = 1.25;
const MAX_ITERATIONS: usize = 2_000;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting PathSense demo...");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            NavigatorConfig::from_yaml_file(&path)?
        }
        None => NavigatorConfig::default(),
    };

    // 300 m north, then left for 200 m
    let start = Coordinate::new(48.8566, 2.3522);
    let corner = start.offset_m(300.0, 0.0);
    let destination = corner.offset_m(0.0, -200.0);
    let plan = l_shaped_route(start, corner, destination);

    let samples = walk_samples(&plan.polyline, 10.0, WALKING_SPEED_MPS, Utc::now());
    info!("Replaying {} samples", samples.len());
    let location = ReplayLocationProvider::new(samples, Duration::from_millis(20));
    let router = Arc::new(StraightLineRouter::new(WALKING_SPEED_MPS));

    let mut session = NavigationSession::new(config.clone(), Box::new(location), router)?;
    let mut feedback = FeedbackDispatcher::new(
        FeedbackPolicy::for_profile(config.profile),
        LogFeedbackSink,
        session.subscribe(),
    );

    session.add_crossing(
        ProximityCandidate::new("crossing-corner", corner.offset_m(-5.0, 0.0), 0.0).with_category("zebra"),
    );
    session.add_hazard(
        ProximityCandidate::new("hazard-works", corner.offset_m(0.0, -80.0), 40.0)
            .with_severity(Severity::High)
            .with_category("roadworks"),
    );

    session.start_navigation(plan)?;

    let mut iteration = 0;
    while iteration < MAX_ITERATIONS {
        session.pump();
        feedback.dispatch_pending();

        if *session.state() == NavigationState::Idle {
            break;
        }
        if let NavigationState::Error(reason) = session.state() {
            error!("Session failed: {}", reason);
            break;
        }

        std::thread::sleep(Duration::from_millis(10));
        iteration += 1;
    }

    let tracking = session.tracking();
    info!(
        "Demo finished after {} iterations: {:.0}% complete, state {}",
        iteration,
        tracking.completed_fraction * 100.0,
        session.state()
    );
    session.dispose();
    feedback.dispatch_pending();
    Ok(())
}

fn l_shaped_route(start: Coordinate, corner: Coordinate, destination: Coordinate) -> RoutePlan {
    let first = geometry::distance(&start, &corner);
    let second = geometry::distance(&corner, &destination);

    RoutePlan {
        polyline: vec![start, corner, destination],
        steps: vec![
            RouteStep {
                instruction: "Head north".to_string(),
                maneuver: ManeuverKind::Straight,
                start,
                end: corner,
                distance_m: first,
                duration_s: first / WALKING_SPEED_MPS,
            },
            RouteStep {
                instruction: "Turn left".to_string(),
                maneuver: ManeuverKind::Left,
                start: corner,
                end: destination,
                distance_m: second,
                duration_s: second / WALKING_SPEED_MPS,
            },
        ],
        total_distance_m: first + second,
        total_duration_s: (first + second) / WALKING_SPEED_MPS,
        origin: start,
        destination,
    }
}
