use chrono::{DateTime, Duration, TimeZone, Utc};
use pathsense::config::TrackerSettings;
use pathsense::core::geometry::Coordinate;
use pathsense::providers::walk_samples;
use pathsense::{NavigationError, PositionSample, RoutePlan, RouteProgressTracker};
use rstest::{fixture, rstest};

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn at(coordinate: Coordinate, secs: i64) -> PositionSample {
    PositionSample::new(coordinate, t0() + Duration::seconds(secs))
}

// 1 km due north from (0, 0)
#[fixture]
fn kilometre_north() -> RoutePlan {
    let origin = Coordinate::new(0.0, 0.0);
    RoutePlan::straight_line(origin, origin.offset_m(1000.0, 0.0), 1.25)
}

fn tracker_with(plan: RoutePlan, settings: TrackerSettings) -> RouteProgressTracker {
    let mut tracker = RouteProgressTracker::new(settings);
    tracker.start_tracking(plan).unwrap();
    tracker
}

// A single stray sample after a long on-route run must not flip the status
#[rstest]
fn one_outlier_does_not_flip(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());

    for i in 0..10 {
        let state = tracker.update_position(&at(origin.offset_m(i as f64 * 10.0, 0.0), i)).unwrap();
        assert!(state.is_on_route);
    }

    let state = tracker.update_position(&at(origin.offset_m(100.0, 200.0), 10)).unwrap();
    assert!(state.is_on_route);
    assert_eq!(state.consecutive_off_route, 1);
}

#[rstest]
fn three_outliers_flip(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());

    for i in 0..10 {
        tracker.update_position(&at(origin.offset_m(i as f64 * 10.0, 0.0), i)).unwrap();
    }
    for i in 0..3 {
        tracker
            .update_position(&at(origin.offset_m(100.0 + i as f64 * 10.0, 200.0), 10 + i))
            .unwrap();
    }
    assert!(!tracker.state().is_on_route);
}

// Unsmoothed, so each sample's deviation is exactly its offset
#[rstest]
fn recovery_needs_two_confirmations(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let settings = TrackerSettings {
        smoothing_window: 1,
        ..TrackerSettings::default()
    };
    let mut tracker = tracker_with(kilometre_north, settings);

    for i in 0..3 {
        tracker.update_position(&at(origin.offset_m(i as f64 * 10.0, 50.0), i)).unwrap();
    }
    assert!(!tracker.state().is_on_route);

    let state = tracker.update_position(&at(origin.offset_m(40.0, 0.0), 3)).unwrap();
    assert!(!state.is_on_route);
    let state = tracker.update_position(&at(origin.offset_m(50.0, 0.0), 4)).unwrap();
    assert!(state.is_on_route);
}

#[rstest]
fn completion_never_drops_walking_forward(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());

    let mut previous = 0.0;
    for i in 0..40 {
        // sideways jitter only
        let jitter = if i % 2 == 0 { 3.0 } else { -3.0 };
        let state = tracker
            .update_position(&at(origin.offset_m(i as f64 * 25.0, jitter), i))
            .unwrap();
        assert!(state.completed_fraction >= previous);
        assert!((0.0..=1.0).contains(&state.completed_fraction));
        previous = state.completed_fraction;
    }
}

#[rstest]
fn straight_kilometre_walk_completes(kilometre_north: RoutePlan) {
    let samples = walk_samples(&kilometre_north.polyline, 50.0, 1.25, t0());
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());

    let mut last_remaining = f64::INFINITY;
    for sample in &samples {
        let state = tracker.update_position(sample).unwrap();
        assert!(state.is_on_route);
        assert!(state.deviation_m < 1.0, "deviation {}", state.deviation_m);
        assert!(state.remaining_distance_m <= last_remaining);
        last_remaining = state.remaining_distance_m;
    }

    let state = tracker.state();
    assert!((state.completed_fraction - 1.0).abs() < 1e-9);
    assert!(state.remaining_distance_m < 1e-6);
    assert!(state.remaining_time_s < 1e-6);
}

#[rstest]
fn remaining_time_falls_back_to_plan_pace(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let total = kilometre_north.total_duration_s;
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());

    let state = tracker.update_position(&at(origin.offset_m(500.0, 0.0), 0)).unwrap();
    assert!((state.remaining_time_s - total * 0.5).abs() < 2.0);
}

#[test]
fn empty_route_is_rejected() {
    let origin = Coordinate::new(0.0, 0.0);
    let mut plan = RoutePlan::straight_line(origin, origin.offset_m(100.0, 0.0), 1.25);
    plan.polyline.clear();

    let mut tracker = RouteProgressTracker::new(TrackerSettings::default());
    assert!(matches!(tracker.start_tracking(plan), Err(NavigationError::InvalidRoute(_))));
    assert!(!tracker.is_tracking());
}

#[rstest]
fn stop_clears_progress(kilometre_north: RoutePlan) {
    let origin = kilometre_north.origin;
    let mut tracker = tracker_with(kilometre_north, TrackerSettings::default());
    tracker.update_position(&at(origin.offset_m(300.0, 0.0), 0)).unwrap();

    tracker.stop_tracking();
    tracker.stop_tracking();
    assert!(!tracker.is_tracking());
    assert_eq!(tracker.state().completed_fraction, 0.0);
    assert!(tracker.state().raw_position.is_none());
}
