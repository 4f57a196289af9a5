use chrono::{DateTime, Duration, TimeZone, Utc};
use pathsense::config::{ProximitySettings, TurnSettings};
use pathsense::core::geometry::Coordinate;
use pathsense::proximity::{
    CandidateStore, InMemoryCandidateStore, ProximityCandidate, ProximityEngine, ProximityKind,
    ProximitySignal, ProximityTier, Severity, TurnMonitor,
};
use pathsense::{ManeuverKind, RoutePlan, RouteStep};
use rstest::{fixture, rstest};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

struct LRoute {
    plan: RoutePlan,
    corner: Coordinate,
}

// 200 m north, then left for 200 m
#[fixture]
fn l_route() -> LRoute {
    let start = Coordinate::new(0.0, 0.0);
    let corner = start.offset_m(200.0, 0.0);
    let end = corner.offset_m(0.0, -200.0);
    let step = |maneuver, from, to| RouteStep {
        instruction: maneuver_text(maneuver),
        maneuver,
        start: from,
        end: to,
        distance_m: 200.0,
        duration_s: 160.0,
    };

    LRoute {
        plan: RoutePlan {
            polyline: vec![start, corner, end],
            steps: vec![
                step(ManeuverKind::Straight, start, corner),
                step(ManeuverKind::Left, corner, end),
            ],
            total_distance_m: 400.0,
            total_duration_s: 320.0,
            origin: start,
            destination: end,
        },
        corner,
    }
}

fn maneuver_text(maneuver: ManeuverKind) -> String {
    maneuver.phrase().to_string()
}

// Walking in at 90, 40 and 10 m yields each tier exactly once, in order
#[rstest]
fn turn_tiers_escalate_once_each(l_route: LRoute) {
    let mut monitor = TurnMonitor::new(&TurnSettings::default());
    monitor.start_monitoring(&l_route.plan);

    let mut tiers = Vec::new();
    for (secs, before) in [(0, 90.0), (1, 40.0), (2, 10.0), (3, 8.0), (4, 6.0)] {
        for event in monitor.update_position(&l_route.corner.offset_m(-before, 0.0), t(secs)) {
            assert_eq!(event.step_index, 1);
            assert_eq!(event.step.maneuver, ManeuverKind::Left);
            tiers.push(event.tier);
        }
    }

    assert_eq!(
        tiers,
        vec![ProximityTier::Distant, ProximityTier::Approaching, ProximityTier::Immediate]
    );
}

#[rstest]
fn same_tier_repeats_after_throttle(l_route: LRoute) {
    let mut monitor = TurnMonitor::new(&TurnSettings::default());
    monitor.start_monitoring(&l_route.plan);
    let point = l_route.corner.offset_m(-80.0, 0.0);

    assert_eq!(monitor.update_position(&point, t(0)).len(), 1);
    assert!(monitor.update_position(&point, t(5)).is_empty());
    assert_eq!(monitor.update_position(&point, t(10)).len(), 1);
}

#[rstest]
fn retired_turn_stays_silent(l_route: LRoute) {
    let mut monitor = TurnMonitor::new(&TurnSettings::default());
    monitor.start_monitoring(&l_route.plan);

    monitor.retire_passed(None);
    assert!(monitor.update_position(&l_route.corner, t(0)).is_empty());
}

#[rstest]
#[case(Severity::Low, 20.0, ProximityTier::Approaching)]
#[case(Severity::Medium, 40.0, ProximityTier::Distant)]
#[case(Severity::High, 40.0, ProximityTier::Approaching)]
#[case(Severity::Critical, 20.0, ProximityTier::Immediate)]
#[case(Severity::Critical, 5.0, ProximityTier::Immediate)]
fn hazard_severity_promotes_tier(#[case] severity: Severity, #[case] distance_m: f64, #[case] expected: ProximityTier) {
    let engine = ProximityEngine::new(ProximityKind::Hazard, &ProximitySettings::hazards());
    assert_eq!(engine.classify(distance_m, severity), expected);
}

#[test]
fn leaving_radius_clears_warning() {
    let crossing = Coordinate::new(10.0, 10.0);
    let mut engine = ProximityEngine::new(ProximityKind::Crossing, &ProximitySettings::crossings());
    engine.start_monitoring(Some(vec![ProximityCandidate::new("zebra-1", crossing, 30.0)]));

    let events = engine.update_position(&crossing.offset_m(-12.0, 0.0), t(0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal, ProximitySignal::Warning(ProximityTier::Approaching));

    let events = engine.update_position(&crossing.offset_m(50.0, 0.0), t(20));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].candidate_id, "zebra-1");
    assert_eq!(events[0].signal, ProximitySignal::Cleared);
}

#[test]
fn nearest_candidate_wins() {
    let here = Coordinate::new(10.0, 10.0);
    let mut engine = ProximityEngine::new(ProximityKind::Hazard, &ProximitySettings::hazards());
    engine.start_monitoring(Some(vec![
        ProximityCandidate::new("far", here.offset_m(40.0, 0.0), 50.0),
        ProximityCandidate::new("near", here.offset_m(15.0, 0.0), 50.0),
    ]));

    let events = engine.update_position(&here, t(0));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].candidate_id, "near");
}

#[test]
fn expired_candidate_is_dropped() {
    let here = Coordinate::new(10.0, 10.0);
    let mut engine = ProximityEngine::new(ProximityKind::Hazard, &ProximitySettings::hazards());
    engine.start_monitoring(Some(vec![
        ProximityCandidate::new("puddle", here.offset_m(5.0, 0.0), 20.0).valid_until(t(60)),
    ]));

    assert_eq!(engine.update_position(&here, t(0)).len(), 1);
    let events = engine.update_position(&here, t(120));
    assert!(events.iter().all(|e| e.signal == ProximitySignal::Cleared));
    assert!(engine.is_empty());
}

#[test]
fn engine_loads_from_store_by_radius() {
    let here = Coordinate::new(10.0, 10.0);
    let mut store = InMemoryCandidateStore::new();
    store.add(ProximityCandidate::new("a", here.offset_m(100.0, 0.0), 30.0));
    store.add(ProximityCandidate::new("b", here.offset_m(900.0, 0.0), 30.0));

    let mut engine = ProximityEngine::new(ProximityKind::Crossing, &ProximitySettings::crossings());
    assert_eq!(engine.load_from(&store, &here, 500.0), 1);
    assert_eq!(engine.len(), 1);

    let removed = engine.remove("a");
    assert!(removed.is_some());
    assert!(engine.is_empty());
}

#[test]
fn stopped_engine_is_silent() {
    let here = Coordinate::new(10.0, 10.0);
    let mut engine = ProximityEngine::new(ProximityKind::Crossing, &ProximitySettings::crossings());
    engine.start_monitoring(Some(vec![ProximityCandidate::new("c", here, 0.0)]));
    engine.stop_monitoring();

    assert!(engine.update_position(&here, t(0) + Duration::seconds(1)).is_empty());
}
