use pathsense::core::geometry::{self, Coordinate};
use rstest::rstest;

// Distance must not depend on argument order
#[rstest]
#[case(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0))]
#[case(Coordinate::new(48.8566, 2.3522), Coordinate::new(51.5074, -0.1278))]
#[case(Coordinate::new(-33.8688, 151.2093), Coordinate::new(-37.8136, 144.9631))]
#[case(Coordinate::new(89.9, 10.0), Coordinate::new(89.9, -170.0))]
fn distance_is_symmetric(#[case] a: Coordinate, #[case] b: Coordinate) {
    let ab = geometry::distance(&a, &b);
    let ba = geometry::distance(&b, &a);
    assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
    assert!(ab > 0.0);
}

#[rstest]
#[case(Coordinate::new(0.0, 0.0))]
#[case(Coordinate::new(45.0, -120.0))]
#[case(Coordinate::new(-89.0, 179.9))]
fn distance_to_self_is_zero(#[case] p: Coordinate) {
    assert_eq!(geometry::distance(&p, &p), 0.0);
}

// One degree of latitude is roughly 111.2 km on the mean sphere
#[test]
fn one_degree_of_latitude() {
    let d = geometry::distance(&Coordinate::new(0.0, 0.0), &Coordinate::new(1.0, 0.0));
    assert!((d - 111_195.0).abs() < 10.0, "got {d}");
}

#[rstest]
#[case(100.0, 0.0, 0.0)]
#[case(0.0, 100.0, 90.0)]
#[case(-100.0, 0.0, 180.0)]
#[case(0.0, -100.0, 270.0)]
fn bearing_matches_offset_direction(#[case] north: f64, #[case] east: f64, #[case] expected: f64) {
    let origin = Coordinate::new(10.0, 10.0);
    let target = origin.offset_m(north, east);
    let bearing = geometry::bearing(&origin, &target);
    let diff = (bearing - expected + 540.0).rem_euclid(360.0) - 180.0;
    assert!(diff.abs() < 0.5, "bearing {bearing}, expected {expected}");
}

#[test]
fn offset_round_trips_through_distance() {
    let origin = Coordinate::new(52.52, 13.405);
    let moved = origin.offset_m(300.0, 400.0);
    assert!((geometry::distance(&origin, &moved) - 500.0).abs() < 1.0);
}

// The closest point must be at least as close as any densely sampled point
#[rstest]
#[case(Coordinate::new(0.0, 0.0).offset_m(120.0, 35.0))]
#[case(Coordinate::new(0.0, 0.0).offset_m(-50.0, -50.0))]
#[case(Coordinate::new(0.0, 0.0).offset_m(260.0, -310.0))]
#[case(Coordinate::new(0.0, 0.0).offset_m(400.0, -90.0))]
fn closest_point_beats_brute_force(#[case] query: Coordinate) {
    let start = Coordinate::new(0.0, 0.0);
    let polyline = vec![
        start,
        start.offset_m(200.0, 0.0),
        start.offset_m(200.0, -200.0),
        start.offset_m(400.0, -200.0),
    ];

    let closest = geometry::closest_point_on_polyline(&query, &polyline);
    let best = geometry::distance(&query, &closest);

    let mut brute = f64::INFINITY;
    for pair in polyline.windows(2) {
        for i in 0..=1000 {
            let t = i as f64 / 1000.0;
            let p = Coordinate::new(
                pair[0].latitude + t * (pair[1].latitude - pair[0].latitude),
                pair[0].longitude + t * (pair[1].longitude - pair[0].longitude),
            );
            brute = brute.min(geometry::distance(&query, &p));
        }
    }
    assert!(best <= brute + 0.5, "projection {best} m, brute force {brute} m");
}

#[test]
fn projection_reports_along_track_distance() {
    let start = Coordinate::new(0.0, 0.0);
    let corner = start.offset_m(200.0, 0.0);
    let end = corner.offset_m(0.0, 150.0);
    let polyline = [start, corner, end];

    let projection = geometry::project_onto_polyline(&corner.offset_m(10.0, 50.0), &polyline).unwrap();
    assert_eq!(projection.segment_index, 1);
    assert!((projection.along_m - 250.0).abs() < 1.0, "along {}", projection.along_m);
    assert!((projection.distance_m - 10.0).abs() < 0.5);
}

#[test]
fn degenerate_polylines() {
    let p = Coordinate::new(1.0, 1.0);
    assert!(geometry::project_onto_polyline(&p, &[]).is_none());
    assert_eq!(geometry::closest_point_on_polyline(&p, &[]), p);

    let only = Coordinate::new(1.001, 1.0);
    assert_eq!(geometry::closest_point_on_polyline(&p, &[only]), only);
    assert_eq!(geometry::polyline_length(&[only]), 0.0);
}
