// core/geometry.rs

//! Pure geodesic helpers used by the tracker and the proximity engines: haversine
//! distance, initial bearing, point-to-segment projection and polyline
//! projection. Nothing here holds state.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Squared planar length (in scaled degrees) below which a segment is a point
const DEGENERATE_SEGMENT_EPS: f64 = 1e-20;

/// WGS-84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude in degrees
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }

    /// True when both components are finite and inside WGS-84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Returns the coordinate displaced by the given meters north and east.
    /// Uses the same spherical radius as [`distance`], so short offsets
    /// round-trip through it.
    pub fn offset_m(&self, north_m: f64, east_m: f64) -> Coordinate {
        let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
        let dlon = (east_m / (EARTH_RADIUS_M * self.latitude.to_radians().cos())).to_degrees();
        Coordinate::new(self.latitude + dlat, self.longitude + dlon)
    }
}

/// Projection of a point onto a polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    /// Closest point on the polyline
    pub point: Coordinate,
    /// Index of the segment start vertex
    pub segment_index: usize,
    /// Distance from the query point to `point`, meters
    pub distance_m: f64,
    /// Distance along the polyline from its first vertex to `point`, meters
    pub along_m: f64,
}

/// Great-circle distance in meters (haversine)
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` to `b` in degrees, normalised to [0, 360)
pub fn bearing(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if degrees >= 360.0 { 0.0 } else { degrees }
}

/// Orthogonal projection of `p` onto the segment `start..end`, clamped to the
/// segment.
///
/// Works in a local plane where longitude is scaled by the cosine of the mean
/// latitude. Fine at pedestrian scale; wrong across the antimeridian and near
/// the poles.
pub fn project_onto_segment(p: &Coordinate, start: &Coordinate, end: &Coordinate) -> Coordinate {
    let cos_lat = ((start.latitude + end.latitude) / 2.0).to_radians().cos();
    let to_plane = |c: &Coordinate| {
        Vector2::new(
            (c.longitude - start.longitude) * cos_lat,
            c.latitude - start.latitude,
        )
    };

    let segment = to_plane(end);
    let len_sq = segment.norm_squared();
    if len_sq < DEGENERATE_SEGMENT_EPS {
        return *start;
    }

    let t = (to_plane(p).dot(&segment) / len_sq).clamp(0.0, 1.0);

    Coordinate::new(
        start.latitude + t * (end.latitude - start.latitude),
        start.longitude + t * (end.longitude - start.longitude),
    )
}

/// Closest point to `p` on the polyline. A single vertex is returned as is;
/// an empty polyline returns `p` itself.
pub fn closest_point_on_polyline(p: &Coordinate, points: &[Coordinate]) -> Coordinate {
    project_onto_polyline(p, points)
        .map(|projection| projection.point)
        .unwrap_or(*p)
}

/// Projects `p` onto the nearest segment of the polyline.
///
/// Returns `None` for an empty polyline. A single-vertex polyline projects to
/// that vertex with segment index 0.
pub fn project_onto_polyline(p: &Coordinate, points: &[Coordinate]) -> Option<PolylineProjection> {
    match points {
        [] => None,
        [only] => Some(PolylineProjection {
            point: *only,
            segment_index: 0,
            distance_m: distance(p, only),
            along_m: 0.0,
        }),
        _ => {
            let mut best: Option<PolylineProjection> = None;
            let mut cumulative = 0.0;

            for (i, segment) in points.windows(2).enumerate() {
                let (a, b) = (&segment[0], &segment[1]);
                let projected = project_onto_segment(p, a, b);
                let dist = distance(p, &projected);

                if best.map_or(true, |prev| dist < prev.distance_m) {
                    best = Some(PolylineProjection {
                        point: projected,
                        segment_index: i,
                        distance_m: dist,
                        along_m: cumulative + distance(a, &projected),
                    });
                }

                cumulative += distance(a, b);
            }

            best
        }
    }
}

/// Total length of a polyline in meters
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// Cumulative along-track distance at each vertex (first entry is 0)
pub fn cumulative_lengths(points: &[Coordinate]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            total += distance(&points[i - 1], point);
        }
        out.push(total);
    }
    out
}

// Limitations:
// - The planar projection ignores the antimeridian; a segment crossing ±180°
//   projects through the wrong side of the globe.
// - Latitude scaling degrades near the poles.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_one_hundredth_degree_latitude() {
        let d = distance(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.009, 0.0));
        assert!((d - 1000.75).abs() < 0.5, "got {d}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinate::new(10.0, 10.0);
        assert!(bearing(&origin, &Coordinate::new(10.1, 10.0)).abs() < 1e-6);
        assert!((bearing(&origin, &Coordinate::new(10.0, 10.1)) - 90.0).abs() < 0.1);
        assert!((bearing(&origin, &Coordinate::new(9.9, 10.0)) - 180.0).abs() < 1e-6);
        assert!((bearing(&origin, &Coordinate::new(10.0, 9.9)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn projection_clamps_to_endpoints() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.001, 0.0);
        let before = Coordinate::new(-0.001, 0.0001);
        let after = Coordinate::new(0.002, -0.0001);
        assert_eq!(project_onto_segment(&before, &a, &b), a);
        assert_eq!(project_onto_segment(&after, &a, &b), b);
    }

    #[test]
    fn degenerate_segment_projects_to_start() {
        let a = Coordinate::new(1.0, 1.0);
        let p = Coordinate::new(1.001, 1.001);
        assert_eq!(project_onto_segment(&p, &a, &a), a);
    }

    #[test]
    fn empty_polyline_is_identity() {
        let p = Coordinate::new(5.0, 5.0);
        assert_eq!(closest_point_on_polyline(&p, &[]), p);
        assert!(project_onto_polyline(&p, &[]).is_none());
    }

    #[test]
    fn single_vertex_polyline_returns_vertex() {
        let vertex = Coordinate::new(5.0, 5.0);
        let p = Coordinate::new(5.001, 5.0);
        assert_eq!(closest_point_on_polyline(&p, &[vertex]), vertex);
    }

    #[test]
    fn projection_reports_along_distance_on_later_segment() {
        let start = Coordinate::new(0.0, 0.0);
        let corner = start.offset_m(100.0, 0.0);
        let end = corner.offset_m(0.0, 100.0);
        let p = corner.offset_m(10.0, 50.0);

        let projection = project_onto_polyline(&p, &[start, corner, end]).unwrap();
        assert_eq!(projection.segment_index, 1);
        assert!((projection.along_m - 150.0).abs() < 0.5);
        assert!((projection.distance_m - 10.0).abs() < 0.5);
    }

    #[test]
    fn offset_round_trips_through_distance() {
        let origin = Coordinate::new(48.2, 16.37);
        let moved = origin.offset_m(30.0, 40.0);
        assert!((distance(&origin, &moved) - 50.0).abs() < 0.05);
    }

    #[test]
    fn cumulative_lengths_end_at_total() {
        let pts = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.001, 0.0),
            Coordinate::new(0.001, 0.001),
        ];
        let cumulative = cumulative_lengths(&pts);
        assert_eq!(cumulative.len(), 3);
        assert_eq!(cumulative[0], 0.0);
        assert!((cumulative[2] - polyline_length(&pts)).abs() < 1e-9);
    }
}
