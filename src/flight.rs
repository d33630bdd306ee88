//! Flight segmenter (C9): splits a completed track into flights for the
//! `download` operation.
//!
//! Adopts the concrete heuristic from the source's in-tree implementation
//! (see the Design Notes' resolution of the stubbed re-implementation): a
//! new candidate flight begins whenever the gap to the previous point
//! exceeds the configured break threshold; a candidate is kept only if it
//! meets a minimum duration AND shows enough altitude amplitude or ground
//! speed to look like an actual flight rather than receiver chatter on the
//! ground.

use crate::records::TrackPoint;

/// Thresholds governing flight acceptance, generalizing the source's global
/// constants into a named, configurable record.
#[derive(Debug, Clone, Copy)]
pub struct FlightSplitConfig {
    /// Gap between consecutive points, in seconds, beyond which a new
    /// candidate flight starts.
    pub max_gap_secs: i64,
    /// Minimum duration, in seconds, a candidate must span to be kept.
    pub min_duration_secs: i64,
    /// Minimum altitude amplitude (max - min, among points with altitude),
    /// in meters, that alone qualifies a candidate.
    pub min_climb_amplitude_m: f32,
    /// Minimum instantaneous ground speed between two consecutive points,
    /// in km/h, that alone qualifies a candidate.
    pub min_speed_kmh: f64,
}

impl Default for FlightSplitConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: 60,
            min_duration_secs: 180,
            min_climb_amplitude_m: 30.0,
            min_speed_kmh: 10.0,
        }
    }
}

/// Haversine ground distance between two semicircle positions, in meters.
fn ground_distance_m(a: &TrackPoint, b: &TrackPoint) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let to_rad = |v: i32| (v as f64) * std::f64::consts::PI / 2f64.powi(31);

    let lat1 = to_rad(a.posn.lat);
    let lat2 = to_rad(b.posn.lat);
    let dlat = lat2 - lat1;
    let dlon = to_rad(b.posn.lon) - to_rad(a.posn.lon);

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

fn segment_speed_kmh(a: &TrackPoint, b: &TrackPoint) -> f64 {
    let dt = (b.time - a.time) as f64;
    if dt <= 0.0 {
        return 0.0;
    }
    let meters = ground_distance_m(a, b);
    (meters / dt) * 3.6
}

fn accepts_candidate(points: &[TrackPoint], config: &FlightSplitConfig) -> bool {
    if points.len() < 2 {
        return false;
    }
    let duration = points.last().unwrap().time - points.first().unwrap().time;
    if duration < config.min_duration_secs {
        return false;
    }

    let altitudes: Vec<f32> = points
        .iter()
        .filter(|p| p.is_valid_fix())
        .map(|p| p.alt)
        .collect();
    let amplitude = if altitudes.is_empty() {
        0.0
    } else {
        altitudes.iter().cloned().fold(f32::MIN, f32::max)
            - altitudes.iter().cloned().fold(f32::MAX, f32::min)
    };
    if amplitude > config.min_climb_amplitude_m {
        return true;
    }

    points
        .windows(2)
        .any(|w| segment_speed_kmh(&w[0], &w[1]) > config.min_speed_kmh)
}

/// Splits `points` into accepted flights in chronological order. Points
/// failing the validity sentinel checks still count toward gap/duration
/// math (they are real device samples, just not emittable fixes); IGC
/// emission filters them out separately.
pub fn split(points: &[TrackPoint], config: &FlightSplitConfig) -> Vec<Vec<TrackPoint>> {
    let mut flights = Vec::new();
    let mut candidate: Vec<TrackPoint> = Vec::new();

    for &point in points {
        if let Some(last) = candidate.last() {
            if point.time - last.time > config.max_gap_secs {
                if accepts_candidate(&candidate, &config) {
                    flights.push(std::mem::take(&mut candidate));
                } else {
                    candidate.clear();
                }
            }
        }
        candidate.push(point);
    }

    if accepts_candidate(&candidate, &config) {
        flights.push(candidate);
    }

    flights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Position, Validity};

    fn pt(time: i64, lat: i32, lon: i32, alt: f32) -> TrackPoint {
        TrackPoint {
            time,
            posn: Position { lat, lon },
            alt,
            validity: Validity::Fix3D,
        }
    }

    #[test]
    fn short_stationary_run_is_dropped() {
        let points = vec![pt(0, 100, 100, 50.0), pt(30, 100, 100, 50.0)];
        let flights = split(&points, &FlightSplitConfig::default());
        assert!(flights.is_empty());
    }

    #[test]
    fn long_climbing_run_is_kept() {
        let mut points = Vec::new();
        for i in 0..20 {
            points.push(pt(i * 20, 100, 100, 50.0 + i as f32 * 10.0));
        }
        let flights = split(&points, &FlightSplitConfig::default());
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].len(), 20);
    }

    #[test]
    fn gap_over_threshold_splits_into_two_candidates() {
        let mut points = Vec::new();
        for i in 0..20 {
            points.push(pt(i * 20, 100, 100, 50.0 + i as f32 * 10.0));
        }
        for i in 0..20 {
            points.push(pt(10_000 + i * 20, 100, 100, 50.0 + i as f32 * 10.0));
        }
        let flights = split(&points, &FlightSplitConfig::default());
        assert_eq!(flights.len(), 2);
    }
}
