use crate::{
    constants::{MEAN_EARTH_RADIUS, MIN_SAMPLE_DISTANCE},
    math::apparent_elevation_angle,
    observer::Observer,
};
use geo::Coord;
use serde::Serialize;

/// One point along a ray with its resolved ground elevation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElevationSample {
    pub coord: Coord<f64>,
    /// Great-circle distance from the observer (meters).
    pub distance_m: f64,
    /// Ground elevation above sea level (meters), `None` when the
    /// elevation source had no data.
    pub elevation_m: Option<f64>,
}

/// The highest apparent elevation along one ray.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RayAngle {
    /// Degrees above (positive) or below (negative) the observer's
    /// horizontal plane.
    pub angle_deg: f64,
    /// Distance (meters) to the sample that set `angle_deg`.
    pub peak_distance_m: Option<f64>,
    pub samples_used: usize,
    /// No sample was usable; `angle_deg` is the flat horizon.
    pub degraded: bool,
}

/// Reduces a ray's samples to the maximum apparent elevation angle
/// seen from `observer`, correcting for earth curvature with
/// terrestrial refraction coefficient `refraction_coefficient`.
///
/// Samples nearer than one meter or without elevation are skipped.
/// When nothing is left the result is 0° and marked degraded.
pub fn horizon_angle<I>(observer: &Observer, samples: I, refraction_coefficient: f64) -> RayAngle
where
    I: IntoIterator<Item = ElevationSample>,
{
    let eye_m = observer.eye_elevation_m();
    let mut best: Option<(f64, f64)> = None;
    let mut samples_used = 0;

    for ElevationSample {
        distance_m,
        elevation_m,
        ..
    } in samples
    {
        let Some(elevation_m) = elevation_m else {
            continue;
        };
        if !(distance_m >= MIN_SAMPLE_DISTANCE && elevation_m.is_finite()) {
            continue;
        }
        samples_used += 1;
        let angle = apparent_elevation_angle(
            elevation_m - eye_m,
            distance_m,
            MEAN_EARTH_RADIUS,
            refraction_coefficient,
        );
        if best.map_or(true, |(best_angle, _)| angle > best_angle) {
            best = Some((angle, distance_m));
        }
    }

    match best {
        Some((angle, distance_m)) => RayAngle {
            angle_deg: angle.to_degrees(),
            peak_distance_m: Some(distance_m),
            samples_used,
            degraded: false,
        },
        None => RayAngle {
            angle_deg: 0.0,
            peak_distance_m: None,
            samples_used: 0,
            degraded: true,
        },
    }
}
