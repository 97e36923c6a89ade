use crate::{
    angle::{horizon_angle, ElevationSample},
    constants::REFRACTION_COEFFICIENT,
    elevation::ElevationSource,
    error::HorizonError,
    observer::Observer,
    sampler::{sample, Spacing},
};
use dashmap::DashMap;
use geo::Coord;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

/// How rays are cast for a [`HorizonProfile`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayParams {
    /// How far (meters) from the observer terrain is considered.
    pub radius_m: f64,
    /// Intervals per ray; each ray has `steps + 1` samples.
    pub steps: usize,
    pub spacing: Spacing,
    /// Terrestrial refraction coefficient applied to earth curvature.
    pub refraction_coefficient: f64,
    /// Width (degrees) of the azimuth buckets rays are cached by.
    pub bucket_width_deg: f64,
}

impl Default for RayParams {
    fn default() -> Self {
        Self {
            radius_m: 20_000.0,
            steps: 80,
            spacing: Spacing::Linear,
            refraction_coefficient: REFRACTION_COEFFICIENT,
            bucket_width_deg: 0.5,
        }
    }
}

impl RayParams {
    pub fn validate(&self) -> Result<(), HorizonError> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(HorizonError::invalid(
                "radius",
                format!("{} must be a positive number of meters", self.radius_m),
            ));
        }
        if self.steps < 1 {
            return Err(HorizonError::invalid("steps", "at least one step is needed"));
        }
        if let Spacing::Geometric { ratio } = self.spacing {
            if !ratio.is_finite() || ratio <= 1.0 {
                return Err(HorizonError::invalid(
                    "spacing ratio",
                    format!("{ratio} must be greater than 1"),
                ));
            }
        }
        if !(0.0..1.0).contains(&self.refraction_coefficient) {
            return Err(HorizonError::invalid(
                "refraction coefficient",
                format!("{} is outside [0, 1)", self.refraction_coefficient),
            ));
        }
        if !self.bucket_width_deg.is_finite()
            || self.bucket_width_deg <= 0.0
            || self.bucket_width_deg > 90.0
        {
            return Err(HorizonError::invalid(
                "bucket width",
                format!("{} is outside (0, 90] degrees", self.bucket_width_deg),
            ));
        }
        Ok(())
    }
}

/// Terrain horizon in one azimuth bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HorizonAngle {
    /// Azimuth (degrees) the ray was cast along.
    pub bucket_deg: f64,
    /// Apparent elevation (degrees) of the terrain horizon.
    pub angle_deg: f64,
    /// Distance (meters) to the terrain that sets the horizon.
    pub peak_distance_m: Option<f64>,
    pub samples_used: usize,
    /// No usable elevation data; `angle_deg` is the flat horizon.
    pub degraded: bool,
}

/// Per-run memo of the terrain horizon around one observer.
///
/// Lookups from many threads are fine; a bucket's ray is cast and
/// resolved at most once.
pub struct HorizonProfile<'a, S: ?Sized> {
    observer: Observer,
    source: &'a S,
    params: RayParams,
    bucket_count: u32,
    buckets: DashMap<u32, HorizonAngle>,
}

impl<'a, S> HorizonProfile<'a, S>
where
    S: ElevationSource + ?Sized,
{
    pub fn new(observer: Observer, source: &'a S, params: RayParams) -> Result<Self, HorizonError> {
        params.validate()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bucket_count = (360.0 / params.bucket_width_deg).round() as u32;
        Ok(Self {
            observer,
            source,
            params,
            bucket_count,
            buckets: DashMap::new(),
        })
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn params(&self) -> &RayParams {
        &self.params
    }

    /// Returns the bucket index and bucket azimuth `azimuth_deg`
    /// falls in.
    pub fn bucket(&self, azimuth_deg: f64) -> (u32, f64) {
        let width = self.params.bucket_width_deg;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = ((azimuth_deg.rem_euclid(360.0) / width).round() as u32) % self.bucket_count;
        (index, f64::from(index) * width)
    }

    /// Returns the terrain horizon toward `azimuth_deg`, casting the
    /// bucket's ray on first use.
    pub fn angle_for(&self, azimuth_deg: f64) -> Result<HorizonAngle, HorizonError> {
        if !azimuth_deg.is_finite() {
            return Err(HorizonError::invalid("azimuth", "must be finite"));
        }
        let (index, bucket_deg) = self.bucket(azimuth_deg);
        self.buckets
            .entry(index)
            .or_try_insert_with(|| self.compute(bucket_deg))
            .map(|r| *r)
    }

    /// Computes every bucket around the observer in parallel,
    /// returned in azimuth order.
    pub fn sweep(&self) -> Result<Vec<HorizonAngle>, HorizonError> {
        let width = self.params.bucket_width_deg;
        (0..self.bucket_count)
            .into_par_iter()
            .map(|index| self.angle_for(f64::from(index) * width))
            .collect()
    }

    /// Number of buckets computed so far.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Private API.
impl<'a, S> HorizonProfile<'a, S>
where
    S: ElevationSource + ?Sized,
{
    fn compute(&self, bucket_deg: f64) -> Result<HorizonAngle, HorizonError> {
        let RayParams {
            radius_m,
            steps,
            spacing,
            refraction_coefficient,
            ..
        } = self.params;
        let now = std::time::Instant::now();

        let ray = sample(&self.observer, bucket_deg, radius_m, steps, spacing)?.collect::<Vec<_>>();
        let points = ray.iter().map(|s| s.coord).collect::<Vec<Coord<f64>>>();
        let elevations = match self.source.elevations(&points) {
            Ok(elevations) if elevations.len() == points.len() => elevations,
            Ok(elevations) => {
                warn!(
                    "azimuth {bucket_deg}: elevation source returned {} of {} points",
                    elevations.len(),
                    points.len()
                );
                vec![None; points.len()]
            }
            Err(e) => {
                warn!("azimuth {bucket_deg}: {e}");
                vec![None; points.len()]
            }
        };
        let samples = ray
            .iter()
            .zip(elevations)
            .map(|(s, elevation_m)| ElevationSample {
                coord: s.coord,
                distance_m: s.distance_m,
                elevation_m,
            });
        let ray_angle = horizon_angle(&self.observer, samples, refraction_coefficient);

        debug!(
            "azimuth {bucket_deg}: horizon {:.3}°, samples: {}, runtime: {}µs",
            ray_angle.angle_deg,
            ray_angle.samples_used,
            now.elapsed().as_micros()
        );
        if ray_angle.degraded {
            warn!("azimuth {bucket_deg}: no usable elevations, assuming a flat horizon");
        }

        Ok(HorizonAngle {
            bucket_deg,
            angle_deg: ray_angle.angle_deg,
            peak_distance_m: ray_angle.peak_distance_m,
            samples_used: ray_angle.samples_used,
            degraded: ray_angle.degraded,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{HorizonProfile, RayParams};
    use crate::{
        elevation::{ElevationSource, Flat},
        error::HorizonError,
        math::curvature_drop,
        observer::Observer,
        sampler::Spacing,
        MEAN_EARTH_RADIUS, REFRACTION_COEFFICIENT,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use geo::{Coord, HaversineDistance, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Initial great-circle bearing (degrees, [0, 360)) from `a` to `b`.
    pub(crate) fn bearing(a: Coord<f64>, b: Coord<f64>) -> f64 {
        let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
        let dlon = (b.x - a.x).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// Terrain that reads exactly `angle_deg` from `observer` at
    /// distance `d`, for every `d` along azimuths within `half_width`
    /// of `center_deg`. Flat at the observer's ground elsewhere.
    pub(crate) fn ridge(
        observer: Observer,
        center_deg: f64,
        half_width: f64,
        angle_deg: f64,
    ) -> impl Fn(Coord<f64>) -> Option<f64> + Sync {
        move |c: Coord<f64>| {
            let origin = observer.coord();
            let d = Point::from(origin).haversine_distance(&Point::from(c));
            let off = (bearing(origin, c) - center_deg + 180.0).rem_euclid(360.0) - 180.0;
            let ground = observer.ground_m();
            if d >= 1.0 && off.abs() <= half_width {
                Some(
                    observer.eye_elevation_m()
                        + d * angle_deg.to_radians().tan()
                        + curvature_drop(d, MEAN_EARTH_RADIUS, REFRACTION_COEFFICIENT),
                )
            } else {
                Some(ground)
            }
        }
    }

    struct Counting<S> {
        inner: S,
        calls: AtomicUsize,
    }

    impl<S: ElevationSource> ElevationSource for Counting<S> {
        fn elevations(&self, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.elevations(points)
        }
    }

    /// Never resolves anything.
    pub(crate) struct Unavailable;

    impl ElevationSource for Unavailable {
        fn elevations(&self, _: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
            Err(HorizonError::DataUnavailable("offline".into()))
        }
    }

    /// Answers for the first point only.
    struct Truncating;

    impl ElevationSource for Truncating {
        fn elevations(&self, _: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
            Ok(vec![Some(1_000.0)])
        }
    }

    #[test]
    fn test_buckets() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        let profile = HorizonProfile::new(observer, &Flat(0.0), RayParams::default()).unwrap();
        assert_eq!(profile.bucket(0.0), (0, 0.0));
        assert_eq!(profile.bucket(0.2), (0, 0.0));
        assert_eq!(profile.bucket(0.3), (1, 0.5));
        assert_eq!(profile.bucket(359.8), (0, 0.0));
        assert_eq!(profile.bucket(-90.0), (540, 270.0));
        assert_eq!(profile.bucket(720.5), (1, 0.5));
    }

    #[test]
    fn test_memoized() {
        let observer = Observer::new(35.0, 138.0, 0.0).unwrap();
        let source = Counting {
            inner: ridge(observer, 270.0, 1.0, 4.0),
            calls: AtomicUsize::new(0),
        };
        let profile = HorizonProfile::new(observer, &source, RayParams::default()).unwrap();
        assert!(profile.is_empty());
        let first = profile.angle_for(270.1).unwrap();
        let second = profile.angle_for(269.9).unwrap();
        assert_eq!(first.angle_deg.to_bits(), second.angle_deg.to_bits());
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(profile.len(), 1);
        assert_relative_eq!(first.angle_deg, 4.0, epsilon = 1e-6);
        assert!(!first.degraded);
    }

    #[test]
    fn test_single_peak() {
        let observer = Observer::new(46.5, 8.0, 0.0).unwrap();
        let angle_deg: f64 = 3.0;
        let peak = move |c: Coord<f64>| {
            let origin = observer.coord();
            let d = Point::from(origin).haversine_distance(&Point::from(c));
            let near_peak = (d - 5_000.0).abs() < 100.0 && (bearing(origin, c) - 123.0).abs() < 0.01;
            Some(if near_peak {
                d * f64::tan(angle_deg.to_radians())
                    + curvature_drop(d, MEAN_EARTH_RADIUS, REFRACTION_COEFFICIENT)
            } else {
                0.0
            })
        };
        let params = RayParams {
            radius_m: 10_000.0,
            steps: 20,
            ..RayParams::default()
        };
        let profile = HorizonProfile::new(observer, &peak, params).unwrap();

        let at_peak = profile.angle_for(123.0).unwrap();
        assert_relative_eq!(at_peak.angle_deg, angle_deg, epsilon = 1e-6);
        assert_relative_eq!(at_peak.peak_distance_m.unwrap(), 5_000.0);

        for azimuth in [0.0, 90.0, 200.0, 300.0] {
            assert_abs_diff_eq!(profile.angle_for(azimuth).unwrap().angle_deg, 0.0, epsilon = 0.01);
        }
    }

    #[test]
    fn test_degraded_source() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        let broken = |_: Coord<f64>| -> Option<f64> { None };
        let profile = HorizonProfile::new(observer, &broken, RayParams::default()).unwrap();
        let angle = profile.angle_for(45.0).unwrap();
        assert_eq!(angle.angle_deg, 0.0);
        assert!(angle.degraded);
        assert_eq!(angle.samples_used, 0);
    }

    #[test]
    fn test_unavailable_source() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        let profile = HorizonProfile::new(observer, &Unavailable, RayParams::default()).unwrap();
        let angle = profile.angle_for(180.0).unwrap();
        assert_eq!(angle.angle_deg, 0.0);
        assert!(angle.degraded);
        assert_eq!(angle.samples_used, 0);
        assert_eq!(angle.peak_distance_m, None);
        // Degraded buckets are cached like any other.
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn test_short_answer() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        let profile = HorizonProfile::new(observer, &Truncating, RayParams::default()).unwrap();
        let angle = profile.angle_for(10.0).unwrap();
        // The one elevation it did return is not trusted either.
        assert_eq!(angle.angle_deg, 0.0);
        assert!(angle.degraded);
        assert_eq!(angle.samples_used, 0);
    }

    #[test]
    fn test_sweep() {
        let observer = Observer::new(10.0, 10.0, 0.0).unwrap();
        let params = RayParams {
            radius_m: 2_000.0,
            steps: 4,
            bucket_width_deg: 10.0,
            spacing: Spacing::Geometric { ratio: 1.5 },
            ..RayParams::default()
        };
        let profile = HorizonProfile::new(observer, &Flat(0.0), params).unwrap();
        let sweep = profile.sweep().unwrap();
        assert_eq!(sweep.len(), 36);
        assert_eq!(profile.len(), 36);
        assert!(sweep
            .iter()
            .enumerate()
            .all(|(i, a)| a.bucket_deg == i as f64 * 10.0 && a.angle_deg < 0.0));
    }

    #[test]
    fn test_invalid_params() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        for params in [
            RayParams {
                radius_m: 0.0,
                ..RayParams::default()
            },
            RayParams {
                steps: 0,
                ..RayParams::default()
            },
            RayParams {
                bucket_width_deg: 0.0,
                ..RayParams::default()
            },
            RayParams {
                refraction_coefficient: 1.0,
                ..RayParams::default()
            },
            RayParams {
                spacing: Spacing::Geometric { ratio: 0.9 },
                ..RayParams::default()
            },
        ] {
            assert!(matches!(
                HorizonProfile::new(observer, &Flat(0.0), params),
                Err(HorizonError::InvalidParameter { .. })
            ));
        }
        let profile = HorizonProfile::new(observer, &Flat(0.0), RayParams::default()).unwrap();
        assert!(profile.angle_for(f64::NAN).is_err());
    }
}
