use crate::{error::HorizonError, math::DestinationIter, observer::Observer};
use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

/// How sample distances are laid out along a ray.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Spacing {
    /// Evenly spaced.
    #[default]
    Linear,
    /// Each gap is `ratio` times the previous one, so samples are
    /// densest near the observer.
    Geometric { ratio: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaySample {
    pub coord: Coord<f64>,
    /// Great-circle distance from the observer (meters).
    pub distance_m: f64,
}

/// Walks a great-circle ray from `observer` toward `azimuth_deg`,
/// returning `step_count + 1` points from the observer itself out to
/// `max_radius_m`.
pub fn sample(
    observer: &Observer,
    azimuth_deg: f64,
    max_radius_m: f64,
    step_count: usize,
    spacing: Spacing,
) -> Result<impl ExactSizeIterator<Item = RaySample>, HorizonError> {
    if !azimuth_deg.is_finite() {
        return Err(HorizonError::invalid("azimuth", "must be finite"));
    }
    if !max_radius_m.is_finite() || max_radius_m <= 0.0 {
        return Err(HorizonError::invalid(
            "radius",
            format!("{max_radius_m} must be a positive number of meters"),
        ));
    }
    if step_count < 1 {
        return Err(HorizonError::invalid("steps", "at least one step is needed"));
    }
    let ratio = match spacing {
        Spacing::Linear => None,
        Spacing::Geometric { ratio } if ratio.is_finite() && ratio > 1.0 => Some(ratio),
        Spacing::Geometric { ratio } => {
            return Err(HorizonError::invalid(
                "spacing ratio",
                format!("{ratio} must be greater than 1"),
            ))
        }
    };
    let origin = Point::from(observer.coord());
    Ok(
        DestinationIter::new(origin, azimuth_deg, max_radius_m, step_count, ratio).map(
            |(point, distance_m)| RaySample {
                coord: point.0,
                distance_m,
            },
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{sample, Spacing};
    use crate::{error::HorizonError, observer::Observer};
    use approx::assert_relative_eq;
    use geo::{HaversineDistance, Point};

    #[test]
    fn test_endpoints() {
        let observer = Observer::new(35.0153, 138.5187, 0.0).unwrap();
        let samples = sample(&observer, 270.0, 20_000.0, 80, Spacing::Linear)
            .unwrap()
            .collect::<Vec<_>>();
        assert_eq!(samples.len(), 81);
        assert_eq!(samples[0].coord, observer.coord());
        assert_eq!(samples[0].distance_m, 0.0);

        let last = samples.last().unwrap();
        assert_eq!(last.distance_m, 20_000.0);
        assert_relative_eq!(
            Point::from(observer.coord()).haversine_distance(&Point::from(last.coord)),
            20_000.0,
            epsilon = 1e-6
        );
        // Due west keeps (nearly) the same latitude and moves west.
        assert!(last.coord.x < observer.longitude());
        assert_relative_eq!(last.coord.y, observer.latitude(), epsilon = 1e-3);
    }

    #[test]
    fn test_deterministic() {
        let observer = Observer::new(-12.5, 44.0, 2.0).unwrap();
        let a = sample(&observer, 33.3, 5_000.0, 7, Spacing::Linear)
            .unwrap()
            .collect::<Vec<_>>();
        let b = sample(&observer, 33.3, 5_000.0, 7, Spacing::Linear)
            .unwrap()
            .collect::<Vec<_>>();
        assert_eq!(a, b);
    }

    #[test]
    fn test_geometric_monotonic() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        let distances = sample(
            &observer,
            180.0,
            30_000.0,
            40,
            Spacing::Geometric { ratio: 1.08 },
        )
        .unwrap()
        .map(|s| s.distance_m)
        .collect::<Vec<_>>();
        assert_eq!(distances.len(), 41);
        assert_eq!(*distances.last().unwrap(), 30_000.0);
        let gaps = distances.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();
        assert!(gaps.iter().all(|&gap| gap > 0.0));
        assert!(gaps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_invalid() {
        let observer = Observer::new(0.0, 0.0, 0.0).unwrap();
        for (radius, steps, spacing) in [
            (0.0, 10, Spacing::Linear),
            (-5.0, 10, Spacing::Linear),
            (f64::NAN, 10, Spacing::Linear),
            (1_000.0, 0, Spacing::Linear),
            (1_000.0, 10, Spacing::Geometric { ratio: 1.0 }),
        ] {
            assert!(matches!(
                sample(&observer, 0.0, radius, steps, spacing),
                Err(HorizonError::InvalidParameter { .. })
            ));
        }
    }
}
