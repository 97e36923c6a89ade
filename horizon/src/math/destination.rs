//! Great-circle walk outward from a fixed origin along a fixed
//! bearing. Same spherical model as [geo]'s `HaversineDestination`,
//! with the origin's trig precomputed once per ray.

use crate::constants::MEAN_EARTH_RADIUS;
use geo::{CoordFloat, Point};
use num_traits::FromPrimitive;

pub struct DestinationIter<T: CoordFloat = f64> {
    origin: Point<T>,
    lat_sin: T,
    lat_cos: T,
    lon: T,
    bearing_sin: T,
    bearing_cos: T,
    radius_m: T,
    max_distance_m: T,
    /// Growth ratio between consecutive gaps. `None` for even spacing.
    ratio: Option<T>,
    steps: usize,
    current: usize,
}

impl<T: CoordFloat + FromPrimitive> DestinationIter<T> {
    /// Yields `steps + 1` points, from the origin out to
    /// `max_distance_m`.
    pub fn new(
        origin: Point<T>,
        bearing_deg: T,
        max_distance_m: T,
        steps: usize,
        ratio: Option<T>,
    ) -> Self {
        let (lat_sin, lat_cos) = origin.y().to_radians().sin_cos();
        let (bearing_sin, bearing_cos) = bearing_deg.to_radians().sin_cos();
        Self {
            origin,
            lat_sin,
            lat_cos,
            lon: origin.x().to_radians(),
            bearing_sin,
            bearing_cos,
            radius_m: T::from(MEAN_EARTH_RADIUS).unwrap(),
            max_distance_m,
            ratio,
            steps,
            current: 0,
        }
    }

    fn distance_at(&self, i: usize) -> T {
        let n = T::from_usize(self.steps).unwrap();
        let i = T::from_usize(i).unwrap();
        match self.ratio {
            None => self.max_distance_m * i / n,
            Some(ratio) => {
                self.max_distance_m * (ratio.powf(i) - T::one()) / (ratio.powf(n) - T::one())
            }
        }
    }

    fn point_at(&self, distance_m: T) -> Point<T> {
        if distance_m == T::zero() {
            return self.origin;
        }
        let (delta_sin, delta_cos) = (distance_m / self.radius_m).sin_cos();
        let lat_sin = self.lat_sin * delta_cos + self.lat_cos * delta_sin * self.bearing_cos;
        let lat = lat_sin.asin();
        let lon = self.lon
            + (self.bearing_sin * delta_sin * self.lat_cos).atan2(delta_cos - self.lat_sin * lat_sin);
        Point::new(wrap_longitude(lon.to_degrees()), lat.to_degrees())
    }
}

fn wrap_longitude<T: CoordFloat>(lon: T) -> T {
    let full = T::from(360.0).unwrap();
    let half = T::from(180.0).unwrap();
    let wrapped = (lon + half) % full;
    if wrapped < T::zero() {
        wrapped + full - half
    } else {
        wrapped - half
    }
}

impl<T: CoordFloat + FromPrimitive> Iterator for DestinationIter<T> {
    type Item = (Point<T>, T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current > self.steps {
            return None;
        }
        // Pin the last sample to the requested range exactly.
        let distance = if self.current == self.steps {
            self.max_distance_m
        } else {
            self.distance_at(self.current)
        };
        self.current += 1;
        Some((self.point_at(distance), distance))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len();
        (remaining, Some(remaining))
    }
}

impl<T: CoordFloat + FromPrimitive> ExactSizeIterator for DestinationIter<T> {
    fn len(&self) -> usize {
        (self.steps + 1).saturating_sub(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::{wrap_longitude, DestinationIter};
    use approx::assert_relative_eq;
    use geo::{point, HaversineDestination, HaversineDistance};

    #[test]
    fn test_matches_geo_destination() {
        let origin = point!(x: 138.5187, y: 35.0153);
        let iter = DestinationIter::new(origin, 271.5, 20_000.0, 10, None);
        assert_eq!(iter.len(), 11);
        for (i, (point, distance)) in iter.enumerate() {
            assert_relative_eq!(distance, 2_000.0 * i as f64, epsilon = 1e-9);
            let expected = origin.haversine_destination(271.5, distance);
            assert_relative_eq!(point.x(), expected.x(), epsilon = 1e-9);
            assert_relative_eq!(point.y(), expected.y(), epsilon = 1e-9);
            assert_relative_eq!(origin.haversine_distance(&point), distance, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_geometric_spacing() {
        let origin = point!(x: 0.0, y: 0.0);
        let distances = DestinationIter::new(origin, 90.0, 7_000.0, 3, Some(2.0))
            .map(|(_, d)| d)
            .collect::<Vec<_>>();
        assert_eq!(distances.len(), 4);
        assert_relative_eq!(distances[0], 0.0);
        assert_relative_eq!(distances[1], 1_000.0, epsilon = 1e-9);
        assert_relative_eq!(distances[2], 3_000.0, epsilon = 1e-9);
        assert_eq!(distances[3], 7_000.0);
    }

    #[test]
    fn test_antimeridian() {
        let origin = point!(x: 179.99, y: 0.0);
        let (last, _) = DestinationIter::new(origin, 90.0, 5_000.0, 1, None)
            .last()
            .unwrap();
        assert!(last.x() < -179.9 && last.x() >= -180.0);
        assert_relative_eq!(wrap_longitude(190.0), -170.0);
        assert_relative_eq!(wrap_longitude(-190.0), 170.0);
        assert_relative_eq!(wrap_longitude(45.0), 45.0);
    }

    #[test]
    fn test_size_hint_shrinks() {
        let mut iter = DestinationIter::new(point!(x: 0.0, y: 0.0), 0.0, 100.0, 4, None);
        assert_eq!(iter.size_hint(), (5, Some(5)));
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 3);
    }
}
