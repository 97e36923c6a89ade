use crate::error::HorizonError;
use geo::Coord;

/// Anything that can resolve ground elevation (meters above sea
/// level) for `x: longitude, y: latitude` coordinates.
pub trait ElevationSource: Sync {
    /// Resolves `points` in one batch. The result has the same length
    /// and order as `points`; `None` marks a point with no data.
    ///
    /// Returns [`HorizonError::DataUnavailable`] when nothing at all
    /// could be resolved.
    fn elevations(&self, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError>;

    fn elevation(&self, point: Coord<f64>) -> Option<f64> {
        self.elevations(&[point])
            .ok()
            .and_then(|mut elevations| elevations.pop().flatten())
    }
}

impl<F> ElevationSource for F
where
    F: Fn(Coord<f64>) -> Option<f64> + Sync,
{
    fn elevations(&self, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
        Ok(points.iter().map(|&point| self(point)).collect())
    }
}

/// Level ground everywhere at a fixed elevation.
#[derive(Clone, Copy, Debug)]
pub struct Flat(pub f64);

impl ElevationSource for Flat {
    fn elevations(&self, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
        Ok(vec![Some(self.0); points.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::{ElevationSource, Flat};
    use geo::coord;

    #[test]
    fn test_closure_source() {
        let north_only = |c: geo::Coord<f64>| (c.y > 0.0).then_some(c.y * 100.0);
        let points = [coord!(x: 0.0, y: 1.0), coord!(x: 0.0, y: -1.0)];
        assert_eq!(
            north_only.elevations(&points).unwrap(),
            vec![Some(100.0), None]
        );
        assert_eq!(north_only.elevation(coord!(x: 5.0, y: 2.0)), Some(200.0));
        assert_eq!(Flat(3.0).elevation(coord!(x: 0.0, y: 0.0)), Some(3.0));
    }
}
