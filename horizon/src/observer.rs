use crate::{elevation::ElevationSource, error::HorizonError};
use geo::Coord;
use log::{debug, warn};
use serde::Serialize;

/// Where the sun is watched from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Observer {
    latitude: f64,
    longitude: f64,
    /// Eye height above local ground (meters).
    height_m: f64,
    /// Local ground elevation above sea level (meters).
    ground_m: f64,
}

impl Observer {
    /// Returns an observer standing on sea-level ground. Use
    /// [`Observer::with_ground_elevation`] or
    /// [`Observer::with_ground_from`] to set the ground.
    pub fn new(latitude: f64, longitude: f64, height_m: f64) -> Result<Self, HorizonError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(HorizonError::invalid(
                "latitude",
                format!("{latitude} is outside [-90, 90]"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(HorizonError::invalid(
                "longitude",
                format!("{longitude} is outside [-180, 180]"),
            ));
        }
        if !height_m.is_finite() || height_m < 0.0 {
            return Err(HorizonError::invalid(
                "height",
                format!("{height_m} must be a non-negative number of meters"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
            height_m,
            ground_m: 0.0,
        })
    }

    pub fn with_ground_elevation(mut self, ground_m: f64) -> Result<Self, HorizonError> {
        if !ground_m.is_finite() {
            return Err(HorizonError::invalid(
                "ground elevation",
                format!("{ground_m} is not finite"),
            ));
        }
        self.ground_m = ground_m;
        Ok(self)
    }

    /// Looks the ground elevation up in `source`, leaving it unchanged
    /// if the source has nothing at the observer's position.
    pub fn with_ground_from<S>(mut self, source: &S) -> Self
    where
        S: ElevationSource + ?Sized,
    {
        match source.elevation(self.coord()) {
            Some(ground_m) if ground_m.is_finite() => {
                debug!("observer ground elevation {ground_m:.1} m");
                self.ground_m = ground_m;
            }
            _ => warn!(
                "no ground elevation at ({}, {}), keeping {} m",
                self.latitude, self.longitude, self.ground_m
            ),
        }
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn ground_m(&self) -> f64 {
        self.ground_m
    }

    /// Elevation of the observer's eye above sea level.
    pub fn eye_elevation_m(&self) -> f64 {
        self.ground_m + self.height_m
    }

    /// Position as an `x: longitude, y: latitude` coordinate.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}
