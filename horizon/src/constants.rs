/// Mean earth radius in meters, the same value `geo`'s haversine
/// routines use.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Default coefficient of terrestrial refraction.
pub const REFRACTION_COEFFICIENT: f64 = 0.13;

/// Mean apparent solar semidiameter (degrees).
pub const SOLAR_SEMIDIAMETER: f64 = 0.2667;

/// Tolerance (degrees) on altitude vs horizon comparisons.
pub(crate) const ANGLE_EPSILON: f64 = 1e-9;

/// Samples closer than this (meters) to the observer are ignored.
pub(crate) const MIN_SAMPLE_DISTANCE: f64 = 1.0;
