//! # Terrain-aware sunrise and sunset
//!
//! `horizon` finds the instant the sun's disc disappears behind (or
//! emerges from) the terrain around an observer, instead of the flat
//! sea-level horizon standard almanacs assume.
//!
//! The pieces, leaves first:
//!
//! - [`sample`] walks a great-circle ray from the observer.
//! - [`horizon_angle`] reduces elevations along a ray to the highest
//!   apparent elevation angle.
//! - [`HorizonProfile`] memoizes those angles per azimuth bucket.
//! - [`solar`] wraps the ephemeris ([`solar::Spa`] by default).
//! - [`search`] steps time from the flat-horizon instant until the
//!   sun meets the terrain.

mod angle;
mod constants;
mod elevation;
mod error;
mod math;
mod observer;
mod profile;
mod sampler;
pub mod search;
pub mod solar;
mod tiles;

pub use crate::{
    angle::{horizon_angle, ElevationSample, RayAngle},
    constants::{MEAN_EARTH_RADIUS, REFRACTION_COEFFICIENT, SOLAR_SEMIDIAMETER},
    elevation::{ElevationSource, Flat},
    error::HorizonError,
    math::curvature_drop,
    observer::Observer,
    profile::{HorizonAngle, HorizonProfile, RayParams},
    sampler::{sample, RaySample, Spacing},
    tiles::{TileMode, TileSource},
};
pub use {chrono, geo};
