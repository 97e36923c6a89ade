//! Where the sun is, and when it rises and sets over a flat horizon.

mod spa;

pub use spa::Spa;

use crate::{constants::SOLAR_SEMIDIAMETER, observer::Observer};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Sunrise,
    Sunset,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Sunrise => f.write_str("sunrise"),
            Event::Sunset => f.write_str("sunset"),
        }
    }
}

/// Why the sun neither rises nor sets on a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polar {
    /// Above the horizon all day.
    PolarDay,
    /// Below the horizon all day.
    PolarNight,
}

impl fmt::Display for Polar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polar::PolarDay => f.write_str("polar day"),
            Polar::PolarNight => f.write_str("polar night"),
        }
    }
}

/// The sun as seen by an observer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SolarPosition {
    /// Apparent altitude of the disc center (degrees), atmospheric
    /// refraction included.
    pub altitude_deg: f64,
    /// Degrees clockwise from north, in [0, 360).
    pub azimuth_deg: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EphemerisError {
    #[error("no {event} on {date}: {polar}")]
    NoEvent {
        event: Event,
        date: NaiveDate,
        polar: Polar,
    },

    #[error("{0} is outside the ephemeris range")]
    OutOfRange(NaiveDate),

    #[error("ephemeris produced a non-finite value")]
    NonFinite,

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Spa(#[from] solar_positioning::Error),
}

/// A source of solar positions and flat-horizon rise/set times.
pub trait Ephemeris: Sync {
    /// Returns the conventional flat-horizon `event` instant on the
    /// observer's local calendar `date`.
    fn rise_set(
        &self,
        observer: &Observer,
        date: NaiveDate,
        event: Event,
    ) -> Result<DateTime<Utc>, EphemerisError>;

    /// Returns the sun's apparent position at `instant`.
    fn position(
        &self,
        observer: &Observer,
        instant: DateTime<Utc>,
    ) -> Result<SolarPosition, EphemerisError>;
}

/// Asks `ephemeris` for the sun's position and normalizes it:
/// azimuth is wrapped into [0, 360) and non-finite values are
/// rejected.
pub fn position_at<E>(
    ephemeris: &E,
    observer: &Observer,
    instant: DateTime<Utc>,
) -> Result<SolarPosition, EphemerisError>
where
    E: Ephemeris + ?Sized,
{
    let SolarPosition {
        altitude_deg,
        azimuth_deg,
    } = ephemeris.position(observer, instant)?;
    if !altitude_deg.is_finite() || !azimuth_deg.is_finite() {
        return Err(EphemerisError::NonFinite);
    }
    Ok(SolarPosition {
        altitude_deg,
        azimuth_deg: wrap_azimuth(azimuth_deg),
    })
}

pub(crate) fn wrap_azimuth(azimuth_deg: f64) -> f64 {
    let wrapped = azimuth_deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Which point of the solar disc has to clear the terrain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Limb {
    /// Top edge: sunset is the last glint, sunrise the first.
    #[default]
    Upper,
    Center,
    /// Bottom edge: the whole disc.
    Lower,
}

impl Limb {
    /// Degrees to add to the disc center's altitude.
    pub fn offset_deg(self) -> f64 {
        match self {
            Limb::Upper => SOLAR_SEMIDIAMETER,
            Limb::Center => 0.0,
            Limb::Lower => -SOLAR_SEMIDIAMETER,
        }
    }
}

impl FromStr for Limb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upper" => Ok(Limb::Upper),
            "center" | "centre" => Ok(Limb::Center),
            "lower" => Ok(Limb::Lower),
            other => Err(format!("unknown limb '{other}', expected upper, center or lower")),
        }
    }
}

impl fmt::Display for Limb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limb::Upper => f.write_str("upper"),
            Limb::Center => f.write_str("center"),
            Limb::Lower => f.write_str("lower"),
        }
    }
}
