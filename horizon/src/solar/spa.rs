//! NREL's Solar Position Algorithm, by way of `solar_positioning`.

use super::{Ephemeris, EphemerisError, Event, Polar, SolarPosition};
use crate::observer::Observer;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use log::debug;
use solar_positioning::{spa, time::DeltaT, Horizon, RefractionCorrection, SunriseResult};

/// Built-in [`Ephemeris`].
///
/// ΔT is estimated from the calendar month, so dates between years
/// -500 and 3000 are supported. Refraction follows SPA: altitudes
/// above the conventional rise/set altitude (-0.833°) are refracted
/// for the configured atmosphere, lower ones are left geometric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spa {
    refraction: Option<RefractionCorrection>,
}

impl Default for Spa {
    /// Standard atmosphere: 1013.25 mbar at 15 °C.
    fn default() -> Self {
        Self {
            refraction: Some(RefractionCorrection::standard()),
        }
    }
}

impl Spa {
    /// `None` reports geometric altitudes.
    pub fn new(refraction: Option<RefractionCorrection>) -> Self {
        Self { refraction }
    }

    /// Refraction for `pressure` (millibars) and `temperature` (°C).
    pub fn with_atmosphere(pressure: f64, temperature: f64) -> Result<Self, EphemerisError> {
        Ok(Self::new(Some(RefractionCorrection::new(
            pressure,
            temperature,
        )?)))
    }
}

impl Ephemeris for Spa {
    fn rise_set(
        &self,
        observer: &Observer,
        date: NaiveDate,
        event: Event,
    ) -> Result<DateTime<Utc>, EphemerisError> {
        let noon = local_noon(observer, date).ok_or(EphemerisError::OutOfRange(date))?;
        let result = spa::sunrise_sunset_for_horizon(
            noon,
            observer.latitude(),
            observer.longitude(),
            delta_t(date)?,
            Horizon::SunriseSunset,
        )?;
        let instant = match (result, event) {
            (SunriseResult::RegularDay { sunrise, .. }, Event::Sunrise) => sunrise,
            (SunriseResult::RegularDay { sunset, .. }, Event::Sunset) => sunset,
            (SunriseResult::AllDay { .. }, _) => {
                return Err(EphemerisError::NoEvent {
                    event,
                    date,
                    polar: Polar::PolarDay,
                })
            }
            (SunriseResult::AllNight { .. }, _) => {
                return Err(EphemerisError::NoEvent {
                    event,
                    date,
                    polar: Polar::PolarNight,
                })
            }
        }
        .with_timezone(&Utc);
        debug!("flat {event} on {date}: {instant}");
        Ok(instant)
    }

    fn position(
        &self,
        observer: &Observer,
        instant: DateTime<Utc>,
    ) -> Result<SolarPosition, EphemerisError> {
        let position = spa::solar_position(
            instant,
            observer.latitude(),
            observer.longitude(),
            observer.eye_elevation_m(),
            delta_t(instant.date_naive())?,
            self.refraction,
        )?;
        Ok(SolarPosition {
            altitude_deg: position.elevation_angle(),
            azimuth_deg: position.azimuth(),
        })
    }
}

/// Noon on `date` in the observer's mean solar time, which keeps
/// the day's transit on `date`.
fn local_noon(observer: &Observer, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    #[allow(clippy::cast_possible_truncation)]
    let offset = FixedOffset::east_opt((observer.longitude() * 240.0).round() as i32)?;
    date.and_hms_opt(12, 0, 0)?
        .and_local_timezone(offset)
        .single()
}

fn delta_t(date: NaiveDate) -> Result<f64, EphemerisError> {
    DeltaT::estimate_from_date_like(date).map_err(|_| EphemerisError::OutOfRange(date))
}
