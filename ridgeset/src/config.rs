use crate::options::Cli;
use anyhow::{anyhow, Context, Error as AnyError};
use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use horizon::{
    search::{Direction, Mode, SearchParams},
    solar::{Limb, Spa},
    HorizonError, Observer, RayParams, Spacing, TileMode,
};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

/// Everything a run needs, as read from a JSON file.
///
/// Every field is optional in the file; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Eye height above ground (meters).
    pub height_m: f64,
    /// Ground elevation override (meters).
    pub ground_m: Option<f64>,
    pub date: Option<NaiveDate>,
    pub mode: Mode,

    pub tile_dir: Option<PathBuf>,
    pub in_memory: bool,

    pub radius_m: f64,
    pub steps: usize,
    pub spacing: Spacing,
    pub refraction_coefficient: f64,
    pub bucket_width_deg: f64,

    pub step_secs: i64,
    pub precision_ms: i64,
    pub refine: bool,
    pub window_mins: i64,
    pub limb: Limb,
    pub sunrise_direction: Direction,
    pub sunset_direction: Direction,

    /// Atmospheric pressure (millibars) for solar refraction.
    pub pressure_mbar: f64,
    /// Air temperature (°C) for solar refraction.
    pub temperature_c: f64,

    /// Offset from UTC (hours) times are displayed in.
    pub utc_offset_hours: f64,
}

impl Default for Config {
    fn default() -> Self {
        let ray = RayParams::default();
        let search = SearchParams::default();
        Self {
            latitude: None,
            longitude: None,
            height_m: 0.0,
            ground_m: None,
            date: None,
            mode: Mode::default(),
            tile_dir: None,
            in_memory: false,
            radius_m: ray.radius_m,
            steps: ray.steps,
            spacing: ray.spacing,
            refraction_coefficient: ray.refraction_coefficient,
            bucket_width_deg: ray.bucket_width_deg,
            step_secs: search.step.num_seconds(),
            precision_ms: search.precision.num_milliseconds(),
            refine: search.refine,
            window_mins: search.window.num_minutes(),
            limb: search.limb,
            sunrise_direction: search.sunrise_direction,
            sunset_direction: search.sunset_direction,
            pressure_mbar: 1013.25,
            temperature_c: 15.0,
            utc_offset_hours: 0.0,
        }
    }
}

/// A validated [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub observer: Observer,
    pub ground_m: Option<f64>,
    pub date: NaiveDate,
    pub mode: Mode,
    pub tile_dir: Option<PathBuf>,
    pub tile_mode: TileMode,
    pub ray: RayParams,
    pub search: SearchParams,
    pub ephemeris: Spa,
    pub offset: FixedOffset,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnyError> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// Overrides file values with whatever was given on the command
    /// line.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.tile_dir {
            self.tile_dir = Some(dir.clone());
        }
        if cli.in_memory {
            self.in_memory = true;
        }
        if let Some(observer) = cli.observer {
            self.latitude = Some(observer.0.y);
            self.longitude = Some(observer.0.x);
            self.height_m = observer.1;
        }
        if let Some(ground) = cli.ground {
            self.ground_m = Some(ground);
        }
        if let Some(date) = cli.date {
            self.date = Some(date);
        }
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
        if let Some(radius) = cli.radius {
            self.radius_m = radius;
        }
        if let Some(steps) = cli.steps {
            self.steps = steps;
        }
        if let Some(ratio) = cli.spacing_ratio {
            self.spacing = Spacing::Geometric { ratio };
        }
        if let Some(k) = cli.refraction {
            self.refraction_coefficient = k;
        }
        if let Some(width) = cli.bucket {
            self.bucket_width_deg = width;
        }
        if let Some(secs) = cli.step_secs {
            self.step_secs = secs;
        }
        if let Some(ms) = cli.precision_ms {
            self.precision_ms = ms;
        }
        if cli.no_refine {
            self.refine = false;
        }
        if let Some(mins) = cli.window_mins {
            self.window_mins = mins;
        }
        if let Some(limb) = cli.limb {
            self.limb = limb;
        }
        if let Some(direction) = cli.sunrise_direction {
            self.sunrise_direction = direction;
        }
        if let Some(direction) = cli.sunset_direction {
            self.sunset_direction = direction;
        }
        if let Some(pressure) = cli.pressure {
            self.pressure_mbar = pressure;
        }
        if let Some(temperature) = cli.temperature {
            self.temperature_c = temperature;
        }
        if let Some(hours) = cli.utc_offset {
            self.utc_offset_hours = hours;
        }
    }

    pub fn settings(&self) -> Result<Settings, AnyError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(anyhow!("observer latitude and longitude are required"));
        };
        let mut observer = Observer::new(latitude, longitude, self.height_m)?;
        if let Some(ground) = self.ground_m {
            observer = observer.with_ground_elevation(ground)?;
        }

        let offset = self.offset()?;

        let ray = RayParams {
            radius_m: self.radius_m,
            steps: self.steps,
            spacing: self.spacing,
            refraction_coefficient: self.refraction_coefficient,
            bucket_width_deg: self.bucket_width_deg,
        };
        ray.validate()?;

        let search = SearchParams {
            step: duration("step", self.step_secs, Duration::try_seconds)?,
            window: duration("window", self.window_mins, Duration::try_minutes)?,
            precision: duration("precision", self.precision_ms, Duration::try_milliseconds)?,
            refine: self.refine,
            limb: self.limb,
            sunrise_direction: self.sunrise_direction,
            sunset_direction: self.sunset_direction,
        };
        search.validate()?;

        let ephemeris = Spa::with_atmosphere(self.pressure_mbar, self.temperature_c)
            .context("refraction atmosphere")?;

        let date = self
            .date
            .unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());

        Ok(Settings {
            observer,
            ground_m: self.ground_m,
            date,
            mode: self.mode,
            tile_dir: self.tile_dir.clone(),
            tile_mode: if self.in_memory {
                TileMode::InMem
            } else {
                TileMode::MemMap
            },
            ray,
            search,
            ephemeris,
            offset,
        })
    }

    fn offset(&self) -> Result<FixedOffset, AnyError> {
        let hours = self.utc_offset_hours;
        if !hours.is_finite() {
            return Err(anyhow!("utc offset {hours} is not a number"));
        }
        #[allow(clippy::cast_possible_truncation)]
        let secs = (hours * 3_600.0).round() as i32;
        FixedOffset::east_opt(secs).ok_or_else(|| anyhow!("utc offset {hours}h is out of range"))
    }
}

fn duration(
    name: &'static str,
    value: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, HorizonError> {
    unit(value).ok_or_else(|| HorizonError::InvalidParameter {
        name,
        reason: format!("{value} is out of range"),
    })
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::options::Cli;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use clap::Parser;
    use horizon::{
        search::{Direction, Mode},
        solar::{Limb, Spa},
        HorizonError, Spacing, TileMode,
    };
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str(r#"{"latitude": 35.0, "longitude": 138.5}"#).unwrap();
        assert_eq!(
            config,
            Config {
                latitude: Some(35.0),
                longitude: Some(138.5),
                ..Config::default()
            }
        );
        let settings = config.settings().unwrap();
        assert_eq!(settings.mode, Mode::Sunset);
        assert_eq!(settings.search.step, Duration::seconds(60));
        assert_eq!(settings.search.window, Duration::hours(6));
        assert_eq!(settings.search.precision, Duration::seconds(1));
        assert_eq!(settings.search.limb, Limb::Upper);
        assert_eq!(settings.ray.steps, 80);
        assert_eq!(settings.tile_mode, TileMode::MemMap);
        assert_eq!(settings.observer.ground_m(), 0.0);
        assert_eq!(settings.ephemeris, Spa::default());
    }

    #[test]
    fn test_load_and_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "latitude": 46.5,
                "longitude": 8.0,
                "height_m": 1.5,
                "mode": "both",
                "date": "2024-06-21",
                "spacing": {{"kind": "geometric", "ratio": 1.05}},
                "limb": "lower",
                "sunset_direction": "backward",
                "utc_offset_hours": 2
            }}"#
        )
        .unwrap();
        let mut config = Config::load(file.path()).unwrap();
        assert_eq!(config.spacing, Spacing::Geometric { ratio: 1.05 });

        let cli = Cli::try_parse_from([
            "ridgeset",
            "--observer",
            "46.6,8.1,2",
            "--ground",
            "1200",
            "--limb",
            "upper",
            "--no-refine",
            "display",
        ])
        .unwrap();
        config.apply(&cli);
        let settings = config.settings().unwrap();

        // Flags win over the file; the file wins over defaults.
        assert_relative_eq!(settings.observer.latitude(), 46.6);
        assert_relative_eq!(settings.observer.longitude(), 8.1);
        assert_relative_eq!(settings.observer.height_m(), 2.0);
        assert_relative_eq!(settings.observer.ground_m(), 1200.0);
        assert_eq!(settings.search.limb, Limb::Upper);
        assert!(!settings.search.refine);
        assert_eq!(settings.search.sunset_direction, Direction::Backward);
        assert_eq!(settings.mode, Mode::Both);
        assert_eq!(settings.date, NaiveDate::from_ymd_opt(2024, 6, 21).unwrap());
        assert_eq!(settings.offset.local_minus_utc(), 7_200);
    }

    #[test]
    fn test_rejects() {
        assert!(serde_json::from_str::<Config>(r#"{"latitude": 1, "colour": "red"}"#).is_err());
        assert!(Config::default().settings().is_err());

        let located = Config {
            latitude: Some(10.0),
            longitude: Some(10.0),
            ..Config::default()
        };
        for bad in [
            Config {
                latitude: Some(91.0),
                ..located.clone()
            },
            Config {
                radius_m: -1.0,
                ..located.clone()
            },
            Config {
                step_secs: 0,
                ..located.clone()
            },
            Config {
                bucket_width_deg: 0.0,
                ..located.clone()
            },
            Config {
                window_mins: 24 * 60 + 1,
                ..located.clone()
            },
            Config {
                window_mins: i64::MAX,
                ..located.clone()
            },
            Config {
                step_secs: i64::MAX,
                ..located.clone()
            },
        ] {
            let err = bad.settings().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<HorizonError>(),
                Some(HorizonError::InvalidParameter { .. })
            ));
        }
        assert!(Config {
            utc_offset_hours: 30.0,
            ..located.clone()
        }
        .settings()
        .is_err());
        assert!(Config {
            pressure_mbar: 0.0,
            ..located
        }
        .settings()
        .is_err());
    }
}
