use anyhow::{anyhow, Error as AnyError};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use geo::geometry::Coord;
use horizon::{
    search::{Direction, Mode},
    solar::Limb,
};
use std::{path::PathBuf, str::FromStr};

/// Find when the sun sets behind, or rises over, the surrounding
/// terrain.
///
/// Settings come from defaults, then the JSON `--config` file, then
/// flags.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// JSON config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of elevation tiles. Without one terrain is flat.
    #[arg(short, long)]
    pub tile_dir: Option<PathBuf>,

    /// Load tiles into memory instead of memory mapping them.
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,

    /// Observer "lat,lon,height", where 'height' is meters above
    /// ground.
    #[arg(short, long, allow_hyphen_values = true)]
    pub observer: Option<LatLonAlt>,

    /// Ground elevation at the observer in meters. Looked up in the
    /// tiles when not given.
    #[arg(long, allow_hyphen_values = true)]
    pub ground: Option<f64>,

    /// Observer's local calendar date, YYYY-MM-DD. Defaults to today.
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// sunrise, sunset, or both.
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// How far out to look for terrain, in meters.
    #[arg(short, long)]
    pub radius: Option<f64>,

    /// Samples per ray.
    #[arg(long)]
    pub steps: Option<usize>,

    /// Space samples geometrically, each gap this many times the
    /// last.
    #[arg(long)]
    pub spacing_ratio: Option<f64>,

    /// Terrestrial refraction coefficient.
    #[arg(long)]
    pub refraction: Option<f64>,

    /// Azimuth bucket width in degrees.
    #[arg(long)]
    pub bucket: Option<f64>,

    /// Scan step in seconds.
    #[arg(long)]
    pub step_secs: Option<i64>,

    /// Bisect down to this many milliseconds.
    #[arg(long)]
    pub precision_ms: Option<i64>,

    /// Stop at the scan step instead of bisecting.
    #[arg(long, default_value_t = false)]
    pub no_refine: bool,

    /// Give up this many minutes away from the flat-horizon time.
    #[arg(long)]
    pub window_mins: Option<i64>,

    /// upper, center, or lower.
    #[arg(long)]
    pub limb: Option<Limb>,

    /// auto, backward, or forward.
    #[arg(long)]
    pub sunrise_direction: Option<Direction>,

    /// auto, backward, or forward.
    #[arg(long)]
    pub sunset_direction: Option<Direction>,

    /// Air pressure in millibars, for solar refraction.
    #[arg(long)]
    pub pressure: Option<f64>,

    /// Air temperature in °C, for solar refraction.
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: Option<f64>,

    /// Display times at this offset from UTC, in hours.
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<f64>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct LatLonAlt(pub Coord<f64>, pub f64);

impl FromStr for LatLonAlt {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let mut parts = s.split(',').map(str::trim);
        let (Some(lat_str), Some(lon_str), alt_str, None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(anyhow!("not a valid lat,lon[,alt]"));
        };
        let lat = f64::from_str(lat_str)?;
        let lon = f64::from_str(lon_str)?;
        let alt = alt_str.map(f64::from_str).transpose()?.unwrap_or(0.0);
        Ok(Self(Coord { y: lat, x: lon }, alt))
    }
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print a human-readable report.
    Display,

    /// Print crossings as JSON.
    Json,

    /// Print every search observation as CSV.
    Trace,

    /// Plot the horizon profile to the terminal.
    Plot,
}
