mod config;
mod options;

use anyhow::Error as AnyError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use clap::Parser;
use config::{Config, Settings};
use horizon::{
    search::{resolve, Crossing, Observation, SearchEvent},
    solar::Event,
    ElevationSource, Flat, HorizonAngle, HorizonProfile, Observer, TileSource,
};
use log::{debug, info, warn};
use options::{Cli, Command as CliCmd};
use serde::Serialize;
use std::{io::Write, sync::Mutex};
use textplots::{Chart, Plot, Shape};

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    env_logger::init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply(&cli);
    let Settings {
        observer,
        ground_m,
        date,
        mode,
        tile_dir,
        tile_mode,
        ray,
        search,
        ephemeris,
        offset,
    } = config.settings()?;

    let source: Box<dyn ElevationSource> = match tile_dir {
        Some(tile_dir) => Box::new(TileSource::new(tile_dir, tile_mode)?),
        None => {
            warn!("no tile directory given, assuming flat terrain");
            Box::new(Flat(ground_m.unwrap_or(0.0)))
        }
    };
    let observer = match ground_m {
        Some(_) => observer,
        None => observer.with_ground_from(source.as_ref()),
    };
    info!(
        "observer at ({}, {}), eye {:.1} m above sea level",
        observer.latitude(),
        observer.longitude(),
        observer.eye_elevation_m()
    );

    let profile = HorizonProfile::new(observer, source.as_ref(), ray)?;

    match cli.cmd {
        CliCmd::Display => {
            let crossings = resolve(&ephemeris, &profile, search, date, mode, log_event)?;
            print_display(&crossings, date, offset);
        }
        CliCmd::Json => {
            let crossings = resolve(&ephemeris, &profile, search, date, mode, log_event)?;
            print_json(&observer, date, &crossings)?;
        }
        CliCmd::Trace => {
            let observations = Mutex::new(Vec::new());
            resolve(&ephemeris, &profile, search, date, mode, |event, e| {
                log_event(event, e);
                if let SearchEvent::Observed(obs) = e {
                    if let Ok(mut observations) = observations.lock() {
                        observations.push((event, *obs));
                    }
                }
            })?;
            let mut observations = observations.into_inner().unwrap_or_default();
            // Both searches run at once; keep each one's observations together.
            observations.sort_by_key(|(event, _)| *event == Event::Sunset);
            print_csv(&observations, offset)?;
        }
        CliCmd::Plot => plot_ascii(&profile.sweep()?),
    };
    Ok(())
}

fn log_event(event: Event, search_event: &SearchEvent) {
    match search_event {
        SearchEvent::Seeded(seed) => debug!("{event}: flat horizon at {seed}"),
        SearchEvent::Observed(obs) => debug!(
            "{event} {} {}: sun {:.3}° at {:.2}°, horizon {:.3}°{}",
            obs.phase,
            obs.instant,
            obs.limb_altitude_deg,
            obs.azimuth_deg,
            obs.horizon_deg,
            if obs.reached { ", reached" } else { "" }
        ),
        SearchEvent::Resolved(crossing) => {
            debug!("{event}: {} observations", crossing.iterations);
        }
    }
}

fn print_display(crossings: &[Crossing], date: NaiveDate, offset: FixedOffset) {
    for crossing in crossings {
        println!("{} {date}", crossing.event);
        if let Some(baseline) = crossing.baseline {
            println!("  flat horizon  {}", local(baseline, offset));
        }
        match (crossing.instant, crossing.shift()) {
            (Some(instant), Some(shift)) => {
                println!("  terrain       {} ({})", local(instant, offset), format_shift(shift));
            }
            _ => {
                let reason = crossing
                    .reason
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string);
                println!("  no terrain {}: {reason}", crossing.event);
            }
        }
        if let (Some(horizon), Some(azimuth)) = (crossing.horizon_deg, crossing.azimuth_deg) {
            println!("  horizon       {horizon:.3}° toward {azimuth:.2}°");
        }
        if crossing.degraded {
            println!("  warning       some azimuths had no elevation data");
        }
    }
}

fn local(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

/// Formats as e.g. `-27m 23s`.
fn format_shift(shift: Duration) -> String {
    let secs = shift.num_seconds();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{sign}{}m {:02}s", secs / 60, secs % 60)
}

fn print_json(observer: &Observer, date: NaiveDate, crossings: &[Crossing]) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct Report<'a> {
        observer: &'a Observer,
        date: NaiveDate,
        crossings: &'a [Crossing],
    }

    let json = serde_json::to_string_pretty(&Report {
        observer,
        date,
        crossings,
    })?;
    println!("{json}");
    Ok(())
}

/// # Example with gnuplot
///
/// ```sh
/// cargo run -- --observer=35.0153,138.5187,1.7 --date=2024-03-20 trace | grep sunset | tr ',' ' ' > ~/.tmp/trace && gnuplot -p -e "plot '~/.tmp/trace' using 0:5 with lines, '' using 0:7 with lines"
/// ```
fn print_csv(observations: &[(Event, Observation)], offset: FixedOffset) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "event,phase,time,altitude,limb_altitude,azimuth,horizon,reached,degraded"
    )?;
    for (event, obs) in observations {
        writeln!(
            stdout,
            "{event},{},{},{},{},{},{},{},{}",
            obs.phase,
            obs.instant.with_timezone(&offset).to_rfc3339(),
            obs.altitude_deg,
            obs.limb_altitude_deg,
            obs.azimuth_deg,
            obs.horizon_deg,
            obs.reached,
            obs.degraded,
        )?;
    }
    Ok(())
}

fn plot_ascii(profile: &[HorizonAngle]) {
    #[allow(clippy::cast_possible_truncation)]
    let plot_data: Vec<(f32, f32)> = profile
        .iter()
        .map(|angle| (angle.bucket_deg as f32, angle.angle_deg as f32))
        .collect();
    Chart::new(300, 150, 0.0, 360.0)
        .lineplot(&Shape::Lines(&plot_data))
        .display();
}
