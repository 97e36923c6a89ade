//! Crossing search: steps time from the flat-horizon instant until
//! the sun meets the terrain horizon, then bisects down to the
//! requested precision.
//!
//! A search is a lazy [`Iterator`] of [`SearchEvent`]s. Each call to
//! [`CrossingSearch::events`] starts over from the seed, so callers
//! can watch progress, trace every observation, or just
//! [`run`](CrossingSearch::run) to the resolved [`Crossing`].

use crate::{
    constants::ANGLE_EPSILON,
    elevation::ElevationSource,
    error::HorizonError,
    profile::HorizonProfile,
    solar::{position_at, Ephemeris, EphemerisError, Event, Limb, Polar},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which way in time to walk from the flat-horizon seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Backward when the seed already satisfies the crossing, forward
    /// otherwise.
    #[default]
    Auto,
    Backward,
    Forward,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Direction::Auto),
            "backward" | "back" => Ok(Direction::Backward),
            "forward" => Ok(Direction::Forward),
            other => Err(format!(
                "unknown direction '{other}', expected auto, backward or forward"
            )),
        }
    }
}

/// Which crossings to resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sunrise,
    #[default]
    Sunset,
    Both,
}

impl Mode {
    pub fn events(self) -> &'static [Event] {
        match self {
            Mode::Sunrise => &[Event::Sunrise],
            Mode::Sunset => &[Event::Sunset],
            Mode::Both => &[Event::Sunrise, Event::Sunset],
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sunrise" => Ok(Mode::Sunrise),
            "sunset" => Ok(Mode::Sunset),
            "both" => Ok(Mode::Both),
            other => Err(format!(
                "unknown mode '{other}', expected sunrise, sunset or both"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sunrise => f.write_str("sunrise"),
            Mode::Sunset => f.write_str("sunset"),
            Mode::Both => f.write_str("both"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchParams {
    /// Scan step.
    pub step: Duration,
    /// Give up once a observation would be further than this from the seed.
    pub window: Duration,
    /// Bisect until the bracket is no wider than this.
    pub precision: Duration,
    /// Bisect the bracket; otherwise the crossing is the first scan
    /// step past it.
    pub refine: bool,
    /// Point of the disc tracked against the terrain. Defaults to
    /// the upper limb, not the disc center.
    pub limb: Limb,
    pub sunrise_direction: Direction,
    pub sunset_direction: Direction,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            step: Duration::seconds(60),
            window: Duration::hours(6),
            precision: Duration::seconds(1),
            refine: true,
            limb: Limb::Upper,
            sunrise_direction: Direction::Auto,
            sunset_direction: Direction::Auto,
        }
    }
}

/// Longest search window, either side of the seed.
const MAX_WINDOW_HOURS: i64 = 24;

impl SearchParams {
    pub fn validate(&self) -> Result<(), HorizonError> {
        if self.step <= Duration::zero() {
            return Err(HorizonError::invalid("step", "must be positive"));
        }
        if self.precision <= Duration::zero() {
            return Err(HorizonError::invalid("precision", "must be positive"));
        }
        if self.window < self.step {
            return Err(HorizonError::invalid(
                "window",
                format!(
                    "{}s is shorter than one {}s step",
                    self.window.num_seconds(),
                    self.step.num_seconds()
                ),
            ));
        }
        if self.window > Duration::hours(MAX_WINDOW_HOURS) {
            return Err(HorizonError::invalid(
                "window",
                format!(
                    "{}h is longer than {MAX_WINDOW_HOURS}h",
                    self.window.num_hours()
                ),
            ));
        }
        Ok(())
    }

    pub fn direction(&self, event: Event) -> Direction {
        match event {
            Event::Sunrise => self.sunrise_direction,
            Event::Sunset => self.sunset_direction,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Seed,
    Scan,
    Refine,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Seed => f.write_str("seed"),
            Phase::Scan => f.write_str("scan"),
            Phase::Refine => f.write_str("refine"),
        }
    }
}

/// One evaluation of the crossing predicate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Observation {
    pub phase: Phase,
    pub instant: DateTime<Utc>,
    /// Apparent altitude of the disc center (degrees).
    pub altitude_deg: f64,
    /// Altitude of the limb being tracked (degrees).
    pub limb_altitude_deg: f64,
    pub azimuth_deg: f64,
    /// Terrain horizon toward `azimuth_deg`.
    pub horizon_deg: f64,
    /// The sun is hidden (sunset) or visible (sunrise).
    pub reached: bool,
    pub degraded: bool,
}

/// Why a search resolved without a crossing.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "code", content = "message")]
pub enum Reason {
    PolarDay,
    PolarNight,
    Ephemeris(String),
    Terrain(String),
    SearchExhausted,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::PolarDay => f.write_str("polar day"),
            Reason::PolarNight => f.write_str("polar night"),
            Reason::Ephemeris(msg) => write!(f, "ephemeris: {msg}"),
            Reason::Terrain(msg) => write!(f, "terrain: {msg}"),
            Reason::SearchExhausted => f.write_str("no crossing within the search window"),
        }
    }
}

impl From<EphemerisError> for Reason {
    fn from(err: EphemerisError) -> Self {
        match err {
            EphemerisError::NoEvent {
                polar: Polar::PolarDay,
                ..
            } => Reason::PolarDay,
            EphemerisError::NoEvent {
                polar: Polar::PolarNight,
                ..
            } => Reason::PolarNight,
            err => Reason::Ephemeris(err.to_string()),
        }
    }
}

/// The resolved outcome of one search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Crossing {
    pub event: Event,
    pub found: bool,
    /// First instant the tracked limb is hidden (sunset) or visible
    /// (sunrise) against the terrain.
    pub instant: Option<DateTime<Utc>>,
    /// Flat-horizon instant the search was seeded from.
    pub baseline: Option<DateTime<Utc>>,
    /// Terrain horizon (degrees) toward the sun at `instant`.
    pub horizon_deg: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub altitude_deg: Option<f64>,
    /// Observations made, seed included.
    pub iterations: usize,
    /// Some observation looked along an azimuth with no usable elevations.
    pub degraded: bool,
    pub reason: Option<Reason>,
}

impl Crossing {
    /// Terrain instant minus flat-horizon instant. Negative when the
    /// terrain brings the event earlier.
    pub fn shift(&self) -> Option<Duration> {
        Some(self.instant? - self.baseline?)
    }

    fn failed(
        event: Event,
        baseline: Option<DateTime<Utc>>,
        iterations: usize,
        degraded: bool,
        reason: Reason,
    ) -> Self {
        Self {
            event,
            found: false,
            instant: None,
            baseline,
            horizon_deg: None,
            azimuth_deg: None,
            altitude_deg: None,
            iterations,
            degraded,
            reason: Some(reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchEvent {
    /// The flat-horizon instant the search starts from.
    Seeded(DateTime<Utc>),
    Observed(Observation),
    /// Always the last event.
    Resolved(Crossing),
}

/// Search for one `event` on one date.
pub struct CrossingSearch<'a, E: ?Sized, S: ?Sized> {
    ephemeris: &'a E,
    profile: &'a HorizonProfile<'a, S>,
    params: SearchParams,
    date: NaiveDate,
    event: Event,
}

impl<'a, E, S> CrossingSearch<'a, E, S>
where
    E: Ephemeris + ?Sized,
    S: ElevationSource + ?Sized,
{
    pub fn new(
        ephemeris: &'a E,
        profile: &'a HorizonProfile<'a, S>,
        params: SearchParams,
        date: NaiveDate,
        event: Event,
    ) -> Result<Self, HorizonError> {
        params.validate()?;
        Ok(Self {
            ephemeris,
            profile,
            params,
            date,
            event,
        })
    }

    pub fn event(&self) -> Event {
        self.event
    }

    /// Returns a fresh, lazy sequence of search events.
    pub fn events(&self) -> Events<'_, 'a, E, S> {
        Events {
            search: self,
            state: State::Seeding,
            iterations: 0,
            degraded: false,
        }
    }

    /// Runs the search to completion.
    pub fn run(&self) -> Crossing {
        self.run_with(|_| {})
    }

    /// Runs the search to completion, handing every event to
    /// `observe` along the way.
    pub fn run_with<F>(&self, mut observe: F) -> Crossing
    where
        F: FnMut(&SearchEvent),
    {
        let mut resolved = None;
        for event in self.events() {
            observe(&event);
            if let SearchEvent::Resolved(crossing) = event {
                resolved = Some(crossing);
            }
        }
        // The event sequence always ends with `Resolved`.
        resolved.unwrap_or_else(|| {
            Crossing::failed(self.event, None, 0, false, Reason::SearchExhausted)
        })
    }
}

enum State {
    Seeding,
    ProbingSeed {
        seed: DateTime<Utc>,
    },
    Scanning {
        seed: DateTime<Utc>,
        backward: bool,
        last: Observation,
    },
    Refining {
        seed: DateTime<Utc>,
        /// Latest unreached observation.
        lo: Observation,
        /// Earliest reached observation.
        hi: Observation,
    },
    Resolving(Crossing),
    Done,
}

/// Iterator returned by [`CrossingSearch::events`].
pub struct Events<'s, 'a, E: ?Sized, S: ?Sized> {
    search: &'s CrossingSearch<'a, E, S>,
    state: State,
    iterations: usize,
    degraded: bool,
}

impl<'s, 'a, E, S> Iterator for Events<'s, 'a, E, S>
where
    E: Ephemeris + ?Sized,
    S: ElevationSource + ?Sized,
{
    type Item = SearchEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Seeding => {
                    let search = self.search;
                    let observer = search.profile.observer();
                    return Some(
                        match search.ephemeris.rise_set(observer, search.date, search.event) {
                            Ok(seed) => {
                                debug!("{} seed {seed}", search.event);
                                self.state = State::ProbingSeed { seed };
                                SearchEvent::Seeded(seed)
                            }
                            Err(err) => {
                                warn!("{} on {}: {err}", search.event, search.date);
                                self.resolve_failed(None, err.into())
                            }
                        },
                    );
                }

                State::ProbingSeed { seed } => {
                    let obs = match self.observe(Phase::Seed, seed) {
                        Ok(obs) => obs,
                        Err(reason) => return Some(self.resolve_failed(Some(seed), reason)),
                    };
                    let backward = match self.search.params.direction(self.search.event) {
                        Direction::Auto => obs.reached,
                        Direction::Backward => true,
                        Direction::Forward => false,
                    };
                    debug!(
                        "{} scanning {}",
                        self.search.event,
                        if backward { "backward" } else { "forward" }
                    );
                    self.state = State::Scanning {
                        seed,
                        backward,
                        last: obs,
                    };
                    return Some(SearchEvent::Observed(obs));
                }

                State::Scanning {
                    seed,
                    backward,
                    last,
                } => {
                    let SearchParams { step, window, .. } = self.search.params;
                    let next = if backward {
                        last.instant.checked_sub_signed(step)
                    } else {
                        last.instant.checked_add_signed(step)
                    };
                    // Past the window, or past the end of representable time.
                    let Some(t) = next.filter(|&t| t - seed <= window && seed - t <= window)
                    else {
                        debug!(
                            "{} exhausted after {} observations",
                            self.search.event, self.iterations
                        );
                        return Some(self.resolve_failed(Some(seed), Reason::SearchExhausted));
                    };
                    let obs = match self.observe(Phase::Scan, t) {
                        Ok(obs) => obs,
                        Err(reason) => return Some(self.resolve_failed(Some(seed), reason)),
                    };
                    let (earlier, later) = if backward { (obs, last) } else { (last, obs) };
                    self.state = if !earlier.reached && later.reached {
                        if self.search.params.refine {
                            State::Refining {
                                seed,
                                lo: earlier,
                                hi: later,
                            }
                        } else {
                            State::Resolving(self.resolved(seed, later))
                        }
                    } else {
                        State::Scanning {
                            seed,
                            backward,
                            last: obs,
                        }
                    };
                    return Some(SearchEvent::Observed(obs));
                }

                State::Refining { seed, lo, hi } => {
                    let width = hi.instant - lo.instant;
                    if width <= self.search.params.precision {
                        self.state = State::Resolving(self.resolved(seed, hi));
                        continue;
                    }
                    let mid = lo.instant + width / 2;
                    let obs = match self.observe(Phase::Refine, mid) {
                        Ok(obs) => obs,
                        Err(reason) => return Some(self.resolve_failed(Some(seed), reason)),
                    };
                    self.state = if obs.reached {
                        State::Refining { seed, lo, hi: obs }
                    } else {
                        State::Refining { seed, lo: obs, hi }
                    };
                    return Some(SearchEvent::Observed(obs));
                }

                State::Resolving(crossing) => {
                    debug!(
                        "{} resolved: {:?} after {} observations",
                        crossing.event, crossing.instant, crossing.iterations
                    );
                    return Some(SearchEvent::Resolved(crossing));
                }

                State::Done => return None,
            }
        }
    }
}

/// Private API.
impl<'s, 'a, E, S> Events<'s, 'a, E, S>
where
    E: Ephemeris + ?Sized,
    S: ElevationSource + ?Sized,
{
    fn observe(&mut self, phase: Phase, instant: DateTime<Utc>) -> Result<Observation, Reason> {
        let search = self.search;
        let profile = search.profile;
        self.iterations += 1;

        let sun = position_at(search.ephemeris, profile.observer(), instant)?;
        let horizon = profile
            .angle_for(sun.azimuth_deg)
            .map_err(|err| Reason::Terrain(err.to_string()))?;
        self.degraded |= horizon.degraded;

        let limb_altitude_deg = sun.altitude_deg + search.params.limb.offset_deg();
        let reached = match search.event {
            Event::Sunset => limb_altitude_deg <= horizon.angle_deg + ANGLE_EPSILON,
            Event::Sunrise => limb_altitude_deg >= horizon.angle_deg - ANGLE_EPSILON,
        };
        let obs = Observation {
            phase,
            instant,
            altitude_deg: sun.altitude_deg,
            limb_altitude_deg,
            azimuth_deg: sun.azimuth_deg,
            horizon_deg: horizon.angle_deg,
            reached,
            degraded: horizon.degraded,
        };
        trace!(
            "{} {phase} {instant}: limb {limb_altitude_deg:.4}°, horizon {:.4}°, reached: {reached}",
            search.event,
            horizon.angle_deg
        );
        Ok(obs)
    }

    fn resolved(&self, seed: DateTime<Utc>, at: Observation) -> Crossing {
        Crossing {
            event: self.search.event,
            found: true,
            instant: Some(at.instant),
            baseline: Some(seed),
            horizon_deg: Some(at.horizon_deg),
            azimuth_deg: Some(at.azimuth_deg),
            altitude_deg: Some(at.altitude_deg),
            iterations: self.iterations,
            degraded: self.degraded,
            reason: None,
        }
    }

    fn resolve_failed(&mut self, seed: Option<DateTime<Utc>>, reason: Reason) -> SearchEvent {
        self.state = State::Done;
        SearchEvent::Resolved(Crossing::failed(
            self.search.event,
            seed,
            self.iterations,
            self.degraded,
            reason,
        ))
    }
}

/// Resolves every crossing `mode` asks for, sunrise first.
///
/// With [`Mode::Both`] the two searches run concurrently and share
/// `profile`. `report` sees every event of every search as it
/// happens.
pub fn resolve<E, S, F>(
    ephemeris: &E,
    profile: &HorizonProfile<'_, S>,
    params: SearchParams,
    date: NaiveDate,
    mode: Mode,
    report: F,
) -> Result<Vec<Crossing>, HorizonError>
where
    E: Ephemeris + ?Sized,
    S: ElevationSource + ?Sized,
    F: Fn(Event, &SearchEvent) + Sync,
{
    let search = |event: Event| -> Result<Crossing, HorizonError> {
        let crossing_search = CrossingSearch::new(ephemeris, profile, params, date, event)?;
        Ok(crossing_search.run_with(|e| report(event, e)))
    };
    match mode {
        Mode::Sunrise => Ok(vec![search(Event::Sunrise)?]),
        Mode::Sunset => Ok(vec![search(Event::Sunset)?]),
        Mode::Both => {
            let (sunrise, sunset) =
                rayon::join(|| search(Event::Sunrise), || search(Event::Sunset));
            Ok(vec![sunrise?, sunset?])
        }
    }
}
