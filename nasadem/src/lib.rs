//! NASADEM / SRTM elevation (`.hgt`) tiles.
//!
//! A tile covers one degree of latitude and longitude. Samples are
//! big-endian `i16` meters, stored row-major from the northernmost
//! row to the southernmost, west to east within a row. Neighboring
//! tiles share their edge rows and columns.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::NasademError;
use byteorder::{BigEndian as BE, ByteOrder, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

/// Base floating point type used for all coordinates and calculations.
pub type C = f64;

const ARCSEC_PER_DEG: C = 3600.0;

/// Sample value SRTM products use to mark a data void.
pub const VOID: i16 = i16::MIN;

pub struct Tile {
    /// Southwest corner of the tile.
    ///
    /// Specifically, the _center_ of the SW most sample of the tile.
    sw_corner: Coord<i16>,

    /// Arcseconds per sample.
    resolution: u8,

    /// Number of (columns, rows) in this tile.
    dimensions: (usize, usize),

    /// Elevation samples.
    samples: SampleStore,
}

enum SampleStore {
    InMem(Box<[i16]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get(&self, index: usize) -> i16 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<i16>();
                BE::read_i16(&raw[start..start + size_of::<i16>()])
            }
        }
    }
}

impl Tile {
    /// Returns a Tile read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let (resolution, dimensions @ (cols, rows)) = extract_resolution(&path)?;
        let sw_corner = parse_sw_corner(&path)?;

        let samples = {
            let mut file = BufReader::new(File::open(&path)?);
            let mut samples = vec![0_i16; cols * rows];
            file.read_i16_into::<BE>(&mut samples)?;
            SampleStore::InMem(samples.into_boxed_slice())
        };

        Ok(Self {
            sw_corner,
            resolution,
            dimensions,
            samples,
        })
    }

    /// Returns a Tile using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let (resolution, dimensions) = extract_resolution(&path)?;
        let sw_corner = parse_sw_corner(&path)?;

        let samples = {
            let file = File::open(&path)?;
            // Tiles are treated as read-only inputs for the lifetime
            // of the mapping.
            let mmap = unsafe { Mmap::map(&file)? };
            SampleStore::MemMap(mmap)
        };

        Ok(Self {
            sw_corner,
            resolution,
            dimensions,
            samples,
        })
    }

    /// Returns the integer coordinates of this tile's SW corner.
    pub fn sw_corner(&self) -> Coord<i16> {
        self.sw_corner
    }

    /// Returns this tile's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Returns the number of (columns, rows) in this tile.
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let (cols, rows) = self.dimensions;
        cols * rows
    }

    /// Returns `true` if `coord` falls between this tile's outermost
    /// sample centers.
    pub fn contains(&self, coord: Coord<C>) -> bool {
        let (x, y) = self.fractional_xy(coord);
        #[allow(clippy::cast_precision_loss)]
        let (max_x, max_y) = ((self.dimensions.0 - 1) as C, (self.dimensions.1 - 1) as C);
        (0.0..=max_x).contains(&x) && (0.0..=max_y).contains(&y)
    }

    /// Returns the sample nearest to `coord`.
    ///
    /// Returns `None` when `coord` is outside this tile or the
    /// sample is a void.
    pub fn get(&self, coord: Coord<C>) -> Option<i16> {
        let (x, y) = self.fractional_xy(coord);
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = (x.round() as isize, y.round() as isize);
        let sample = self.checked_xy(x, y)?;
        (sample != VOID).then_some(sample)
    }

    /// Returns the bilinearly interpolated elevation at `coord`.
    ///
    /// Returns `None` when `coord` is outside this tile or any of the
    /// four surrounding samples is a void.
    pub fn interpolate(&self, coord: Coord<C>) -> Option<C> {
        if !self.contains(coord) {
            return None;
        }
        let (cols, rows) = self.dimensions;
        let (x, y) = self.fractional_xy(coord);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x0, y0) = ((x.floor() as usize).min(cols - 1), (y.floor() as usize).min(rows - 1));
        let (x1, y1) = ((x0 + 1).min(cols - 1), (y0 + 1).min(rows - 1));
        #[allow(clippy::cast_precision_loss)]
        let (tx, ty) = (x - x0 as C, y - y0 as C);

        let mut corners = [0.0; 4];
        for (corner, (cx, cy)) in corners
            .iter_mut()
            .zip([(x0, y0), (x1, y0), (x0, y1), (x1, y1)])
        {
            let sample = self.get_xy((cx, cy));
            if sample == VOID {
                return None;
            }
            *corner = C::from(sample);
        }
        let [sw, se, nw, ne] = corners;
        let south = sw + (se - sw) * tx;
        let north = nw + (ne - nw) * tx;
        Some(south + (north - south) * ty)
    }
}

/// Private API
impl Tile {
    /// Returns `coord` in sample units relative to the SW sample
    /// center, x growing east and y growing north.
    fn fractional_xy(&self, coord: Coord<C>) -> (C, C) {
        let samples_per_deg = ARCSEC_PER_DEG / C::from(self.resolution);
        let x = (coord.x - C::from(self.sw_corner.x)) * samples_per_deg;
        let y = (coord.y - C::from(self.sw_corner.y)) * samples_per_deg;
        (x, y)
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn checked_xy(&self, x: isize, y: isize) -> Option<i16> {
        let (cols, rows) = self.dimensions;
        if 0 <= x && x < cols as isize && 0 <= y && y < rows as isize {
            Some(self.get_xy((x as usize, y as usize)))
        } else {
            None
        }
    }

    fn get_xy(&self, xy: (usize, usize)) -> i16 {
        self.samples.get(self.xy_to_linear_index(xy))
    }

    fn xy_to_linear_index(&self, (x, y): (usize, usize)) -> usize {
        let (cols, rows) = self.dimensions;
        cols * (rows - y - 1) + x
    }
}

/// Returns the conventional file name of the tile whose SW corner is
/// `sw_corner`, e.g. `N35E138.hgt`.
pub fn file_name(Coord { x, y }: Coord<i16>) -> String {
    let n_s = if y.is_negative() { 'S' } else { 'N' };
    let e_w = if x.is_negative() { 'W' } else { 'E' };
    format!("{n_s}{:02}{e_w}{:03}.hgt", y.unsigned_abs(), x.unsigned_abs())
}

/// Returns the integer SW corner of the tile containing `coord`.
#[allow(clippy::cast_possible_truncation)]
pub fn sw_corner(Coord { x, y }: Coord<C>) -> Coord<i16> {
    Coord {
        x: x.floor() as i16,
        y: y.floor() as i16,
    }
}

fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, (usize, usize)), NasademError> {
    const RES_1_ARCSECOND_LEN: u64 = 3601 * 3601 * size_of::<i16>() as u64;
    const RES_3_ARCSECOND_LEN: u64 = 1201 * 1201 * size_of::<i16>() as u64;
    match path.as_ref().metadata().map(|m| m.len())? {
        RES_1_ARCSECOND_LEN => Ok((1, (3601, 3601))),
        RES_3_ARCSECOND_LEN => Ok((3, (1201, 1201))),
        invalid_len => Err(NasademError::HgtLen(invalid_len, path.as_ref().to_owned())),
    }
}

/// Parses the SW corner out of names like `N44W072.hgt`,
/// `s01e000.hgt`, or `N44W072.SRTMGL1.hgt`.
fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, NasademError> {
    let mk_err = || NasademError::HgtName(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .and_then(|stem| stem.get(0..7))
        .filter(|name| name.is_ascii())
        .ok_or_else(mk_err)?
        .to_ascii_uppercase();
    let lat_sign = match &name[0..1] {
        "N" => 1,
        "S" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" => 1,
        "W" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}
