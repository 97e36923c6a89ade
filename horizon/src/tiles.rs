//! NASADEM file aggregator.

use crate::{elevation::ElevationSource, error::HorizonError};
use dashmap::DashMap;
use geo::geometry::Coord;
use log::{debug, warn};
use nasadem::{file_name, sw_corner, NasademError, Tile};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

pub struct TileSource {
    /// Directory containing NASADEM HGT tile files.
    tile_dir: PathBuf,

    /// How to load tiles (in-memory or mapped).
    tile_mode: TileMode,

    /// Tiles which have been loaded on demand.
    ///
    /// `None` records a tile that doesn't exist on disk, so we don't
    /// go looking for it again.
    tiles: DashMap<Coord<i16>, Option<Arc<Tile>>>,
}

impl TileSource {
    pub fn new(tile_dir: PathBuf, tile_mode: TileMode) -> Result<Self, HorizonError> {
        let mut has_height_files = false;

        // Fail early if tile_dir doesn't have a single `hgt` file.
        for entry in std::fs::read_dir(&tile_dir)? {
            let path = entry?.path();
            if path
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .map_or(false, |ext| ext.eq_ignore_ascii_case("hgt"))
            {
                has_height_files = true;
                break;
            }
        }

        if has_height_files {
            Ok(Self {
                tile_dir,
                tile_mode,
                tiles: DashMap::new(),
            })
        } else {
            Err(HorizonError::Path(tile_dir))
        }
    }

    /// Returns the tile containing `coord`, or `None` if it isn't on
    /// disk.
    ///
    /// Tiles are read from disk the first time they're asked for.
    pub fn get(&self, coord: Coord<f64>) -> Result<Option<Arc<Tile>>, HorizonError> {
        let sw_corner = sw_corner(coord);
        self.tiles
            .entry(sw_corner)
            .or_try_insert_with(|| match self.load_tile(sw_corner) {
                Ok(tile) => Ok(Some(Arc::new(tile))),
                Err(HorizonError::Nasadem(NasademError::Io(e)))
                    if e.kind() == ErrorKind::NotFound =>
                {
                    debug!("no tile for {sw_corner:?}");
                    Ok(None)
                }
                Err(e) => Err(e),
            })
            .map(|r| r.clone())
    }

    /// Number of tiles looked up so far, including missing ones.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Private API.
impl TileSource {
    fn load_tile(&self, sw_corner: Coord<i16>) -> Result<Tile, HorizonError> {
        let tile_path = {
            let file_name = file_name(sw_corner);
            let mut tile_path: PathBuf = [&self.tile_dir, Path::new(&file_name)].iter().collect();
            if !tile_path.exists() {
                let file_name = file_name.to_lowercase();
                tile_path = [&self.tile_dir, Path::new(&file_name)].iter().collect();
            }
            tile_path
        };
        debug!("loading {tile_path:?}");
        match self.tile_mode {
            TileMode::InMem => Ok(Tile::load(tile_path)?),
            TileMode::MemMap => Ok(Tile::memmap(tile_path)?),
        }
    }
}

impl ElevationSource for TileSource {
    fn elevations(&self, points: &[Coord<f64>]) -> Result<Vec<Option<f64>>, HorizonError> {
        let mut last_err = None;
        let mut failures = 0;
        let elevations = points
            .iter()
            .map(|&point| match self.get(point) {
                Ok(tile) => tile.and_then(|tile| tile.interpolate(point)),
                Err(e) => {
                    failures += 1;
                    last_err = Some(e);
                    None
                }
            })
            .collect::<Vec<_>>();

        match last_err {
            Some(e) if failures == points.len() => {
                Err(HorizonError::DataUnavailable(e.to_string()))
            }
            Some(e) => {
                warn!("{failures} of {} elevation lookups failed: {e}", points.len());
                Ok(elevations)
            }
            None => Ok(elevations),
        }
    }
}

/// How to handle tile.
///
/// The trade off between loading tile data into memory versus memory
/// mapping is not obvious, and you should measure both before
/// deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileMode {
    /// Parse tile and load into memory.
    ///
    /// Note that this can consume gigabytes of RAM when loading many
    /// tiles.
    InMem,

    /// Memory map file contents.
    #[default]
    MemMap,
}
