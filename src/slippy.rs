//! Web mercator slippy map tile math.
//!
//! Converts between WGS84 degrees and `(zoom, x, y)` tile indices. `x` grows
//! eastwards from the antimeridian and `y` grows southwards from the north
//! edge of the projection.

use std::f64::consts::PI;
use std::fmt;

use geo::{coord, Rect};

use crate::error::ProjectionError;

/// Latitude where the web mercator square ends.
pub const MAX_LAT: f64 = 85.0511287798;
pub const MAX_ZOOM: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        TileId { zoom, x, y }
    }

    /// The four tiles at `zoom + 1` that exactly cover this one.
    pub fn children(&self) -> [TileId; 4] {
        let (x, y, zoom) = (self.x * 2, self.y * 2, self.zoom + 1);
        [
            TileId::new(zoom, x, y),
            TileId::new(zoom, x + 1, y),
            TileId::new(zoom, x, y + 1),
            TileId::new(zoom, x + 1, y + 1),
        ]
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBBox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl TileBBox {
    pub fn contains(&self, point: GeoPoint, epsilon: f64) -> bool {
        point.lat >= self.south_west.lat - epsilon
            && point.lat <= self.north_east.lat + epsilon
            && point.lon >= self.south_west.lon - epsilon
            && point.lon <= self.north_east.lon + epsilon
    }

    /// The box as a planar rectangle with `x = lon` and `y = lat`.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.south_west.lon, y: self.south_west.lat },
            coord! { x: self.north_east.lon, y: self.north_east.lat },
        )
    }
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2.0_f64.powi(zoom as i32)
}

/// Projects a point to the tile containing it.
///
/// Longitude 180 and the southern projection edge land on the last tile of
/// their axis instead of one past it.
pub fn geo_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileId, ProjectionError> {
    if !(lat.abs() <= MAX_LAT) {
        return Err(ProjectionError::OutOfProjectionRange { lat });
    }
    if zoom > MAX_ZOOM {
        return Err(ProjectionError::InvalidZoom { zoom });
    }
    let n = tiles_per_axis(zoom);
    let last = n - 1.0;
    let lat_rad = lat.to_radians();

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    Ok(TileId {
        zoom,
        x: x.clamp(0.0, last) as u32,
        y: y.clamp(0.0, last) as u32,
    })
}

fn tile_lat(y: u32, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees()
}

fn tile_lon(x: u32, n: f64) -> f64 {
    x as f64 / n * 360.0 - 180.0
}

pub fn tile_bbox(tile: TileId) -> TileBBox {
    let n = tiles_per_axis(tile.zoom);
    TileBBox {
        south_west: GeoPoint::new(tile_lat(tile.y + 1, n), tile_lon(tile.x, n)),
        north_east: GeoPoint::new(tile_lat(tile.y, n), tile_lon(tile.x + 1, n)),
    }
}
