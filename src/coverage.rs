use std::collections::{BTreeMap, BTreeSet};

use geo::{Area, BoundingRect, Intersects, MultiPolygon};
use tracing::{debug, info, instrument};

use crate::error::CoverageError;
use crate::slippy::{geo_to_tile, tile_bbox, TileId};

/// Tiles intersecting a boundary, keyed by zoom.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoverageSet {
    zooms: BTreeMap<u8, BTreeSet<(u32, u32)>>,
}

impl CoverageSet {
    pub fn insert(&mut self, tile: TileId) -> bool {
        self.zooms
            .entry(tile.zoom)
            .or_default()
            .insert((tile.x, tile.y))
    }

    pub fn contains(&self, tile: &TileId) -> bool {
        self.zooms
            .get(&tile.zoom)
            .map_or(false, |tiles| tiles.contains(&(tile.x, tile.y)))
    }

    /// Tiles kept at `zoom`, empty if the zoom was not computed.
    pub fn tiles_at(&self, zoom: u8) -> impl Iterator<Item = TileId> + '_ {
        self.zooms
            .get(&zoom)
            .into_iter()
            .flat_map(move |tiles| tiles.iter().map(move |&(x, y)| TileId::new(zoom, x, y)))
    }

    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        self.zooms.iter().flat_map(|(&zoom, tiles)| {
            tiles.iter().map(move |&(x, y)| TileId::new(zoom, x, y))
        })
    }

    pub fn len(&self) -> usize {
        self.zooms.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finds every tile between `zoom_min` and `zoom_max` (inclusive) whose box
/// intersects `boundary`. Tiles that only touch the boundary are kept.
#[instrument(skip(boundary))]
pub fn compute_coverage(
    boundary: &MultiPolygon<f64>,
    zoom_min: u8,
    zoom_max: u8,
) -> Result<CoverageSet, CoverageError> {
    if boundary.unsigned_area() <= 0.0 {
        return Err(CoverageError::EmptyBoundary);
    }
    let bounds = boundary
        .bounding_rect()
        .ok_or(CoverageError::EmptyBoundary)?;
    let (min, max) = (bounds.min(), bounds.max());

    let mut coverage = CoverageSet::default();
    for zoom in zoom_min..=zoom_max {
        // y grows southwards, so the south-west corner holds the largest y.
        let south_west = geo_to_tile(min.y, min.x, zoom)?;
        let north_east = geo_to_tile(max.y, max.x, zoom)?;

        // Pad by one tile so neighbours whose edge lies exactly on the
        // boundary's box are tested too.
        let last = (1_u32 << zoom) - 1;
        let xs = south_west.x.saturating_sub(1)..=(north_east.x + 1).min(last);
        let ys = north_east.y.saturating_sub(1)..=(south_west.y + 1).min(last);
        debug!(zoom, ?xs, ?ys, "testing candidate tiles");

        let mut kept = 0;
        for x in xs {
            for y in ys.clone() {
                let tile = TileId::new(zoom, x, y);
                if boundary.intersects(&tile_bbox(tile).to_rect().to_polygon()) {
                    coverage.insert(tile);
                    kept += 1;
                }
            }
        }
        info!(zoom, tiles = kept, "computed coverage for zoom level");
    }
    Ok(coverage)
}
