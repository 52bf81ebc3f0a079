use anyhow::{Context, Result};
use geo::MultiPolygon;
use tracing::{debug, info, warn};

use crate::coverage::compute_coverage;
use crate::error::CoverageError;
use crate::orchestrator::RunSummary;
use crate::tile_store::TileStore;

/// Creates a placeholder for every tile covering `boundary` that is not in
/// the store yet.
pub fn generate(
    store: &TileStore,
    boundary: &MultiPolygon<f64>,
    zoom_min: u8,
    zoom_max: u8,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new("generate");
    let coverage = match compute_coverage(boundary, zoom_min, zoom_max) {
        Ok(coverage) => coverage,
        Err(CoverageError::EmptyBoundary) => {
            warn!("boundary has no area, no tiles to generate");
            return Ok(summary);
        }
        Err(err) => return Err(err).context("failed to compute tile coverage"),
    };
    info!(tiles = coverage.len(), "computed tile coverage");

    for tile in coverage.iter() {
        summary.visited += 1;
        match store.create_placeholder(tile) {
            Ok(true) => {
                debug!(%tile, "generated placeholder");
                summary.created += 1;
            }
            Ok(false) => summary.skipped += 1,
            Err(err) => {
                warn!(%tile, error = %err, "failed to create placeholder, skipping tile");
                summary.failed += 1;
            }
        }
    }
    info!(
        created = summary.created,
        existing = summary.skipped,
        failed = summary.failed,
        "generated tile skeleton"
    );
    Ok(summary)
}
