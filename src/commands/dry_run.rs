use std::io::Write;

use anyhow::Result;
use tracing::{info, warn};

use crate::orchestrator::RunSummary;
use crate::tile_api::TileApi;
use crate::tile_store::TileStore;

/// Lists the request every tile in the store would make, without touching
/// the store or the network.
pub fn dry_run<W: Write>(store: &TileStore, api: &TileApi, report: &mut W) -> Result<RunSummary> {
    let mut summary = RunSummary::new("dry-run");
    writeln!(
        report,
        "=== Dry Run: Listing {} API Requests ===",
        api.tile_type()
    )?;
    for entry in store.enumerate() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable part of tile store");
                summary.failed += 1;
                continue;
            }
        };
        summary.visited += 1;
        writeln!(report, "URL:  {}", api.tile_url(entry.tile))?;
        writeln!(report, "Path: {}", entry.path.display())?;
        writeln!(report, "{}", "-".repeat(60))?;
        summary.reported += 1;
    }
    info!(tiles = summary.reported, "listed tile requests");
    Ok(summary)
}
