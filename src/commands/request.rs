use std::time::Duration;

use anyhow::Result;
use humansize::{format_size, DECIMAL};
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::orchestrator::RunSummary;
use crate::tile_api::{TileApi, TileFetcher};
use crate::tile_store::{TileEntry, TileState, TileStore};

/// Downloads placeholders in store order until `max_downloads` tiles were
/// saved. Failed attempts are logged and skipped; they do not use up the
/// budget and are retried by the next run.
pub async fn request<F: TileFetcher + Sync>(
    store: &TileStore,
    api: &TileApi,
    fetcher: &F,
    max_downloads: usize,
    delay: Duration,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new("request");
    summary.budget_remaining = Some(max_downloads);
    if max_downloads == 0 {
        info!("download budget is zero, nothing to request");
        return Ok(summary);
    }

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
        if let TileState::Fetched { bytes } = entry.state {
            debug!(tile = %entry.tile, bytes, "skipping tile that was already fetched");
            summary.skipped += 1;
            continue;
        }

        let tile_span = info_span!(
            "tile",
            zoom = entry.tile.zoom,
            x = entry.tile.x,
            y = entry.tile.y
        );
        summary.attempted += 1;
        if request_tile(store, api, fetcher, &entry)
            .instrument(tile_span)
            .await
        {
            summary.fetched += 1;
        } else {
            summary.failed += 1;
        }
        summary.budget_remaining = Some(max_downloads - summary.fetched);

        if summary.fetched >= max_downloads {
            info!(max_downloads, "reached max downloads");
            break;
        }
        debug!(duration = ?delay, "sleeping");
        sleep(delay).await;
    }

    info!(
        fetched = summary.fetched,
        failed = summary.failed,
        skipped = summary.skipped,
        "finished requesting tiles"
    );
    Ok(summary)
}

/// Returns whether the tile was downloaded and saved.
async fn request_tile<F: TileFetcher + Sync>(
    store: &TileStore,
    api: &TileApi,
    fetcher: &F,
    entry: &TileEntry,
) -> bool {
    let url = api.tile_url(entry.tile);
    info!(url = %url, "requesting tile");
    let bytes = match fetcher.fetch(&url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(url = %url, error = %err, "failed to download tile");
            return false;
        }
    };
    match store.write(entry.tile, &bytes) {
        Ok(()) => {
            info!(
                size = %format_size(bytes.len(), DECIMAL),
                path = %entry.path.display(),
                "saved tile"
            );
            true
        }
        Err(err) => {
            warn!(error = %err, "failed to save downloaded tile");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reqwest::StatusCode;
    use tempfile::tempdir;

    use super::*;
    use crate::slippy::TileId;
    use crate::tile_api::scripted::{Outcome, ScriptedFetcher};
    use crate::tile_api::{HttpFetcher, TileType};

    const NO_DELAY: Duration = Duration::from_millis(0);

    fn store_with_placeholders(root: &std::path::Path, count: u32) -> TileStore {
        let store = TileStore::open(root).unwrap();
        for y in 0..count {
            store.create_placeholder(TileId::new(9, 150, 200 + y)).unwrap();
        }
        store
    }

    fn api() -> TileApi {
        TileApi::new("https://api.howloud.com/tiles", TileType::Score)
    }

    #[tokio::test]
    async fn stops_as_soon_as_budget_is_spent() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 4);
        let fetcher = ScriptedFetcher::default();

        let summary = request(&store, &api(), &fetcher, 2, NO_DELAY).await.unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.budget_remaining, Some(0));
        assert_eq!(
            fetcher.requested(),
            vec![
                "https://api.howloud.com/tiles/score/9/150/200.png",
                "https://api.howloud.com/tiles/score/9/150/201.png",
            ]
        );
        assert_eq!(
            store.state(TileId::new(9, 150, 202)).unwrap(),
            Some(TileState::Placeholder)
        );
        assert_eq!(
            store.state(TileId::new(9, 150, 203)).unwrap(),
            Some(TileState::Placeholder)
        );
    }

    #[tokio::test]
    async fn failed_fetch_leaves_tile_and_does_not_count() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 3);
        let fetcher = ScriptedFetcher::new(vec![
            Outcome::Tile(b"first"),
            Outcome::Status(StatusCode::BAD_GATEWAY),
            Outcome::Tile(b"third"),
        ]);

        let summary = request(&store, &api(), &fetcher, 2, NO_DELAY).await.unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(fs::read(store.path_for(TileId::new(9, 150, 200))).unwrap(), b"first");
        assert_eq!(
            store.state(TileId::new(9, 150, 201)).unwrap(),
            Some(TileState::Placeholder)
        );
        assert_eq!(fs::read(store.path_for(TileId::new(9, 150, 202))).unwrap(), b"third");
    }

    #[tokio::test]
    async fn empty_body_is_a_failure() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 1);
        let fetcher = ScriptedFetcher::new(vec![Outcome::Empty]);

        let summary = request(&store, &api(), &fetcher, 5, NO_DELAY).await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.budget_remaining, Some(5));
        assert_eq!(
            store.state(TileId::new(9, 150, 200)).unwrap(),
            Some(TileState::Placeholder)
        );
    }

    #[tokio::test]
    async fn walks_whole_store_when_budget_exceeds_it() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 3);
        let fetcher = ScriptedFetcher::default();

        let summary = request(&store, &api(), &fetcher, 10, NO_DELAY).await.unwrap();

        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.budget_remaining, Some(7));
        assert!(store
            .enumerate()
            .all(|entry| entry.unwrap().state == TileState::Fetched { bytes: 4 }));
    }

    #[tokio::test]
    async fn resumes_by_skipping_fetched_tiles() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 3);
        store.write(TileId::new(9, 150, 200), b"earlier run").unwrap();
        let fetcher = ScriptedFetcher::default();

        let summary = request(&store, &api(), &fetcher, 1, NO_DELAY).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            fetcher.requested(),
            vec!["https://api.howloud.com/tiles/score/9/150/201.png"]
        );
        assert_eq!(
            fs::read(store.path_for(TileId::new(9, 150, 200))).unwrap(),
            b"earlier run"
        );
    }

    #[tokio::test]
    async fn zero_budget_makes_no_requests() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 2);
        let fetcher = ScriptedFetcher::default();

        let summary = request(&store, &api(), &fetcher, 0, NO_DELAY).await.unwrap();

        assert_eq!(summary.attempted, 0);
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_delay_after_every_attempt_but_the_last() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 3);
        let fetcher = ScriptedFetcher::new(vec![
            Outcome::Tile(b"first"),
            Outcome::Status(StatusCode::SERVICE_UNAVAILABLE),
            Outcome::Tile(b"third"),
        ]);
        let delay = Duration::from_millis(500);

        let start = tokio::time::Instant::now();
        let summary = request(&store, &api(), &fetcher, 2, delay).await.unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.fetched, 2);
        assert_eq!(start.elapsed(), delay * 2);
    }

    #[tokio::test]
    async fn non_canonical_leaves_are_never_requested() {
        let dir = tempdir().unwrap();
        let store = TileStore::open(dir.path()).unwrap();
        let x_dir = dir.path().join("9").join("150");
        fs::create_dir_all(&x_dir).unwrap();
        fs::write(x_dir.join("0200.png"), "").unwrap();
        let fetcher = ScriptedFetcher::default();

        for _ in 0..2 {
            let summary = request(&store, &api(), &fetcher, 5, NO_DELAY).await.unwrap();
            assert_eq!(summary.visited, 0);
            assert_eq!(summary.fetched, 0);
        }
        assert!(fetcher.requested().is_empty());
        assert!(!store.exists(TileId::new(9, 150, 200)));
    }

    #[tokio::test]
    async fn unreachable_api_leaves_placeholder_untouched() {
        let dir = tempdir().unwrap();
        let store = store_with_placeholders(dir.path(), 1);
        // Nothing listens on port 1.
        let api = TileApi::new("http://127.0.0.1:1/tiles", TileType::Score);
        let builder = reqwest::Client::builder().no_proxy();
        let fetcher =
            HttpFetcher::with_builder(builder, "key".to_string(), Duration::from_secs(5)).unwrap();

        let summary = request(&store, &api, &fetcher, 1, NO_DELAY).await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.budget_remaining, Some(1));
        assert_eq!(
            store.state(TileId::new(9, 150, 200)).unwrap(),
            Some(TileState::Placeholder)
        );
    }
}
