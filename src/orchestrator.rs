use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Result};
use geo::MultiPolygon;
use serde::Serialize;
use tracing::{info, instrument};

use crate::commands;
use crate::tile_api::{TileApi, TileFetcher};
use crate::tile_store::TileStore;

pub enum Mode<'a> {
    /// Report the url and path of every tile in the store.
    DryRun,
    /// Create placeholders for every tile covering `boundary`.
    Generate {
        boundary: &'a MultiPolygon<f64>,
        zoom_min: u8,
        zoom_max: u8,
    },
    /// Fetch placeholders from the API until `max_downloads` succeed.
    Request { max_downloads: usize },
}

impl Mode<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::DryRun => "dry-run",
            Mode::Generate { .. } => "generate",
            Mode::Request { .. } => "request",
        }
    }
}

/// Counters for a single run. Nothing here outlives the run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: &'static str,
    pub visited: usize,
    pub reported: usize,
    pub created: usize,
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub budget_remaining: Option<usize>,
}

impl RunSummary {
    pub fn new(mode: &'static str) -> Self {
        RunSummary {
            mode,
            ..Default::default()
        }
    }
}

pub struct Orchestrator<F> {
    store: TileStore,
    api: TileApi,
    fetcher: Option<F>,
    delay: Duration,
}

impl<F: TileFetcher + Sync> Orchestrator<F> {
    /// `delay` is slept after every fetch attempt that does not end the run.
    pub fn new(store: TileStore, api: TileApi, delay: Duration) -> Self {
        Orchestrator {
            store,
            api,
            fetcher: None,
            delay,
        }
    }

    /// Request mode needs a fetcher; the other modes never touch the network.
    pub fn with_fetcher(mut self, fetcher: F) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    #[instrument(skip_all, fields(mode = mode.name()))]
    pub async fn run<W: Write>(&self, mode: Mode<'_>, report: &mut W) -> Result<RunSummary> {
        let summary = match mode {
            Mode::DryRun => commands::dry_run(&self.store, &self.api, report)?,
            Mode::Generate {
                boundary,
                zoom_min,
                zoom_max,
            } => commands::generate(&self.store, boundary, zoom_min, zoom_max)?,
            Mode::Request { max_downloads } => {
                let fetcher = self
                    .fetcher
                    .as_ref()
                    .ok_or_else(|| anyhow!("request mode needs a tile fetcher"))?;
                commands::request(&self.store, &self.api, fetcher, max_downloads, self.delay)
                    .await?
            }
        };
        info!(?summary, "run finished");
        Ok(summary)
    }
}
