use anyhow::{anyhow, Context, Result};
use argh::FromArgs;
use dotenv::dotenv;
use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tile_mirror::boundary::load_boundary;
use tile_mirror::orchestrator::{Mode, Orchestrator};
use tile_mirror::tile_api::{HttpFetcher, TileApi, TileType, DEFAULT_BASE_URL};
use tile_mirror::tile_store::TileStore;

static API_KEY_VAR: &str = "TILE_API_KEY";

#[derive(FromArgs)]
/// Lists, generates or downloads the slippy map tiles covering a boundary.
/// Runs a dry run listing the tile requests unless --generate or --request
/// is given.
struct Args {
    /// generate the tile directory skeleton (empty placeholder .png files)
    #[argh(switch, short = 'g')]
    generate: bool,

    /// make real API requests to download placeholder tiles
    #[argh(switch)]
    request: bool,

    /// limit number of successful downloads (only with --request)
    #[argh(option, default = "5")]
    max_downloads: usize,

    /// tile layer to request: airports, local, score or traffic
    #[argh(option, default = "TileType::Score")]
    tile_type: TileType,

    /// root directory of the tile tree
    #[argh(option, default = "PathBuf::from(\"tiles\")")]
    tile_root: PathBuf,

    /// boundary GeoJSON file to cover (only with --generate)
    #[argh(option, default = "PathBuf::from(\"data/urban_boundary.geojson\")")]
    boundary: PathBuf,

    /// shallowest zoom level to generate
    #[argh(option, default = "8")]
    zoom_min: u8,

    /// deepest zoom level to generate
    #[argh(option, default = "14")]
    zoom_max: u8,

    /// base url of the tile API
    #[argh(option, default = "DEFAULT_BASE_URL.to_string()")]
    api_base_url: String,

    /// milliseconds to wait after each download attempt
    #[argh(option, default = "500")]
    delay_ms: u64,

    /// seconds before a single tile request times out
    #[argh(option, default = "30")]
    timeout_secs: u64,

    /// file holding the API key, read when TILE_API_KEY is not set
    #[argh(option, default = "PathBuf::from(\"key.txt\")")]
    key_file: PathBuf,

    /// write a JSON summary of the run to this file
    #[argh(option)]
    summary_file: Option<PathBuf>,
}

fn load_api_key(key_file: &Path) -> Result<String> {
    if let Ok(key) = env::var(API_KEY_VAR) {
        return Ok(key.trim().to_string());
    }
    let key = fs::read_to_string(key_file).with_context(|| {
        format!(
            "{} is not set and failed to read key file {}",
            API_KEY_VAR,
            key_file.display()
        )
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("key file {} is empty", key_file.display()));
    }
    Ok(key.to_string())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    dotenv().ok();

    let appender = tracing_appender::rolling::daily("./logs", "tile-mirror.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let args: Args = argh::from_env();
    if args.generate && args.request {
        return Err(anyhow!("--generate and --request cannot be used together"));
    }

    let api = TileApi::new(&args.api_base_url, args.tile_type);
    let delay = Duration::from_millis(args.delay_ms);
    let boundary;
    let (mode, orchestrator) = if args.generate {
        info!("Mode: Generating Skeleton");
        boundary = load_boundary(&args.boundary)?;
        let store = TileStore::create(&args.tile_root)?;
        let mode = Mode::Generate {
            boundary: &boundary,
            zoom_min: args.zoom_min,
            zoom_max: args.zoom_max,
        };
        (mode, Orchestrator::<HttpFetcher>::new(store, api, delay))
    } else if args.request {
        info!("Mode: Downloading Tiles");
        let store = TileStore::open(&args.tile_root)?;
        let fetcher = HttpFetcher::new(
            load_api_key(&args.key_file)?,
            Duration::from_secs(args.timeout_secs),
        )?;
        let mode = Mode::Request {
            max_downloads: args.max_downloads,
        };
        (mode, Orchestrator::new(store, api, delay).with_fetcher(fetcher))
    } else {
        info!("Mode: Dry Run");
        let store = TileStore::open(&args.tile_root)?;
        (Mode::DryRun, Orchestrator::new(store, api, delay))
    };

    let stdout = io::stdout();
    let mut report = stdout.lock();
    let summary = orchestrator.run(mode, &mut report).await?;
    report.flush()?;

    if let Some(path) = args.summary_file {
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create summary file {}", path.display()))?;
        write!(file, "{}", serde_json::to_string(&summary)?)?;
        info!(path = %path.display(), "wrote run summary");
    }
    info!("Done.");
    Ok(())
}
