use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;
use crate::slippy::TileId;

pub mod http;
#[cfg(test)]
pub mod scripted;

pub use http::HttpFetcher;

pub static DEFAULT_BASE_URL: &str = "https://api.howloud.com/tiles";
pub static USER_AGENT: &str = "tile-mirror/0.1";
pub static API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    Airports,
    Local,
    Score,
    Traffic,
}

impl TileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileType::Airports => "airports",
            TileType::Local => "local",
            TileType::Score => "score",
            TileType::Traffic => "traffic",
        }
    }
}

impl fmt::Display for TileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airports" => Ok(TileType::Airports),
            "local" => Ok(TileType::Local),
            "score" => Ok(TileType::Score),
            "traffic" => Ok(TileType::Traffic),
            _ => Err(anyhow!(
                "unknown tile type {}, expected one of airports, local, score, traffic",
                s
            )),
        }
    }
}

/// Builds tile urls as `{base_url}/{tile_type}/{zoom}/{x}/{y}.png`.
#[derive(Debug, Clone)]
pub struct TileApi {
    base_url: String,
    tile_type: TileType,
}

impl TileApi {
    pub fn new(base_url: &str, tile_type: TileType) -> Self {
        TileApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            tile_type,
        }
    }

    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    pub fn tile_url(&self, tile: TileId) -> String {
        format!(
            "{}/{}/{}/{}/{}.png",
            self.base_url, self.tile_type, tile.zoom, tile.x, tile.y
        )
    }
}

/// Something that can download the bytes behind a tile url.
#[async_trait]
pub trait TileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}
