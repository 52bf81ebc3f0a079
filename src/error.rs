use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("latitude {lat} is outside the web mercator range")]
    OutOfProjectionRange { lat: f64 },
    #[error("zoom {zoom} is past the deepest supported level")]
    InvalidZoom { zoom: u8 },
}

#[derive(Debug, Error, PartialEq)]
pub enum CoverageError {
    #[error("boundary has zero area, nothing to cover")]
    EmptyBoundary,
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tile store root {} is not accessible", path.display())]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tile store io error at {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk tile store: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("request to {url} returned an empty body")]
    EmptyBody { url: String },
}
