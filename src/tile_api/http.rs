use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use tracing::{info, instrument};

use super::{TileFetcher, API_KEY_HEADER, USER_AGENT};
use crate::error::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches tiles over HTTP, authenticating every request with the API key.
pub struct HttpFetcher {
    client: Client,
    api_key: String,
}

impl HttpFetcher {
    pub fn new(api_key: String, timeout: Duration) -> reqwest::Result<Self> {
        Self::with_builder(Client::builder(), api_key, timeout)
    }

    pub(crate) fn with_builder(
        builder: ClientBuilder,
        api_key: String,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = builder
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpFetcher { client, api_key })
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let res = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(request_err)?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        info!(status = %status, "fetched tile from API");

        let bytes = res.bytes().await.map_err(request_err)?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(bytes)
    }
}
