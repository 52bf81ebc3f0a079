use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use super::TileFetcher;
use crate::error::FetchError;

pub enum Outcome {
    Tile(&'static [u8]),
    Status(StatusCode),
    Empty,
}

/// Replays a queue of outcomes, one per request, then serves `b"tile"`.
#[derive(Default)]
pub struct ScriptedFetcher {
    outcomes: Mutex<VecDeque<Outcome>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        ScriptedFetcher {
            outcomes: Mutex::new(outcomes.into()),
            requested: Mutex::default(),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Tile(bytes)) => Ok(Bytes::from_static(bytes)),
            Some(Outcome::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(Outcome::Empty) => Err(FetchError::EmptyBody {
                url: url.to_string(),
            }),
            None => Ok(Bytes::from_static(b"tile")),
        }
    }
}
