// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP feed source backed by `reqwest`.
//!
//! Endpoints, relative to the base URL:
//! ```text
//! GET  data/aircraft.json
//! GET  data/receiver.json
//! GET  data/activity.json?since=<cursor>
//! POST api/restart-sensor
//! ```

use log::debug;
use serde::de::DeserializeOwned;

use super::{FeedSource, FetchError};
use crate::protocol::{
    decode_document, ActivityResponse, AircraftSnapshot, ReceiverInfo, RestartResponse,
};

/// Feed source polling a SkyAware-style HTTP server.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeed {
    /// Create a feed rooted at `base_url`, e.g. `http://localhost:8080/`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_document<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        read_document(response).await
    }
}

async fn read_document<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    decode_document(&body)?.ok_or(FetchError::Empty)
}

impl FeedSource for HttpFeed {
    async fn fetch_aircraft(&self) -> Result<AircraftSnapshot, FetchError> {
        self.get_document("data/aircraft.json").await
    }

    async fn fetch_receiver(&self) -> Result<ReceiverInfo, FetchError> {
        self.get_document("data/receiver.json").await
    }

    async fn fetch_activity(&self, since: u64) -> Result<ActivityResponse, FetchError> {
        self.get_document(&format!("data/activity.json?since={since}"))
            .await
    }

    async fn restart_sensor(&self) -> Result<RestartResponse, FetchError> {
        let url = self.url("api/restart-sensor");
        debug!("POST {url}");
        let response = self.client.post(&url).send().await?;
        read_document(response).await
    }
}
