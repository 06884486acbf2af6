//! Pexels photo search (api.pexels.com). Requires an API key; all photos
//! are distributed under the Pexels license.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ImageryError, Result};

const BASE_URL: &str = "https://api.pexels.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct PexelsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PexelsPhoto {
    pub id: u64,
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    pub photographer: String,
    pub src: PexelsSrc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PexelsSrc {
    pub large: String,
    #[serde(default)]
    pub medium: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    photos: Vec<PexelsPhoto>,
}

impl PexelsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search photos. `per_page` is capped at 80 by the API.
    pub async fn search(&self, query: &str, per_page: usize) -> Result<Vec<PexelsPhoto>> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", &per_page.min(80).to_string())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ImageryError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SearchResponse = resp.json().await?;
        tracing::debug!(query, results = parsed.photos.len(), "Pexels search");
        Ok(parsed.photos)
    }
}
