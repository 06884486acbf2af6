//! Openverse image search (api.openverse.org). Keyless for low request
//! volumes; all results carry Creative Commons or public-domain licenses.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ImageryError, Result};

const BASE_URL: &str = "https://api.openverse.org/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct OpenverseClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenverseImage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    pub license: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub foreign_landing_url: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<OpenverseTag>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenverseTag {
    pub name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<OpenverseImage>,
}

impl OpenverseImage {
    /// Concatenated tag names, used as description text for ranking.
    pub fn tag_text(&self) -> String {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl OpenverseClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search images. `page_size` is capped at 50 by the API.
    pub async fn search(&self, query: &str, page_size: usize) -> Result<Vec<OpenverseImage>> {
        let url = format!("{}/images/", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("q", query),
                ("page_size", &page_size.min(50).to_string()),
                ("license_type", "commercial"),
            ])
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
        tracing::debug!(query, results = parsed.results.len(), "Openverse search");
        Ok(parsed.results)
    }
}

impl Default for OpenverseClient {
    fn default() -> Self {
        Self::new()
    }
}
