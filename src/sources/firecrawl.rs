//! Scrape-API fetcher for JavaScript-heavy pages.
//!
//! Personal lab sites behind client-side rendering or anti-bot walls do
//! not yield to a plain GET. This fetcher goes through a scrape API that
//! renders the page and hands back markdown, which is already the
//! line-oriented text the extraction tiers want.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::credentials::ApiKey;
use crate::error::{FetchError, FetchResult};
use crate::traits::ContentFetcher;
use crate::types::ProfileContent;

use super::transport_error;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";

/// Scrape-API client implementing [`ContentFetcher`].
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::sources::FirecrawlFetcher;
///
/// let fetcher = FirecrawlFetcher::from_env()?;
/// let content = fetcher.fetch("https://lab.example.edu").await?;
/// ```
pub struct FirecrawlFetcher {
    client: Client,
    api_key: ApiKey,
    api_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
}

impl FirecrawlFetcher {
    pub fn new(api_key: impl Into<ApiKey>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| FetchError::Transient(Box::new(e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Create from `FIRECRAWL_API_KEY`, honoring an optional
    /// `FIRECRAWL_API_URL` override.
    pub fn from_env() -> FetchResult<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY").map_err(|_| FetchError::Auth {
            service: "firecrawl",
            reason: "FIRECRAWL_API_KEY environment variable not set".to_string(),
        })?;
        let mut fetcher = Self::new(api_key)?;
        if let Ok(url) = std::env::var("FIRECRAWL_API_URL") {
            fetcher.api_url = url;
        }
        Ok(fetcher)
    }

    /// Point at a different API endpoint (self-hosted, test servers).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<ProfileContent> {
        let request = ScrapeRequest {
            url: url.to_string(),
            formats: vec!["markdown".to_string()],
        };

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                service: "firecrawl",
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("scrape API returned HTTP {status}"),
            ))));
        }

        let scrape: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(Box::new(e)))?;

        if !scrape.success {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scrape API reported failure",
            ))));
        }

        let markdown = scrape
            .data
            .and_then(|data| data.markdown)
            .unwrap_or_default();
        if markdown.trim().is_empty() {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scrape API returned no content",
            ))));
        }

        Ok(ProfileContent::new(url, markdown))
    }
}
