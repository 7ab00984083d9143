//! Detail page fetcher abstraction.

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::content::ProfileContent;

/// Fetches one page into extraction-ready [`ProfileContent`].
///
/// Used for profile detail pages and for the website email fallback, so
/// implementations must cope with arbitrary pages: no recognizable
/// structure just means empty seeds.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::sources::FirecrawlFetcher;
///
/// let fetcher = FirecrawlFetcher::from_env()?;
/// let content = fetcher.fetch("https://example.org/profile/42").await?;
/// assert!(content.has_content());
/// ```
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch `url` and reduce it to plain text plus whatever structured
    /// fields the page exposes.
    async fn fetch(&self, url: &str) -> FetchResult<ProfileContent>;
}
