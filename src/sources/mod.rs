//! Production implementations of the external interfaces.
//!
//! `scholar` talks to the listing site directly over reqwest; `firecrawl`
//! goes through a scrape API for JavaScript-heavy fallback websites;
//! `openai` is the structured-extraction backend. All three are plain
//! clients behind the crate's traits, so any of them can be swapped for a
//! mock in tests.

pub mod firecrawl;
pub mod openai;
pub mod scholar;

pub use firecrawl::FirecrawlFetcher;
pub use openai::OpenAiExtractor;
pub use scholar::{ScholarListing, ScholarProfileFetcher};

use crate::error::FetchError;

/// Maps a transport-level reqwest failure onto the fetch taxonomy.
pub(crate) fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transient(Box::new(err))
    }
}
