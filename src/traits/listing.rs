//! Listing source abstraction.

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::listing::Cursor;

/// A paginated listing fetched one cursor position at a time.
///
/// Implementations return raw markup; parsing belongs to the walker so
/// every source is interpreted the same way.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::testing::{listing_markup, MockListingSource};
/// use scholar_harvest::types::Cursor;
///
/// let source = MockListingSource::new()
///     .with_page(listing_markup(&[("u1", "Jane Doe")], None));
/// let markup = source.fetch_page("machine_learning", &Cursor::start()).await?;
/// ```
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the raw listing page for `query` at `cursor`.
    async fn fetch_page(&self, query: &str, cursor: &Cursor) -> FetchResult<String>;
}
