//! Cursor-driven walk over a paginated listing.
//!
//! A walk is a sequence of `next_page()` calls. Each call spends a
//! rate-limit slot, fetches raw markup through the [`ListingSource`],
//! parses profile entries and the pagination control, and advances the
//! cursor. The walk ends on an exhausted cursor, the page cap, a repeated
//! cursor token, or markup the parser cannot recognize. Whatever was
//! collected up to that point stands; unusable markup is a safe stop,
//! never a crash.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchResult, ParseError};
use crate::limiter::RollingWindowLimiter;
use crate::retry::{with_retries, Backoff};
use crate::traits::ListingSource;
use crate::types::{Cursor, ListingPage, ProfileStub};

/// Base URL listing hrefs are resolved against.
pub const LISTING_BASE: &str = "https://scholar.google.com";

/// Query parameter carrying the continuation token in the "Next" control's
/// navigation target.
pub const CONTINUATION_PARAM: &str = "after_author";

/// Why a walk stopped handing out pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The pagination control was missing or disabled
    CursorExhausted,
    /// The configured page cap was reached
    MaxPagesReached,
    /// The source returned the same continuation token twice in a row
    CursorRepeated,
    /// The markup had no recognizable listing structure
    PageUnparsable,
}

/// Stateful pagination over one listing query.
pub struct ListingCursorWalker<'a, L> {
    source: &'a L,
    limiter: Arc<RollingWindowLimiter>,
    query: String,
    cursor: Cursor,
    max_pages: usize,
    visited: usize,
    backoff: Backoff,
    end: Option<WalkEnd>,
}

impl<'a, L> ListingCursorWalker<'a, L>
where
    L: ListingSource,
{
    pub fn new(
        source: &'a L,
        limiter: Arc<RollingWindowLimiter>,
        query: impl Into<String>,
        max_pages: usize,
    ) -> Self {
        Self {
            source,
            limiter,
            query: query.into(),
            cursor: Cursor::start(),
            max_pages,
            visited: 0,
            backoff: Backoff::default(),
            end: None,
        }
    }

    /// Overrides the retry schedule for listing fetches.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Why the walk ended, once it has.
    pub fn end(&self) -> Option<WalkEnd> {
        self.end
    }

    /// Pages successfully parsed so far.
    pub fn pages_visited(&self) -> usize {
        self.visited
    }

    /// Fetches and parses the next listing page.
    ///
    /// `Ok(None)` means the walk is over; [`ListingCursorWalker::end`] says
    /// why. Transient fetch failures are retried with capped backoff before
    /// the error is handed back.
    pub async fn next_page(&mut self) -> FetchResult<Option<ListingPage>> {
        if self.end.is_some() {
            return Ok(None);
        }
        if self.visited >= self.max_pages {
            info!(query = %self.query, pages = self.visited, "page cap reached, ending walk");
            self.end = Some(WalkEnd::MaxPagesReached);
            return Ok(None);
        }

        let source = self.source;
        let limiter = &self.limiter;
        let query = self.query.as_str();
        let cursor = &self.cursor;
        let markup = with_retries("listing page", self.backoff, || async move {
            limiter.acquire().await;
            source.fetch_page(query, cursor).await
        })
        .await?;

        let page = match parse_listing(&markup, self.cursor.index) {
            Ok(page) => page,
            Err(err) => {
                warn!(page = self.cursor.index, error = %err, "unusable listing markup, ending walk");
                self.end = Some(WalkEnd::PageUnparsable);
                return Ok(None);
            }
        };

        self.visited += 1;
        info!(
            query = %self.query,
            page = page.index,
            stubs = page.stubs.len(),
            "listing page parsed"
        );

        match &page.next_token {
            Some(token) if self.cursor.token.as_deref() == Some(token.as_str()) => {
                warn!(page = page.index, "continuation token repeated, ending walk");
                self.end = Some(WalkEnd::CursorRepeated);
            }
            Some(token) => {
                self.cursor = self.cursor.advance(token.clone());
            }
            None => {
                self.end = Some(WalkEnd::CursorExhausted);
            }
        }

        Ok(Some(page))
    }
}

/// Parses one page of listing markup into stubs and the next token.
///
/// Markup with neither a profile entry nor a pagination control (block
/// pages, interstitials) is unparsable. A page with a disabled control and
/// no entries is a legitimate empty final page.
pub fn parse_listing(markup: &str, index: usize) -> Result<ListingPage, ParseError> {
    let stubs = parse_stubs(markup);
    let control = next_control(markup);

    if stubs.is_empty() && control.is_none() {
        return Err(ParseError {
            reason: "no profile entries or pagination control found".to_string(),
        });
    }

    let next_token = control.and_then(|tag| parse_next_token(&tag));
    Ok(ListingPage {
        stubs,
        next_token,
        index,
    })
}

fn parse_stubs(markup: &str) -> Vec<ProfileStub> {
    let entry =
        Regex::new(r#"(?s)<h3[^>]*class="[^"]*gs_ai_name[^"]*"[^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
            .unwrap();
    let inner_tags = Regex::new(r"<[^>]+>").unwrap();
    let base = Url::parse(LISTING_BASE).unwrap();

    let mut stubs = Vec::new();
    for captures in entry.captures_iter(markup) {
        let href = decode_entities(&captures[1]);
        let name = decode_entities(inner_tags.replace_all(&captures[2], "").trim());
        if name.is_empty() {
            continue;
        }
        let detail_url = match base.join(&href) {
            Ok(url) => url,
            Err(err) => {
                debug!(href = %href, error = %err, "skipping entry with unusable href");
                continue;
            }
        };
        let profile_id = query_param(&detail_url, "user")
            .unwrap_or_else(|| detail_url.as_str().to_string());
        stubs.push(ProfileStub::new(profile_id, name, detail_url.as_str()));
    }
    stubs
}

/// The opening tag of the "Next" pagination button, if any.
fn next_control(markup: &str) -> Option<String> {
    Regex::new(r#"<button[^>]*aria-label="Next"[^>]*>"#)
        .unwrap()
        .find(markup)
        .map(|found| found.as_str().to_string())
}

/// Continuation token from the control's inline navigation target.
/// A disabled control or a target without the token means exhaustion.
fn parse_next_token(control_tag: &str) -> Option<String> {
    if control_tag.contains("disabled") {
        return None;
    }
    let target = Regex::new(r"window\.location=(?:&#39;|')(.*?)(?:&#39;|')")
        .unwrap()
        .captures(control_tag)?
        .get(1)?
        .as_str()
        .to_string();
    let decoded = decode_nav_target(&target);
    let url = Url::parse(LISTING_BASE).unwrap().join(&decoded).ok()?;
    query_param(&url, CONTINUATION_PARAM)
}

/// Inline navigation targets hex-escape their separators.
fn decode_nav_target(target: &str) -> String {
    target
        .replace(r"\x3d", "=")
        .replace(r"\x26", "&")
        .replace("&amp;", "&")
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Minimal entity decoding for attribute values and link text.
/// `&amp;` goes last so `&amp;#39;` cannot double-decode.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimit;
    use crate::error::FetchError;
    use crate::testing::{listing_markup, MockFailure, MockListingSource};
    use std::time::Duration;

    fn limiter() -> Arc<RollingWindowLimiter> {
        Arc::new(RollingWindowLimiter::new(RateLimit::per_seconds(100, 60)))
    }

    fn quick_backoff() -> Backoff {
        Backoff::new(3, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn parses_stubs_and_decodes_the_token() {
        let markup = listing_markup(
            &[("AbC123", "Jane Doe"), ("XyZ789", "John Q. Public")],
            Some("TOKEN_1"),
        );
        let page = parse_listing(&markup, 0).unwrap();
        assert_eq!(page.stubs.len(), 2);
        assert_eq!(page.stubs[0].profile_id, "AbC123");
        assert_eq!(page.stubs[0].name, "Jane Doe");
        assert!(page.stubs[0]
            .detail_url
            .starts_with("https://scholar.google.com/citations"));
        assert_eq!(page.next_token.as_deref(), Some("TOKEN_1"));
    }

    #[test]
    fn disabled_control_means_exhaustion() {
        let markup = listing_markup(&[("AbC123", "Jane Doe")], None);
        let page = parse_listing(&markup, 3).unwrap();
        assert_eq!(page.next_token, None);
        assert_eq!(page.index, 3);
    }

    #[test]
    fn markup_without_structure_is_unparsable() {
        let err = parse_listing("<html><body>Please verify you are human</body></html>", 0)
            .unwrap_err();
        assert!(err.reason.contains("no profile entries"));
    }

    #[test]
    fn entity_escapes_in_names_are_decoded() {
        let markup = listing_markup(&[("AbC123", "Smith &amp; Jones Lab")], None);
        let page = parse_listing(&markup, 0).unwrap();
        assert_eq!(page.stubs[0].name, "Smith & Jones Lab");
    }

    #[test]
    fn nav_target_hex_escapes_decode() {
        assert_eq!(
            decode_nav_target(r"/citations?view_op\x3dsearch_authors\x26after_author\x3dQQ"),
            "/citations?view_op=search_authors&after_author=QQ"
        );
    }

    #[tokio::test]
    async fn walks_two_pages_then_exhausts() {
        let source = MockListingSource::new()
            .with_page(listing_markup(&[("A1", "Alice")], Some("T2")))
            .with_page(listing_markup(&[("B2", "Bob")], None));
        let mut walker = ListingCursorWalker::new(&source, limiter(), "carbon capture", 10)
            .with_backoff(quick_backoff());

        let first = walker.next_page().await.unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.stubs[0].profile_id, "A1");

        let second = walker.next_page().await.unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.stubs[0].profile_id, "B2");

        assert!(walker.next_page().await.unwrap().is_none());
        assert_eq!(walker.end(), Some(WalkEnd::CursorExhausted));
        assert_eq!(walker.pages_visited(), 2);

        let calls = source.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].token, None);
        assert_eq!(calls[0].index, 0);
        assert_eq!(calls[1].token.as_deref(), Some("T2"));
        assert_eq!(calls[1].index, 1);
    }

    #[tokio::test]
    async fn repeated_token_trips_the_loop_guard() {
        let source = MockListingSource::new()
            .with_page(listing_markup(&[("A1", "Alice")], Some("SAME")))
            .with_page(listing_markup(&[("B2", "Bob")], Some("SAME")))
            .with_page(listing_markup(&[("C3", "Cara")], Some("SAME")));
        let mut walker = ListingCursorWalker::new(&source, limiter(), "robotics", 10)
            .with_backoff(quick_backoff());

        assert!(walker.next_page().await.unwrap().is_some());
        assert!(walker.next_page().await.unwrap().is_some());
        assert!(walker.next_page().await.unwrap().is_none());
        assert_eq!(walker.end(), Some(WalkEnd::CursorRepeated));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn stops_before_fetching_past_the_page_cap() {
        let source = MockListingSource::new()
            .with_page(listing_markup(&[("A1", "Alice")], Some("T2")))
            .with_page(listing_markup(&[("B2", "Bob")], Some("T3")));
        let mut walker = ListingCursorWalker::new(&source, limiter(), "robotics", 1)
            .with_backoff(quick_backoff());

        assert!(walker.next_page().await.unwrap().is_some());
        assert!(walker.next_page().await.unwrap().is_none());
        assert_eq!(walker.end(), Some(WalkEnd::MaxPagesReached));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn unusable_markup_is_a_safe_stop() {
        let source = MockListingSource::new().with_page("<html>interstitial</html>");
        let mut walker = ListingCursorWalker::new(&source, limiter(), "robotics", 10)
            .with_backoff(quick_backoff());

        assert!(walker.next_page().await.unwrap().is_none());
        assert_eq!(walker.end(), Some(WalkEnd::PageUnparsable));
        assert_eq!(walker.pages_visited(), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = MockListingSource::new()
            .with_failure(MockFailure::Transient)
            .with_page(listing_markup(&[("A1", "Alice")], None));
        let mut walker = ListingCursorWalker::new(&source, limiter(), "robotics", 10)
            .with_backoff(quick_backoff());

        let page = walker.next_page().await.unwrap().unwrap();
        assert_eq!(page.stubs.len(), 1);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn auth_rejection_propagates() {
        let source = MockListingSource::new().with_failure(MockFailure::Auth);
        let mut walker = ListingCursorWalker::new(&source, limiter(), "robotics", 10)
            .with_backoff(quick_backoff());

        let err = walker.next_page().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth { .. }));
        assert_eq!(source.calls().len(), 1);
    }
}
