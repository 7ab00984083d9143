//! Mock implementations and markup builders for tests.
//!
//! The mocks stand in for the live sources behind the crate's traits so
//! walks, batches, and whole runs can be exercised offline. Each mock
//! records the calls it receives; assertions read them back through the
//! accessor methods.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ExtractorError, ExtractorResult, FetchError, FetchResult};
use crate::traits::{ContentFetcher, ListingSource, StructuredExtractor};
use crate::types::{Cursor, FieldSchema, ProfileContent};

/// How a mock call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Transient,
    Timeout,
    Auth,
}

impl MockFailure {
    fn fetch_error(self, url: &str, service: &'static str) -> FetchError {
        match self {
            Self::Transient => FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "synthetic outage",
            ))),
            Self::Timeout => FetchError::Timeout {
                url: url.to_string(),
            },
            Self::Auth => FetchError::Auth {
                service,
                reason: "HTTP 403 Forbidden".to_string(),
            },
        }
    }

    fn extractor_error(self) -> ExtractorError {
        match self {
            Self::Auth => ExtractorError::Auth {
                reason: "HTTP 401 Unauthorized".to_string(),
            },
            _ => ExtractorError::Unavailable(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "synthetic outage",
            ))),
        }
    }
}

// =============================================================================
// Mock listing source
// =============================================================================

/// Arguments captured from a listing fetch.
#[derive(Debug, Clone)]
pub struct ListingCall {
    pub query: String,
    pub token: Option<String>,
    pub index: usize,
}

enum QueuedListing {
    Page(String),
    Failure(MockFailure),
}

/// Hands out queued pages (or failures) in order, one per fetch.
pub struct MockListingSource {
    queue: Arc<Mutex<Vec<QueuedListing>>>,
    calls: Arc<Mutex<Vec<ListingCall>>>,
}

impl MockListingSource {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(self, markup: impl Into<String>) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push(QueuedListing::Page(markup.into()));
        self
    }

    pub fn with_failure(self, failure: MockFailure) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push(QueuedListing::Failure(failure));
        self
    }

    /// Every fetch made, in order.
    pub fn calls(&self) -> Vec<ListingCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockListingSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    async fn fetch_page(&self, query: &str, cursor: &Cursor) -> FetchResult<String> {
        self.calls.lock().unwrap().push(ListingCall {
            query: query.to_string(),
            token: cursor.token.clone(),
            index: cursor.index,
        });

        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no pages queued",
            ))));
        }
        match queue.remove(0) {
            QueuedListing::Page(markup) => Ok(markup),
            QueuedListing::Failure(failure) => Err(failure.fetch_error(query, "listing")),
        }
    }
}

// =============================================================================
// Mock content fetcher
// =============================================================================

/// Serves configured [`ProfileContent`] by URL, with optional per-URL
/// delays and persistent failures. Tracks the peak number of in-flight
/// fetches so concurrency bounds can be asserted.
pub struct MockContentFetcher {
    contents: Arc<Mutex<HashMap<String, ProfileContent>>>,
    failures: Arc<Mutex<HashMap<String, MockFailure>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<String>>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl MockContentFetcher {
    pub fn new() -> Self {
        Self {
            contents: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// Serve this content for its own URL.
    pub fn with_content(self, content: ProfileContent) -> Self {
        self.contents
            .lock()
            .unwrap()
            .insert(content.url.clone(), content);
        self
    }

    /// Fail every fetch of `url` the same way.
    pub fn with_failure(self, url: impl Into<String>, failure: MockFailure) -> Self {
        self.failures.lock().unwrap().insert(url.into(), failure);
        self
    }

    /// Sleep this long before answering fetches of `url`.
    pub fn with_delay(self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.into(), delay);
        self
    }

    /// Every URL fetched, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Most fetches ever in flight at once.
    pub fn max_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

impl Default for MockContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for MockContentFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<ProfileContent> {
        self.calls.lock().unwrap().push(url.to_string());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(failure) = self.failures.lock().unwrap().get(url) {
            return Err(failure.fetch_error(url, "detail"));
        }
        match self.contents.lock().unwrap().get(url) {
            Some(content) => Ok(content.clone()),
            None => Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("no content configured for {url}"),
            )))),
        }
    }
}

// =============================================================================
// Mock structured extractor
// =============================================================================

/// Replies with canned strings. A `(needle, reply)` pair answers any text
/// containing the needle; everything else gets the default reply (an empty
/// JSON object unless overridden).
pub struct MockExtractor {
    default_reply: Arc<Mutex<String>>,
    responses: Arc<Mutex<Vec<(String, String)>>>,
    failure: Arc<Mutex<Option<MockFailure>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            default_reply: Arc::new(Mutex::new("{}".to_string())),
            responses: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        *self.default_reply.lock().unwrap() = reply.into();
        self
    }

    /// Answer any text containing `needle` with `reply`. First match wins.
    pub fn with_response(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((needle.into(), reply.into()));
        self
    }

    pub fn with_failure(self, failure: MockFailure) -> Self {
        *self.failure.lock().unwrap() = Some(failure);
        self
    }

    /// Every text submitted for extraction.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredExtractor for MockExtractor {
    async fn extract(&self, text: &str, _schema: &FieldSchema) -> ExtractorResult<String> {
        self.calls.lock().unwrap().push(text.to_string());

        if let Some(failure) = *self.failure.lock().unwrap() {
            return Err(failure.extractor_error());
        }
        let responses = self.responses.lock().unwrap();
        for (needle, reply) in responses.iter() {
            if text.contains(needle.as_str()) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.lock().unwrap().clone())
    }
}

// =============================================================================
// Markup builders
// =============================================================================

/// One page of author-search listing markup with the given `(id, name)`
/// entries. `next_token` controls the pagination button: a token yields an
/// enabled control whose navigation target carries it hex-escaped, `None`
/// yields a disabled control.
pub fn listing_markup(entries: &[(&str, &str)], next_token: Option<&str>) -> String {
    let mut body = String::new();
    for (id, name) in entries {
        body.push_str(&format!(
            r#"<div class="gsc_1usr"><h3 class="gs_ai_name"><a href="/citations?hl=en&amp;user={id}">{name}</a></h3><div class="gs_ai_aff">Example University</div></div>"#
        ));
        body.push('\n');
    }
    let button = match next_token {
        Some(token) => format!(
            r#"<button type="button" aria-label="Next" onclick="window.location='/citations?view_op\x3dsearch_authors\x26hl\x3den\x26after_author\x3d{token}\x26astart\x3d10'"><span>&gt;</span></button>"#
        ),
        None => r#"<button type="button" aria-label="Next" disabled><span>&gt;</span></button>"#
            .to_string(),
    };
    format!(
        "<html><body><div id=\"gsc_sa_ccl\">\n{body}{button}\n</div></body></html>"
    )
}

/// One researcher profile page in the listing site's markup. Always
/// carries a "Verified email at uni.edu" info line and a script block so
/// tests can check both are handled.
pub fn profile_markup(
    name: &str,
    affiliation: &str,
    homepage: Option<&str>,
    interests: &[&str],
) -> String {
    let verified = match homepage {
        Some(url) => format!(
            r#"<div class="gsc_prf_il" id="gsc_prf_ivh">Verified email at uni.edu - <a href="{url}" rel="nofollow">Homepage</a></div>"#
        ),
        None => r#"<div class="gsc_prf_il" id="gsc_prf_ivh">Verified email at uni.edu</div>"#
            .to_string(),
    };
    let interest_block = if interests.is_empty() {
        String::new()
    } else {
        let anchors: Vec<String> = interests
            .iter()
            .map(|label| {
                format!(
                    r#"<a class="gsc_prf_inta gs_ibl" href="/citations?view_op=search_authors&amp;mauthors=label:{}">{label}</a>"#,
                    label.replace(' ', "_")
                )
            })
            .collect();
        format!(
            r#"<div class="gsc_prf_il" id="gsc_prf_int">{}</div>"#,
            anchors.join("")
        )
    };
    format!(
        "<html><head><script>var x = 1;</script><style>#gsc_prf_w{{margin:0}}</style></head><body>\n\
         <div id=\"gsc_prf_w\">\n\
         <div id=\"gsc_prf_in\">{name}</div>\n\
         <div class=\"gsc_prf_il\">{affiliation}</div>\n\
         {verified}\n\
         {interest_block}\n\
         </div>\n\
         </body></html>"
    )
}
