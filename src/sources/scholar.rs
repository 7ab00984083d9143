//! Author-search listing and profile fetching over plain HTTP.
//!
//! The listing side builds the author-search URL for a label query and
//! returns the raw markup; all parsing lives in the walker. The profile
//! side fetches one researcher page, strips it to text, and pre-seeds the
//! fields the markup states outright (info line, homepage link, ORCID
//! annotation, interest labels) so the extraction tiers only have to fill
//! what the markup does not say.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::{ContentFetcher, ListingSource};
use crate::types::{Cursor, FieldSet, ProfileContent};
use crate::walker::{decode_entities, CONTINUATION_PARAM, LISTING_BASE};

use super::transport_error;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RESULTS_PER_PAGE: usize = 10;

fn browser_client() -> FetchResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Transient(Box::new(e)))
}

/// Author-search listing source.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::sources::ScholarListing;
/// use scholar_harvest::types::Cursor;
///
/// let listing = ScholarListing::new()?;
/// let markup = listing.fetch_page("machine_learning", &Cursor::start()).await?;
/// ```
pub struct ScholarListing {
    client: Client,
    base_url: String,
}

impl ScholarListing {
    pub fn new() -> FetchResult<Self> {
        Ok(Self {
            client: browser_client()?,
            base_url: format!("{LISTING_BASE}/citations"),
        })
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ListingSource for ScholarListing {
    async fn fetch_page(&self, query: &str, cursor: &Cursor) -> FetchResult<String> {
        let mauthors = format!("label:{query}");
        let astart = (cursor.index * RESULTS_PER_PAGE).to_string();
        let mut request = self.client.get(&self.base_url).query(&[
            ("view_op", "search_authors"),
            ("hl", "en"),
            ("mauthors", mauthors.as_str()),
            ("astart", astart.as_str()),
        ]);
        if let Some(token) = &cursor.token {
            request = request.query(&[(CONTINUATION_PARAM, token.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                service: "listing",
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("listing returned HTTP {status}"),
            ))));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(Box::new(e)))
    }
}

/// Direct-HTTP detail fetcher for researcher profile pages.
///
/// Also serves the website email fallback: any http(s) URL comes back as
/// stripped text with contact regions segmented. Pages that are not
/// profile markup simply yield empty seeds.
pub struct ScholarProfileFetcher {
    client: Client,
}

impl ScholarProfileFetcher {
    pub fn new() -> FetchResult<Self> {
        Ok(Self {
            client: browser_client()?,
        })
    }
}

#[async_trait]
impl ContentFetcher for ScholarProfileFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<ProfileContent> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                service: "detail",
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Transient(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("detail fetch returned HTTP {status}"),
            ))));
        }

        let markup = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(Box::new(e)))?;
        Ok(parse_profile(url, &markup))
    }
}

/// Builds extraction-ready content from profile markup.
pub fn parse_profile(url: &str, markup: &str) -> ProfileContent {
    let mut content = ProfileContent::new(url, strip_markup(markup)).with_seeds(seed_fields(markup));
    if let Some(website) = homepage_link(markup) {
        content = content.with_website(website);
    }
    if let Some(orcid) = orcid_annotation(markup) {
        content = content.with_orcid(orcid);
    }
    content
}

/// Markup to line-oriented text: scripts and styles removed, block
/// boundaries kept as line breaks, entities decoded, whitespace collapsed.
fn strip_markup(markup: &str) -> String {
    let without_scripts = Regex::new(r"(?si)<(script|style)[^>]*>.*?</(script|style)>")
        .unwrap()
        .replace_all(markup, " ");
    let with_breaks = Regex::new(r"(?i)<(br|/p|/div|/h[1-6]|/li|/tr)[^>]*>")
        .unwrap()
        .replace_all(&without_scripts, "\n");
    let without_tags = Regex::new(r"<[^>]+>")
        .unwrap()
        .replace_all(&with_breaks, " ");
    let decoded = decode_entities(&without_tags);

    let mut lines = Vec::new();
    for line in decoded.lines() {
        let cleaned = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() {
            lines.push(cleaned);
        }
    }
    lines.join("\n")
}

/// Fields the markup states outright. The info line that is no more than
/// a "verified email" domain hint seeds nothing; it only surfaces in the
/// body where it flags a contact region.
fn seed_fields(markup: &str) -> FieldSet {
    let mut fields = FieldSet::default();

    let info_line = Regex::new(r#"(?s)<div[^>]*class="[^"]*gsc_prf_il[^"]*"[^>]*>(.*?)</div>"#)
        .unwrap();
    for captures in info_line.captures_iter(markup) {
        let inner = &captures[1];
        if inner.contains("<a") {
            continue;
        }
        let text = plain_text(inner);
        if text.is_empty()
            || text.contains('@')
            || text.to_lowercase().starts_with("verified email")
        {
            continue;
        }
        fields.set("position", &text);
        break;
    }

    let interest = Regex::new(r#"(?s)<a[^>]*class="[^"]*gsc_prf_inta[^"]*"[^>]*>(.*?)</a>"#)
        .unwrap();
    let labels: Vec<String> = interest
        .captures_iter(markup)
        .map(|captures| plain_text(&captures[1]))
        .filter(|label| !label.is_empty())
        .collect();
    if !labels.is_empty() {
        fields.set("interests", &labels.join(", "));
    }

    fields
}

fn homepage_link(markup: &str) -> Option<String> {
    let capture = Regex::new(r#"(?s)<div[^>]*id="gsc_prf_ivh"[^>]*>.*?<a[^>]*href="([^"]+)""#)
        .unwrap()
        .captures(markup)?;
    Some(decode_entities(&capture[1]))
}

/// ORCID annotation carried in the name heading, e.g.
/// `Jane Doe [ORCID: 0000-0001-2345-678X]`.
fn orcid_annotation(markup: &str) -> Option<String> {
    let name_div = Regex::new(r#"(?s)<div[^>]*id="gsc_prf_in"[^>]*>(.*?)</div>"#)
        .unwrap()
        .captures(markup)?;
    let text = plain_text(&name_div[1]);
    let orcid = Regex::new(r"\[ORCID:\s*([^\]]+)\]")
        .unwrap()
        .captures(&text)?;
    Some(orcid[1].trim().to_string())
}

fn plain_text(inner: &str) -> String {
    let stripped = Regex::new(r"<[^>]+>").unwrap().replace_all(inner, " ");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::profile_markup;

    #[test]
    fn seeds_come_from_the_markup() {
        let markup = profile_markup(
            "Jane Doe [ORCID: 0000-0001-2345-678X]",
            "Professor of Chemistry, Example University",
            Some("https://janedoe.example.edu"),
            &["electrochemistry", "batteries"],
        );
        let content = parse_profile("https://scholar.google.com/citations?user=J1", &markup);

        assert_eq!(
            content.seeds.position.as_deref(),
            Some("Professor of Chemistry, Example University")
        );
        assert_eq!(
            content.seeds.interests.as_deref(),
            Some("electrochemistry, batteries")
        );
        assert_eq!(content.website.as_deref(), Some("https://janedoe.example.edu"));
        assert_eq!(content.orcid.as_deref(), Some("0000-0001-2345-678X"));
    }

    #[test]
    fn verified_email_line_seeds_nothing_but_flags_contact() {
        let markup = profile_markup("Jane Doe", "Professor of Chemistry", None, &[]);
        let content = parse_profile("https://scholar.google.com/citations?user=J1", &markup);

        assert!(content.seeds.email.is_none());
        assert!(content
            .contact
            .iter()
            .any(|region| region.to_lowercase().contains("verified email")));
    }

    #[test]
    fn scripts_and_styles_never_reach_the_body() {
        let markup = profile_markup("Jane Doe", "Professor", None, &[]);
        let content = parse_profile("https://scholar.google.com/citations?user=J1", &markup);
        assert!(!content.body.contains("var x"));
        assert!(content.body.contains("Jane Doe"));
    }

    #[test]
    fn foreign_markup_yields_empty_seeds() {
        let content = parse_profile(
            "https://lab.example.edu",
            "<html><body><p>Our group studies corrosion.</p></body></html>",
        );
        assert!(content.seeds.is_empty());
        assert!(content.body.contains("corrosion"));
        assert!(content.website.is_none());
        assert!(content.orcid.is_none());
    }

    #[test]
    fn entities_in_info_lines_decode() {
        let markup = profile_markup("Jane Doe", "Reader, Arts &amp; Sciences", None, &[]);
        let content = parse_profile("https://scholar.google.com/citations?user=J1", &markup);
        assert_eq!(content.seeds.position.as_deref(), Some("Reader, Arts & Sciences"));
    }
}
