//! Fetched detail-page content, ready for extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::record::FieldSet;

/// Substrings marking a line as contact-flavored.
const CONTACT_MARKERS: [&str; 2] = ["contact", "mail"];

/// A fetched detail page (or fallback website) in extraction-ready form.
///
/// Fetchers strip markup down to plain text, pre-segment contact-flavored
/// regions, and surface any fields the page exposes as structured markup
/// (seeds). Seeds outrank both extraction tiers when the record is
/// composed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileContent {
    /// URL the content was fetched from
    pub url: String,
    /// Plain-text page body
    pub body: String,
    /// Contact-flavored regions, scanned before the body by Tier 2
    pub contact: Vec<String>,
    /// Fields parsed straight from structured markup
    pub seeds: FieldSet,
    /// Personal or lab homepage advertised by the page
    pub website: Option<String>,
    /// ORCID identifier advertised by the page
    pub orcid: Option<String>,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

impl ProfileContent {
    /// Content from a URL and body; contact regions are segmented from
    /// the body, everything else starts empty.
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            url: url.into(),
            contact: contact_regions(&body),
            body,
            seeds: FieldSet::default(),
            website: None,
            orcid: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_seeds(mut self, seeds: FieldSet) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn with_orcid(mut self, orcid: impl Into<String>) -> Self {
        self.orcid = Some(orcid.into());
        self
    }

    /// Whether any text survived the fetch.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Collect body lines that look contact-flavored.
///
/// Scanned ahead of the full body so an address printed in a contact
/// block beats one buried in running text.
pub fn contact_regions(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let lower = line.to_lowercase();
            line.contains('@') || CONTACT_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_regions_pick_flagged_lines() {
        let body = "Jane Doe\nProfessor of Biology\nContact: jdoe [at] uni.edu\nOffice hours vary\nE-mail me anytime";
        let regions = contact_regions(body);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].starts_with("Contact:"));
        assert!(regions[1].starts_with("E-mail"));
    }

    #[test]
    fn contact_regions_include_at_sign_lines() {
        let regions = contact_regions("reach me\njdoe@uni.edu\nbye");
        assert_eq!(regions, vec!["jdoe@uni.edu".to_string()]);
    }

    #[test]
    fn new_segments_contact_from_body() {
        let content = ProfileContent::new("https://x.org", "hello\nEmail: a@b.co");
        assert_eq!(content.contact.len(), 1);
        assert!(content.has_content());
        assert!(content.seeds.is_empty());
    }

    #[test]
    fn has_content_false_for_blank_body() {
        assert!(!ProfileContent::new("https://x.org", "  \n ").has_content());
    }
}
