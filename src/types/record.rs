//! Record-side types: extracted fields, the funding classification, and
//! the composed researcher record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::content::ProfileContent;
use crate::types::listing::ProfileStub;

/// How likely a researcher is to have funding for new students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FundingLikelihood {
    High,
    #[default]
    Medium,
    Low,
}

impl FundingLikelihood {
    /// Case-insensitive parse; anything unrecognized is `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for FundingLikelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional extracted fields for one researcher.
///
/// Setters trim and drop empty input, so a stored value is always
/// non-empty text. "Explicitly empty" collapses to absent right here,
/// which is what the tier merge relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    pub position: Option<String>,
    pub affiliation: Option<String>,
    pub department: Option<String>,
    pub supervisor: Option<String>,
    pub interests: Option<String>,
    pub email: Option<String>,
    pub funding: Option<FundingLikelihood>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `field` if the key is known and the trimmed
    /// text is non-empty. Unknown keys are ignored; a few synonyms the
    /// extraction service likes to emit are accepted.
    pub fn set(&mut self, field: &str, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        match field {
            "position" => self.position = Some(trimmed.to_string()),
            "affiliation" | "institute" | "institution" => {
                self.affiliation = Some(trimmed.to_string())
            }
            "department" => self.department = Some(trimmed.to_string()),
            "supervisor" | "advisor" => self.supervisor = Some(trimmed.to_string()),
            "interests" | "research_interests" => self.interests = Some(trimmed.to_string()),
            "email" => self.email = Some(trimmed.to_string()),
            "funding_likelihood" => {
                if let Some(level) = FundingLikelihood::parse(trimmed) {
                    self.funding = Some(level);
                }
            }
            _ => {}
        }
    }

    /// Chainable variant of [`set`](Self::set), handy in builders and tests.
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.set(field, value);
        self
    }

    /// Whether no field holds a value.
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.affiliation.is_none()
            && self.department.is_none()
            && self.supervisor.is_none()
            && self.interests.is_none()
            && self.email.is_none()
            && self.funding.is_none()
    }
}

/// The field list handed to a structured extractor.
///
/// Drives both the request (which fields to ask for) and the prompt's
/// description of the classification labels.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    text_fields: Vec<&'static str>,
    category_field: &'static str,
    category_labels: Vec<&'static str>,
}

impl FieldSchema {
    /// The researcher-profile schema: six text fields plus the
    /// funding-likelihood label.
    pub fn research_profile() -> Self {
        Self {
            text_fields: vec![
                "position",
                "affiliation",
                "department",
                "supervisor",
                "interests",
                "email",
            ],
            category_field: "funding_likelihood",
            category_labels: vec!["High", "Medium", "Low"],
        }
    }

    pub fn text_fields(&self) -> &[&'static str] {
        &self.text_fields
    }

    pub fn category_field(&self) -> &'static str {
        self.category_field
    }

    pub fn category_labels(&self) -> &[&'static str] {
        &self.category_labels
    }

    /// Every key a reply may legitimately contain.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.text_fields
            .iter()
            .copied()
            .chain(std::iter::once(self.category_field))
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::research_profile()
    }
}

/// A fully composed researcher record, keyed by `profile_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_id: String,
    pub name: String,
    pub url: String,
    pub website: Option<String>,
    pub orcid: Option<String>,
    pub position: Option<String>,
    pub affiliation: Option<String>,
    pub department: Option<String>,
    pub supervisor: Option<String>,
    pub interests: Option<String>,
    pub email: Option<String>,
    pub funding: FundingLikelihood,
}

impl ProfileRecord {
    /// Compose a record from its stub, the fetched content, and the
    /// merged extraction output.
    ///
    /// Identity comes from the stub alone and is never overwritten.
    /// Seed fields parsed from structured markup outrank the merged
    /// tier output field by field; they are page facts, not model
    /// output.
    pub fn compose(stub: &ProfileStub, content: &ProfileContent, merged: &FieldSet) -> Self {
        let seeds = &content.seeds;
        Self {
            profile_id: stub.profile_id.clone(),
            name: stub.name.clone(),
            url: stub.detail_url.clone(),
            website: content.website.clone(),
            orcid: content.orcid.clone(),
            position: seeds.position.clone().or_else(|| merged.position.clone()),
            affiliation: seeds
                .affiliation
                .clone()
                .or_else(|| merged.affiliation.clone()),
            department: seeds
                .department
                .clone()
                .or_else(|| merged.department.clone()),
            supervisor: seeds
                .supervisor
                .clone()
                .or_else(|| merged.supervisor.clone()),
            interests: seeds.interests.clone().or_else(|| merged.interests.clone()),
            email: seeds.email.clone().or_else(|| merged.email.clone()),
            funding: seeds.funding.or(merged.funding).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_parse_is_case_insensitive() {
        assert_eq!(FundingLikelihood::parse("HIGH"), Some(FundingLikelihood::High));
        assert_eq!(FundingLikelihood::parse(" medium "), Some(FundingLikelihood::Medium));
        assert_eq!(FundingLikelihood::parse("Low"), Some(FundingLikelihood::Low));
        assert_eq!(FundingLikelihood::parse("very likely"), None);
        assert_eq!(FundingLikelihood::parse(""), None);
    }

    #[test]
    fn funding_default_is_medium() {
        assert_eq!(FundingLikelihood::default(), FundingLikelihood::Medium);
    }

    #[test]
    fn set_drops_empty_and_whitespace_values() {
        let mut fields = FieldSet::new();
        fields.set("position", "");
        fields.set("email", "   ");
        assert!(fields.is_empty());
    }

    #[test]
    fn set_trims_values() {
        let fields = FieldSet::new().with("position", "  Professor  ");
        assert_eq!(fields.position.as_deref(), Some("Professor"));
    }

    #[test]
    fn set_accepts_synonyms() {
        let fields = FieldSet::new()
            .with("institute", "Stanford")
            .with("advisor", "J. Smith");
        assert_eq!(fields.affiliation.as_deref(), Some("Stanford"));
        assert_eq!(fields.supervisor.as_deref(), Some("J. Smith"));
    }

    #[test]
    fn set_ignores_unknown_keys_and_bad_funding_labels() {
        let fields = FieldSet::new()
            .with("favorite_color", "blue")
            .with("funding_likelihood", "probably");
        assert!(fields.is_empty());
    }

    #[test]
    fn schema_keys_cover_every_field() {
        let schema = FieldSchema::research_profile();
        let keys: Vec<_> = schema.keys().collect();
        assert_eq!(keys.len(), 7);
        assert!(keys.contains(&"funding_likelihood"));
        assert!(keys.contains(&"supervisor"));
    }

    #[test]
    fn compose_prefers_seeds_then_merged() {
        let stub = ProfileStub::new("p1", "Jane Doe", "https://example.org/p1");
        let content = ProfileContent::new("https://example.org/p1", "body")
            .with_seeds(FieldSet::new().with("email", "seed@uni.edu"))
            .with_website("https://janedoe.dev");
        let merged = FieldSet::new()
            .with("email", "merged@uni.edu")
            .with("position", "Professor");

        let record = ProfileRecord::compose(&stub, &content, &merged);
        assert_eq!(record.profile_id, "p1");
        assert_eq!(record.email.as_deref(), Some("seed@uni.edu"));
        assert_eq!(record.position.as_deref(), Some("Professor"));
        assert_eq!(record.website.as_deref(), Some("https://janedoe.dev"));
        assert_eq!(record.funding, FundingLikelihood::Medium);
    }
}
