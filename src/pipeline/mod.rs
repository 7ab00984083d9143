//! Two-tier field extraction over fetched profile content.
//!
//! Tier one sends a truncated slice of the page to a structured extractor
//! and parses its JSON reply defensively. Tier two is a deterministic
//! pattern pass that recovers obfuscated email addresses without touching
//! the network. [`ExtractionPipeline::extract`] runs both and merges them,
//! structured values first.

pub mod fallback;
pub mod merge;
pub mod structured;
pub mod truncate;

pub use fallback::{normalize_obfuscated_email, pattern_fields, scan_for_email};
pub use merge::merge_tiers;
pub use structured::{parse_field_reply, structured_fields};
pub use truncate::{truncate_for_extraction, TRUNCATION_MARKER};

use std::sync::Arc;

use crate::error::HarvestError;
use crate::limiter::RollingWindowLimiter;
use crate::traits::StructuredExtractor;
use crate::types::{FieldSchema, FieldSet, ProfileContent};

/// Shared per-profile extraction stage.
///
/// Holds the extractor, its rate limiter and the field schema so the
/// detail workers can run extraction without threading four arguments
/// through every call.
pub struct ExtractionPipeline<X> {
    extractor: X,
    limiter: Arc<RollingWindowLimiter>,
    schema: FieldSchema,
    max_chars: usize,
}

impl<X> ExtractionPipeline<X>
where
    X: StructuredExtractor,
{
    pub fn new(
        extractor: X,
        limiter: Arc<RollingWindowLimiter>,
        schema: FieldSchema,
        max_chars: usize,
    ) -> Self {
        Self {
            extractor,
            limiter,
            schema,
            max_chars,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Extracts merged fields for one profile.
    ///
    /// Errors only on extractor authentication failure; every other
    /// extraction problem degrades to whatever the fallback tier found.
    pub async fn extract(&self, content: &ProfileContent) -> Result<FieldSet, HarvestError> {
        let structured = structured_fields(
            &self.extractor,
            &self.limiter,
            &self.schema,
            &content.url,
            &content.body,
            self.max_chars,
        )
        .await?;
        let pattern = pattern_fields(content);
        Ok(merge_tiers(structured, pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimit;
    use crate::testing::{MockExtractor, MockFailure};
    use crate::types::FundingLikelihood;

    fn pipeline(extractor: MockExtractor) -> ExtractionPipeline<MockExtractor> {
        ExtractionPipeline::new(
            extractor,
            Arc::new(RollingWindowLimiter::new(RateLimit::per_seconds(100, 60))),
            FieldSchema::research_profile(),
            4000,
        )
    }

    #[tokio::test]
    async fn structured_tier_outranks_the_pattern_tier() {
        let extractor =
            MockExtractor::new().with_default_reply(r#"{"email": "model@cs.edu"}"#);
        let content = ProfileContent::new(
            "https://example.edu/p1",
            "Contact: pattern [at] cs [dot] edu\nResearch in compilers.",
        );
        let fields = pipeline(extractor).extract(&content).await.unwrap();
        assert_eq!(fields.email.as_deref(), Some("model@cs.edu"));
    }

    #[tokio::test]
    async fn pattern_tier_covers_an_extractor_outage() {
        let extractor = MockExtractor::new().with_failure(MockFailure::Transient);
        let content = ProfileContent::new(
            "https://example.edu/p1",
            "Contact: pattern [at] cs [dot] edu\nResearch in compilers.",
        );
        let fields = pipeline(extractor).extract(&content).await.unwrap();
        assert_eq!(fields.email.as_deref(), Some("pattern@cs.edu"));
        assert_eq!(fields.funding, Some(FundingLikelihood::Medium));
    }
}
