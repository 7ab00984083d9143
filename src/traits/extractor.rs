//! Structured extraction abstraction.

use async_trait::async_trait;

use crate::error::ExtractorResult;
use crate::types::record::FieldSchema;

/// An LLM-backed service that maps free text to the fields in a
/// [`FieldSchema`].
///
/// Returns the raw reply string. The pipeline owns defensive parsing:
/// implementations should not try to clean up or validate model output
/// beyond transport-level concerns.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    /// Extract schema fields from `text`, returning the raw reply.
    async fn extract(&self, text: &str, schema: &FieldSchema) -> ExtractorResult<String>;
}
