//! Structured field extraction backed by a language model.
//!
//! The extractor is asked for a flat JSON object keyed by the schema's
//! field names. Model output is untrusted: replies are parsed defensively
//! and anything that does not decode to usable fields degrades to an empty
//! set rather than failing the profile. The only error that escalates is
//! an authentication failure, which no amount of retrying will cure.

use tracing::{debug, warn};

use crate::error::{ExtractorError, HarvestError, SchemaError};
use crate::limiter::RollingWindowLimiter;
use crate::traits::StructuredExtractor;
use crate::types::{FieldSchema, FieldSet};

use super::truncate::truncate_for_extraction;

/// Runs the structured tier for one profile body.
///
/// Empty bodies short-circuit without spending a rate-limit slot. Extractor
/// outages and malformed replies are logged and produce an empty [`FieldSet`];
/// authentication failures surface as [`HarvestError::Auth`].
pub async fn structured_fields<X>(
    extractor: &X,
    limiter: &RollingWindowLimiter,
    schema: &FieldSchema,
    url: &str,
    body: &str,
    max_chars: usize,
) -> Result<FieldSet, HarvestError>
where
    X: StructuredExtractor,
{
    let text = truncate_for_extraction(body, max_chars);
    if text.trim().is_empty() {
        debug!(url = %url, "no extractable text, skipping structured tier");
        return Ok(FieldSet::default());
    }

    limiter.acquire().await;

    let raw = match extractor.extract(&text, schema).await {
        Ok(raw) => raw,
        Err(ExtractorError::Auth { reason }) => {
            return Err(HarvestError::Auth {
                service: "extractor",
                reason,
            });
        }
        Err(err) => {
            warn!(url = %url, error = %err, "structured extraction failed, continuing without it");
            return Ok(FieldSet::default());
        }
    };

    match parse_field_reply(&raw) {
        Ok(fields) => Ok(fields),
        Err(err) => {
            warn!(url = %url, error = %err, "unusable extractor reply, continuing without it");
            Ok(FieldSet::default())
        }
    }
}

/// Decodes a model reply into a [`FieldSet`].
///
/// Accepts bare JSON or JSON wrapped in a markdown code fence. Unknown keys
/// and non-text values are dropped; the reply must at least be a JSON object.
pub fn parse_field_reply(raw: &str) -> Result<FieldSet, SchemaError> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(cleaned.trim())?;
    let map = value.as_object().ok_or(SchemaError::NotAnObject)?;

    let mut fields = FieldSet::default();
    for (key, value) in map {
        if let Some(text) = text_value(value) {
            fields.set(key, &text);
        }
    }
    Ok(fields)
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Coerces a JSON value to field text. Strings pass through, arrays of
/// strings join on ", ", everything else is dropped.
fn text_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}
