//! Combines the structured and fallback tiers into one field set.

use crate::types::{FieldSet, FundingLikelihood};

/// Merges per field, structured tier first. The fallback tier only fills
/// gaps the model left. Funding always comes out decided: when neither
/// tier produced a level the profile defaults to [`FundingLikelihood::Medium`].
pub fn merge_tiers(structured: FieldSet, pattern: FieldSet) -> FieldSet {
    FieldSet {
        position: structured.position.or(pattern.position),
        affiliation: structured.affiliation.or(pattern.affiliation),
        department: structured.department.or(pattern.department),
        supervisor: structured.supervisor.or(pattern.supervisor),
        interests: structured.interests.or(pattern.interests),
        email: structured.email.or(pattern.email),
        funding: Some(
            structured
                .funding
                .or(pattern.funding)
                .unwrap_or_default(),
        ),
    }
}
