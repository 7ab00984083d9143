//! Data types flowing through the harvest pipeline.

pub mod content;
pub mod listing;
pub mod record;

pub use content::ProfileContent;
pub use listing::{Cursor, ListingPage, ProfileStub};
pub use record::{FieldSchema, FieldSet, FundingLikelihood, ProfileRecord};
