//! Core trait abstractions for the three external services.
//!
//! Production implementations live in [`crate::sources`]; deterministic
//! mocks in [`crate::testing`].

pub mod extractor;
pub mod fetcher;
pub mod listing;

pub use extractor::StructuredExtractor;
pub use fetcher::ContentFetcher;
pub use listing::ListingSource;
