//! Researcher Profile Harvest Pipeline
//!
//! Walks a paginated author-search listing, fetches each researcher's
//! profile page through a bounded worker pool, extracts contact and
//! position fields in two tiers (structured LLM extraction with a
//! deterministic pattern fallback), and checkpoints the deduplicated
//! results to versioned CSV files after every page.
//!
//! # Design
//!
//! - Markup-stated facts outrank both extraction tiers
//! - Structured extraction degrades to the pattern tier, never crashes a run
//! - The cursor only advances after a page's whole batch settles
//! - Every run writes to its own checkpoint version; reruns never clobber
//!
//! # Usage
//!
//! ```rust,ignore
//! use scholar_harvest::{Harvester, HarvestConfig};
//! use scholar_harvest::sources::{OpenAiExtractor, ScholarListing, ScholarProfileFetcher};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = HarvestConfig::from_env().with_max_pages(10);
//! let harvester = Harvester::new(
//!     config,
//!     ScholarListing::new()?,
//!     ScholarProfileFetcher::new()?,
//!     OpenAiExtractor::from_env()?,
//! );
//! let report = harvester.run("machine_learning", CancellationToken::new()).await?;
//! println!("{} records -> {:?}", report.records, report.checkpoint);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (ListingSource, ContentFetcher, StructuredExtractor)
//! - [`types`] - Data types flowing through the pipeline
//! - [`walker`] - Cursor-driven listing pagination
//! - [`pool`] - Bounded-concurrency detail fetch pool
//! - [`pipeline`] - Two-tier field extraction
//! - [`aggregator`] - Dedup and versioned CSV checkpoints
//! - [`harvester`] - Run orchestration
//! - [`sources`] - Production clients for the external services
//! - [`testing`] - Mock implementations for testing

pub mod aggregator;
pub mod config;
pub mod credentials;
pub mod error;
pub mod harvester;
pub mod limiter;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod sources;
pub mod testing;
pub mod traits;
pub mod types;
pub mod walker;

// Re-export core types at crate root
pub use config::{HarvestConfig, RateLimit};
pub use credentials::ApiKey;
pub use error::{
    CheckpointError, ExtractorError, FetchError, HarvestError, ParseError, SchemaError,
};
pub use traits::{ContentFetcher, ListingSource, StructuredExtractor};
pub use types::{
    Cursor, FieldSchema, FieldSet, FundingLikelihood, ListingPage, ProfileContent, ProfileRecord,
    ProfileStub,
};

// Re-export the pipeline stages
pub use aggregator::Aggregator;
pub use harvester::{HarvestReport, Harvester, RunOutcome};
pub use pipeline::ExtractionPipeline;
pub use pool::{BatchReport, DetailFetchPool, SkipReason, SkippedStub};
pub use walker::{ListingCursorWalker, WalkEnd};

// Re-export supporting machinery
pub use limiter::RollingWindowLimiter;
pub use retry::{with_retries, Backoff};
