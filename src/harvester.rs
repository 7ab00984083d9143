//! Run driver: the page loop and its terminal states.
//!
//! A run walks listing pages for one query, hands each page's stubs to the
//! detail pool, and checkpoints after every batch. Four ways out: the
//! cursor exhausts, the page cap is hit, cancellation arrives, or a
//! credential failure makes continuing pointless. Every exit path writes
//! one last checkpoint after the pool has fully quiesced, so the file on
//! disk always reflects every record that made it in.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::config::HarvestConfig;
use crate::error::{FetchError, HarvestError};
use crate::limiter::RollingWindowLimiter;
use crate::pipeline::ExtractionPipeline;
use crate::pool::{DetailFetchPool, SkippedStub};
use crate::traits::{ContentFetcher, ListingSource, StructuredExtractor};
use crate::types::FieldSchema;
use crate::walker::{ListingCursorWalker, WalkEnd};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The listing ran out of pages
    Exhausted,
    /// The configured page cap stopped the walk
    MaxPagesReached,
    /// Cancellation was observed, between pages or mid-batch
    Interrupted,
    /// A page-level failure ended the run early; collected records stand
    Failed { reason: String },
}

/// Summary of one harvest run.
#[derive(Debug)]
pub struct HarvestReport {
    pub outcome: RunOutcome,
    pub query: String,
    pub pages_visited: usize,
    pub records: usize,
    pub skipped: Vec<SkippedStub>,
    pub aborted: usize,
    pub checkpoint: Option<PathBuf>,
}

impl HarvestReport {
    /// Whether the walk covered everything it was asked to.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Exhausted | RunOutcome::MaxPagesReached
        )
    }
}

enum Ended {
    Outcome(RunOutcome),
    Fatal(HarvestError),
}

/// Ties the walker, pool, pipeline and aggregator into one run loop.
pub struct Harvester<L, F, X> {
    listing: L,
    pool: DetailFetchPool<F, X>,
    source_limiter: Arc<RollingWindowLimiter>,
    config: HarvestConfig,
}

impl<L, F, X> Harvester<L, F, X>
where
    L: ListingSource,
    F: ContentFetcher + 'static,
    X: StructuredExtractor + 'static,
{
    /// Wires the three external interfaces together under one config.
    /// The listing source and the detail fetcher share a rate limiter;
    /// the extractor gets its own.
    pub fn new(config: HarvestConfig, listing: L, fetcher: F, extractor: X) -> Self {
        let source_limiter = Arc::new(RollingWindowLimiter::new(config.source_limit));
        let extractor_limiter = Arc::new(RollingWindowLimiter::new(config.extractor_limit));
        let pipeline = ExtractionPipeline::new(
            extractor,
            extractor_limiter,
            FieldSchema::research_profile(),
            config.truncate_chars,
        );
        let pool = DetailFetchPool::new(
            Arc::new(fetcher),
            Arc::new(pipeline),
            Arc::clone(&source_limiter),
            config.workers,
            config.task_timeout,
            config.shutdown_grace,
        );
        Self {
            listing,
            pool,
            source_limiter,
            config,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Runs one query to a terminal state.
    ///
    /// `Ok` covers exhaustion, the page cap, interruption and page-level
    /// failure; whatever was collected is in the checkpoint either way.
    /// `Err` means credentials were rejected or a checkpoint could not be
    /// written, and even then a final checkpoint was attempted first.
    pub async fn run(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<HarvestReport, HarvestError> {
        let aggregator = Arc::new(Aggregator::new(
            self.checkpoint_dir(query),
            self.config.file_stem.clone(),
        ));
        let mut walker = ListingCursorWalker::new(
            &self.listing,
            Arc::clone(&self.source_limiter),
            query,
            self.config.max_pages,
        );
        let mut skipped = Vec::new();
        let mut aborted = 0usize;

        info!(
            query = %query,
            max_pages = self.config.max_pages,
            workers = self.config.workers,
            "harvest run starting"
        );

        let ended = loop {
            if cancel.is_cancelled() {
                break Ended::Outcome(RunOutcome::Interrupted);
            }

            let fetched = tokio::select! {
                next = walker.next_page() => next,
                _ = cancel.cancelled() => break Ended::Outcome(RunOutcome::Interrupted),
            };

            let page = match fetched {
                Ok(Some(page)) => page,
                Ok(None) => break Ended::Outcome(finished_outcome(walker.end())),
                Err(FetchError::Auth { service, reason }) => {
                    break Ended::Fatal(HarvestError::Auth { service, reason });
                }
                Err(err) => {
                    error!(error = %err, "listing fetch failed after retries, ending run");
                    break Ended::Outcome(RunOutcome::Failed {
                        reason: err.to_string(),
                    });
                }
            };

            if page.stubs.is_empty() {
                continue;
            }

            let report = match self.pool.process_batch(page.stubs, &aggregator, &cancel).await {
                Ok(report) => report,
                Err(err) => break Ended::Fatal(err),
            };
            skipped.extend(report.skipped);
            aborted += report.aborted;

            if report.interrupted {
                break Ended::Outcome(RunOutcome::Interrupted);
            }

            if let Err(err) = aggregator.checkpoint() {
                break Ended::Fatal(err.into());
            }
        };

        // terminal checkpoint, after the pool has fully quiesced
        match (ended, aggregator.checkpoint()) {
            (Ended::Fatal(err), Ok(path)) => {
                error!(error = %err, checkpoint = %path.display(), "harvest run failed");
                Err(err)
            }
            (Ended::Fatal(err), Err(checkpoint_err)) => {
                error!(error = %checkpoint_err, "terminal checkpoint failed after fatal error");
                Err(err)
            }
            (Ended::Outcome(_), Err(checkpoint_err)) => Err(checkpoint_err.into()),
            (Ended::Outcome(outcome), Ok(path)) => {
                let report = HarvestReport {
                    outcome,
                    query: query.to_string(),
                    pages_visited: walker.pages_visited(),
                    records: aggregator.len(),
                    skipped,
                    aborted,
                    checkpoint: Some(path),
                };
                info!(
                    outcome = ?report.outcome,
                    pages = report.pages_visited,
                    records = report.records,
                    skipped = report.skipped.len(),
                    "harvest run finished"
                );
                Ok(report)
            }
        }
    }

    /// Each query gets its own subdirectory under the output directory.
    fn checkpoint_dir(&self, query: &str) -> PathBuf {
        self.config.output_dir.join(sanitize_query(query))
    }
}

fn finished_outcome(end: Option<WalkEnd>) -> RunOutcome {
    match end {
        Some(WalkEnd::MaxPagesReached) => RunOutcome::MaxPagesReached,
        // exhausted cursor, repeated token, unusable markup: the walk is
        // over and what was collected stands
        _ => RunOutcome::Exhausted,
    }
}

/// Filesystem-safe directory name for a query.
fn sanitize_query(query: &str) -> String {
    let cleaned: String = query
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "query".to_string()
    } else {
        cleaned
    }
}
