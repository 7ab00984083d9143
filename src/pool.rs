//! Bounded-concurrency detail fetching with a per-page barrier.
//!
//! One batch is one listing page's worth of stubs. `process_batch`
//! dispatches a task per stub onto a `JoinSet`, bounded by a semaphore,
//! and does not return until every task has terminated. That drain is the
//! barrier the driver relies on: the cursor never advances while detail
//! work for the current page is still in flight.
//!
//! Item failures (fetch errors after retries, timeouts, panics) skip the
//! stub and leave the batch alive. Credential failures are different:
//! the batch shuts down and the error propagates so the run can stop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;
use crate::error::{FetchError, HarvestError};
use crate::limiter::RollingWindowLimiter;
use crate::pipeline::{scan_for_email, ExtractionPipeline};
use crate::retry::{with_retries, Backoff};
use crate::traits::{ContentFetcher, StructuredExtractor};
use crate::types::{ProfileRecord, ProfileStub};

/// Why a stub produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The task exceeded the per-task deadline
    TimedOut,
    /// The detail fetch failed after retries
    Fetch(String),
    /// Cancellation arrived before the task did real work
    Cancelled,
    /// The pool itself misbehaved
    Internal(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TimedOut => write!(f, "task deadline exceeded"),
            SkipReason::Fetch(reason) => write!(f, "fetch failed: {reason}"),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::Internal(reason) => write!(f, "internal: {reason}"),
        }
    }
}

/// A stub the batch gave up on, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedStub {
    pub stub: ProfileStub,
    pub reason: SkipReason,
}

/// What happened to one page's worth of stubs.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Stubs handed to `process_batch`
    pub dispatched: usize,
    /// Records newly inserted into the aggregator
    pub inserted: usize,
    /// Records dropped because their profile id was already present
    pub duplicates: usize,
    /// Stubs skipped, with reasons
    pub skipped: Vec<SkippedStub>,
    /// Tasks that terminated without an outcome (aborted or panicked)
    pub aborted: usize,
    /// Whether cancellation was observed during this batch
    pub interrupted: bool,
}

impl BatchReport {
    /// Stubs with a known fate. Equals `dispatched` once the barrier
    /// has drained.
    pub fn accounted(&self) -> usize {
        self.inserted + self.duplicates + self.skipped.len() + self.aborted
    }
}

enum TaskOutcome {
    Inserted,
    Duplicate,
    Skipped(SkippedStub),
    Fatal { stub: ProfileStub, err: HarvestError },
}

enum TaskError {
    Skip(SkipReason),
    Fatal(HarvestError),
}

/// Worker pool for per-profile detail fetch + extraction.
pub struct DetailFetchPool<F, X> {
    fetcher: Arc<F>,
    pipeline: Arc<ExtractionPipeline<X>>,
    limiter: Arc<RollingWindowLimiter>,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
    shutdown_grace: Duration,
    backoff: Backoff,
}

impl<F, X> DetailFetchPool<F, X>
where
    F: ContentFetcher + 'static,
    X: StructuredExtractor + 'static,
{
    pub fn new(
        fetcher: Arc<F>,
        pipeline: Arc<ExtractionPipeline<X>>,
        limiter: Arc<RollingWindowLimiter>,
        workers: usize,
        task_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            fetcher,
            pipeline,
            limiter,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            task_timeout,
            shutdown_grace,
            backoff: Backoff::default(),
        }
    }

    /// Overrides the retry schedule for detail fetches.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Processes one page's stubs to completion.
    ///
    /// Returns only after every dispatched task has terminated. On
    /// cancellation, in-flight tasks get the configured grace period and
    /// are then aborted; the report says what still made it in.
    pub async fn process_batch(
        &self,
        stubs: Vec<ProfileStub>,
        aggregator: &Arc<Aggregator>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, HarvestError> {
        let mut report = BatchReport {
            dispatched: stubs.len(),
            ..BatchReport::default()
        };
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

        for stub in stubs {
            if cancel.is_cancelled() {
                report.interrupted = true;
                report.skipped.push(SkippedStub {
                    stub,
                    reason: SkipReason::Cancelled,
                });
                continue;
            }
            let fetcher = Arc::clone(&self.fetcher);
            let pipeline = Arc::clone(&self.pipeline);
            let limiter = Arc::clone(&self.limiter);
            let semaphore = Arc::clone(&self.semaphore);
            let aggregator = Arc::clone(aggregator);
            let cancel = cancel.clone();
            let task_timeout = self.task_timeout;
            let backoff = self.backoff;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TaskOutcome::Skipped(SkippedStub {
                            stub,
                            reason: SkipReason::Internal("worker pool closed".to_string()),
                        });
                    }
                };
                if cancel.is_cancelled() {
                    return TaskOutcome::Skipped(SkippedStub {
                        stub,
                        reason: SkipReason::Cancelled,
                    });
                }

                let work = process_stub(&stub, &*fetcher, &*pipeline, &*limiter, backoff);
                match tokio::time::timeout(task_timeout, work).await {
                    Ok(Ok(record)) => {
                        if aggregator.add(record) {
                            debug!(profile_id = %stub.profile_id, "record inserted");
                            TaskOutcome::Inserted
                        } else {
                            debug!(profile_id = %stub.profile_id, "duplicate profile dropped");
                            TaskOutcome::Duplicate
                        }
                    }
                    Ok(Err(TaskError::Fatal(err))) => TaskOutcome::Fatal { stub, err },
                    Ok(Err(TaskError::Skip(reason))) => {
                        warn!(profile_id = %stub.profile_id, reason = %reason, "stub skipped");
                        TaskOutcome::Skipped(SkippedStub { stub, reason })
                    }
                    Err(_) => {
                        warn!(profile_id = %stub.profile_id, "detail task exceeded its deadline");
                        TaskOutcome::Skipped(SkippedStub {
                            stub,
                            reason: SkipReason::TimedOut,
                        })
                    }
                }
            });
        }

        let mut fatal: Option<HarvestError> = None;

        while !tasks.is_empty() {
            tokio::select! {
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    record_outcome(joined, &mut report, &mut fatal);
                    if fatal.is_some() {
                        warn!("fatal error in batch, aborting remaining tasks");
                        tasks.abort_all();
                        while let Some(joined) = tasks.join_next().await {
                            record_outcome(joined, &mut report, &mut fatal);
                        }
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    report.interrupted = true;
                    info!(
                        pending = tasks.len(),
                        grace_ms = self.shutdown_grace.as_millis() as u64,
                        "cancellation observed, draining in-flight tasks"
                    );
                    self.drain_with_grace(&mut tasks, &mut report, &mut fatal).await;
                    break;
                }
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }
        Ok(report)
    }

    /// Lets in-flight tasks finish within the grace period, then aborts
    /// and awaits whatever is left. Nothing outlives this call.
    async fn drain_with_grace(
        &self,
        tasks: &mut JoinSet<TaskOutcome>,
        report: &mut BatchReport,
        fatal: &mut Option<HarvestError>,
    ) {
        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        while !tasks.is_empty() {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => record_outcome(joined, report, fatal),
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = tasks.len(), "grace period expired, aborting in-flight tasks");
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        record_outcome(joined, report, fatal);
                    }
                    break;
                }
            }
        }
    }
}

fn record_outcome(
    joined: Result<TaskOutcome, tokio::task::JoinError>,
    report: &mut BatchReport,
    fatal: &mut Option<HarvestError>,
) {
    match joined {
        Ok(TaskOutcome::Inserted) => report.inserted += 1,
        Ok(TaskOutcome::Duplicate) => report.duplicates += 1,
        Ok(TaskOutcome::Skipped(skipped)) => report.skipped.push(skipped),
        Ok(TaskOutcome::Fatal { stub, err }) => {
            report.skipped.push(SkippedStub {
                stub,
                reason: SkipReason::Fetch(err.to_string()),
            });
            // first fatal wins, later ones only mark their stub
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        Err(join_err) => {
            if join_err.is_panic() {
                error!(error = %join_err, "detail task panicked");
            }
            report.aborted += 1;
        }
    }
}

/// Fetch, extract and compose one record.
async fn process_stub<F, X>(
    stub: &ProfileStub,
    fetcher: &F,
    pipeline: &ExtractionPipeline<X>,
    limiter: &RollingWindowLimiter,
    backoff: Backoff,
) -> Result<ProfileRecord, TaskError>
where
    F: ContentFetcher,
    X: StructuredExtractor,
{
    let url = stub.detail_url.as_str();
    let content = with_retries("detail page", backoff, || async move {
        limiter.acquire().await;
        fetcher.fetch(url).await
    })
    .await
    .map_err(|err| match err {
        FetchError::Auth { service, reason } => {
            TaskError::Fatal(HarvestError::Auth { service, reason })
        }
        other => TaskError::Skip(SkipReason::Fetch(other.to_string())),
    })?;

    let merged = pipeline.extract(&content).await.map_err(TaskError::Fatal)?;
    let mut record = ProfileRecord::compose(stub, &content, &merged);

    if record.email.is_none() {
        let looked_up = website_email(&record, fetcher, limiter)
            .await
            .map_err(TaskError::Fatal)?;
        if let Some(email) = looked_up {
            record.email = Some(email);
        }
    }

    Ok(record)
}

/// Last-resort email lookup on the profile's advertised website.
///
/// Best effort: one fetch, no retries, only http(s) targets. The record
/// keeps its empty email unless the lookup actually ran and validated an
/// address.
async fn website_email<F>(
    record: &ProfileRecord,
    fetcher: &F,
    limiter: &RollingWindowLimiter,
) -> Result<Option<String>, HarvestError>
where
    F: ContentFetcher,
{
    let Some(website) = record.website.as_deref() else {
        return Ok(None);
    };
    if !website.starts_with("http://") && !website.starts_with("https://") {
        debug!(url = %website, "skipping non-http website for email lookup");
        return Ok(None);
    }

    limiter.acquire().await;
    match fetcher.fetch(website).await {
        Ok(content) => {
            let found = scan_for_email(&content);
            if let Some(email) = &found {
                info!(profile_id = %record.profile_id, email = %email, "email recovered from website");
            }
            Ok(found)
        }
        Err(FetchError::Auth { service, reason }) => Err(HarvestError::Auth { service, reason }),
        Err(err) => {
            debug!(url = %website, error = %err, "website email lookup failed");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimit;
    use crate::testing::{MockContentFetcher, MockExtractor, MockFailure};
    use crate::types::{FieldSchema, ProfileContent};

    fn quick_backoff() -> Backoff {
        Backoff::new(2, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn wide_limiter() -> Arc<RollingWindowLimiter> {
        Arc::new(RollingWindowLimiter::new(RateLimit::per_seconds(1000, 60)))
    }

    fn pool_with(
        fetcher: MockContentFetcher,
        extractor: MockExtractor,
        workers: usize,
        task_timeout: Duration,
    ) -> DetailFetchPool<MockContentFetcher, MockExtractor> {
        let pipeline = ExtractionPipeline::new(
            extractor,
            wide_limiter(),
            FieldSchema::research_profile(),
            4000,
        );
        DetailFetchPool::new(
            Arc::new(fetcher),
            Arc::new(pipeline),
            wide_limiter(),
            workers,
            task_timeout,
            Duration::from_millis(200),
        )
        .with_backoff(quick_backoff())
    }

    fn stub(id: &str) -> ProfileStub {
        ProfileStub::new(
            id,
            format!("Person {id}"),
            format!("https://scholar.google.com/citations?user={id}"),
        )
    }

    fn content_for(id: &str) -> ProfileContent {
        ProfileContent::new(
            format!("https://scholar.google.com/citations?user={id}"),
            format!(
                "Research profile for {id}.\nEmail: {} [at] uni [dot] edu",
                id.to_lowercase()
            ),
        )
    }

    fn aggregator() -> Arc<Aggregator> {
        Arc::new(Aggregator::new(".", "unused"))
    }

    #[tokio::test]
    async fn every_dispatched_stub_is_accounted_for() {
        let fetcher = MockContentFetcher::new()
            .with_content(content_for("A1"))
            .with_content(content_for("B2"))
            .with_failure("https://scholar.google.com/citations?user=C3", MockFailure::Transient);
        let pool = pool_with(fetcher, MockExtractor::new(), 5, Duration::from_secs(5));
        let aggregator = aggregator();

        let report = pool
            .process_batch(
                vec![stub("A1"), stub("B2"), stub("C3")],
                &aggregator,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.dispatched, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.accounted(), 3);
        assert!(matches!(report.skipped[0].reason, SkipReason::Fetch(_)));
        assert!(!report.interrupted);
        assert_eq!(aggregator.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_profiles_count_as_duplicates() {
        let fetcher = MockContentFetcher::new().with_content(content_for("A1"));
        let pool = pool_with(fetcher, MockExtractor::new(), 5, Duration::from_secs(5));
        let aggregator = aggregator();

        let first = pool
            .process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();
        let second = pool
            .process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(aggregator.len(), 1);
    }

    #[tokio::test]
    async fn slow_tasks_are_skipped_not_wedged() {
        let fetcher = MockContentFetcher::new()
            .with_content(content_for("A1"))
            .with_delay(
                "https://scholar.google.com/citations?user=A1",
                Duration::from_millis(300),
            );
        let pool = pool_with(fetcher, MockExtractor::new(), 5, Duration::from_millis(50));
        let aggregator = aggregator();

        let report = pool
            .process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::TimedOut);
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn credential_failure_fails_the_batch() {
        let fetcher = MockContentFetcher::new()
            .with_content(content_for("A1"))
            .with_failure("https://scholar.google.com/citations?user=B2", MockFailure::Auth);
        let pool = pool_with(fetcher, MockExtractor::new(), 5, Duration::from_secs(5));
        let aggregator = aggregator();

        let err = pool
            .process_batch(
                vec![stub("A1"), stub("B2")],
                &aggregator,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Auth { .. }));
    }

    #[tokio::test]
    async fn cancellation_drains_and_reports_interrupted() {
        let mut fetcher = MockContentFetcher::new();
        for id in ["A1", "B2", "C3", "D4"] {
            fetcher = fetcher.with_content(content_for(id)).with_delay(
                format!("https://scholar.google.com/citations?user={id}"),
                Duration::from_millis(100),
            );
        }
        let pool = pool_with(fetcher, MockExtractor::new(), 2, Duration::from_secs(5));
        let aggregator = aggregator();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let report = pool
            .process_batch(
                vec![stub("A1"), stub("B2"), stub("C3"), stub("D4")],
                &aggregator,
                &cancel,
            )
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.accounted(), 4);
    }

    #[tokio::test]
    async fn concurrency_stays_within_the_worker_bound() {
        let mut fetcher = MockContentFetcher::new();
        let ids = ["A1", "B2", "C3", "D4", "E5", "F6"];
        for id in ids {
            fetcher = fetcher.with_content(content_for(id)).with_delay(
                format!("https://scholar.google.com/citations?user={id}"),
                Duration::from_millis(30),
            );
        }
        let pool = pool_with(fetcher, MockExtractor::new(), 2, Duration::from_secs(5));
        let fetcher_gauge = Arc::clone(&pool.fetcher);
        let aggregator = aggregator();

        let report = pool
            .process_batch(
                ids.iter().map(|id| stub(id)).collect(),
                &aggregator,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.inserted, 6);
        assert!(fetcher_gauge.max_active() <= 2);
    }

    #[tokio::test]
    async fn website_fallback_fills_missing_email() {
        let profile_url = "https://scholar.google.com/citations?user=A1";
        let site_url = "https://lab.example.edu";
        let profile = ProfileContent::new(profile_url, "Research profile, no address here.")
            .with_website(site_url);
        let site = ProfileContent::new(site_url, "Contact: a1 [at] lab [dot] example [dot] edu");
        let fetcher = MockContentFetcher::new()
            .with_content(profile)
            .with_content(site);
        let pool = pool_with(fetcher, MockExtractor::new(), 2, Duration::from_secs(5));
        let aggregator = aggregator();

        let report = pool
            .process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        let records = aggregator.snapshot();
        assert_eq!(records[0].email.as_deref(), Some("a1@lab.example.edu"));
    }

    #[tokio::test]
    async fn website_fallback_leaves_email_empty_when_lookup_fails() {
        let profile_url = "https://scholar.google.com/citations?user=A1";
        let site_url = "https://lab.example.edu";
        let profile = ProfileContent::new(profile_url, "Research profile, no address here.")
            .with_website(site_url);
        let fetcher = MockContentFetcher::new()
            .with_content(profile)
            .with_failure(site_url, MockFailure::Transient);
        let pool = pool_with(fetcher, MockExtractor::new(), 2, Duration::from_secs(5));
        let aggregator = aggregator();

        let report = pool
            .process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(aggregator.snapshot()[0].email, None);
    }

    #[tokio::test]
    async fn non_http_websites_are_never_fetched() {
        let profile_url = "https://scholar.google.com/citations?user=A1";
        let profile = ProfileContent::new(profile_url, "Research profile, no address here.")
            .with_website("ftp://old.example.edu/pub");
        let fetcher = MockContentFetcher::new().with_content(profile);
        let pool = pool_with(fetcher, MockExtractor::new(), 2, Duration::from_secs(5));
        let fetcher_gauge = Arc::clone(&pool.fetcher);
        let aggregator = aggregator();

        pool.process_batch(vec![stub("A1")], &aggregator, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetcher_gauge.calls().len(), 1);
        assert_eq!(aggregator.snapshot()[0].email, None);
    }
}
