//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Budget for one rolling rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests allowed inside a window
    pub max_requests: usize,
    /// Window length
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per `secs` seconds.
    pub fn per_seconds(max_requests: usize, secs: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(secs))
    }
}

/// Configuration for a harvest run.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::HarvestConfig;
///
/// let config = HarvestConfig::new()
///     .with_max_pages(3)
///     .with_workers(8)
///     .with_output_dir("out");
/// ```
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Maximum listing pages to visit
    pub max_pages: usize,
    /// Concurrent detail fetch workers
    pub workers: usize,
    /// Per-stub processing deadline
    pub task_timeout: Duration,
    /// How long in-flight tasks get to finish after cancellation
    pub shutdown_grace: Duration,
    /// Character budget for structured-extraction input
    pub truncate_chars: usize,
    /// Budget for the listing/detail source
    pub source_limit: RateLimit,
    /// Budget for the structured-extraction service
    pub extractor_limit: RateLimit,
    /// Directory receiving one checkpoint folder per query
    pub output_dir: PathBuf,
    /// Checkpoint file stem; files are `{stem}_v{N}.csv`
    pub file_stem: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            workers: 5,
            task_timeout: Duration::from_secs(45),
            shutdown_grace: Duration::from_secs(5),
            truncate_chars: 3333,
            source_limit: RateLimit::per_seconds(10, 60),
            extractor_limit: RateLimit::per_seconds(10, 60),
            output_dir: PathBuf::from("."),
            file_stem: "researchers".to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from environment variables, falling back to defaults.
    ///
    /// Recognized: `HARVEST_MAX_PAGES`, `HARVEST_WORKERS`,
    /// `HARVEST_TASK_TIMEOUT_SECS`, `HARVEST_SHUTDOWN_GRACE_SECS`,
    /// `HARVEST_TRUNCATE_CHARS`, `HARVEST_OUTPUT_DIR`,
    /// `HARVEST_SOURCE_MAX_REQUESTS`, `HARVEST_SOURCE_WINDOW_SECS`,
    /// `HARVEST_EXTRACTOR_MAX_REQUESTS`, `HARVEST_EXTRACTOR_WINDOW_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(pages) = env_parse("HARVEST_MAX_PAGES") {
            config.max_pages = pages;
        }
        if let Some(workers) = env_parse("HARVEST_WORKERS") {
            config.workers = workers;
        }
        if let Some(secs) = env_parse("HARVEST_TASK_TIMEOUT_SECS") {
            config.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("HARVEST_SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace = Duration::from_secs(secs);
        }
        if let Some(chars) = env_parse("HARVEST_TRUNCATE_CHARS") {
            config.truncate_chars = chars;
        }
        if let Some(dir) = std::env::var_os("HARVEST_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(max) = env_parse("HARVEST_SOURCE_MAX_REQUESTS") {
            config.source_limit.max_requests = max;
        }
        if let Some(secs) = env_parse("HARVEST_SOURCE_WINDOW_SECS") {
            config.source_limit.window = Duration::from_secs(secs);
        }
        if let Some(max) = env_parse("HARVEST_EXTRACTOR_MAX_REQUESTS") {
            config.extractor_limit.max_requests = max;
        }
        if let Some(secs) = env_parse("HARVEST_EXTRACTOR_WINDOW_SECS") {
            config.extractor_limit.window = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_truncate_chars(mut self, chars: usize) -> Self {
        self.truncate_chars = chars;
        self
    }

    pub fn with_source_limit(mut self, limit: RateLimit) -> Self {
        self.source_limit = limit;
        self
    }

    pub fn with_extractor_limit(mut self, limit: RateLimit) -> Self {
        self.extractor_limit = limit;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
