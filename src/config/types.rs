use serde::Deserialize;

/// Main configuration structure for Spindle
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

/// Worker pool and result pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Number of concurrent workers
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,

    /// Bodies shorter than this many bytes count as failed fetches (0 disables)
    #[serde(rename = "min-body-length", default = "default_min_body_length")]
    pub min_body_length: usize,

    /// Capacity of the channel between workers and the storage sink
    #[serde(rename = "result-buffer", default = "default_result_buffer")]
    pub result_buffer: usize,

    /// How long a stopping crawl waits for in-flight work (seconds)
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            min_body_length: default_min_body_length(),
            result_buffer: default_result_buffer(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Item database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Items buffered before each write
    #[serde(rename = "batch-count", default = "default_batch_count")]
    pub batch_count: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            batch_count: default_batch_count(),
        }
    }
}

/// One link-following crawl task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Unique task name, also the item table name
    pub name: String,

    /// URLs to start crawling from
    pub seeds: Vec<String>,

    /// Maximum link depth from the seeds
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Upper bound of the random delay before each fetch (seconds)
    #[serde(rename = "wait-time", default = "default_wait_time")]
    pub wait_time: u64,

    /// Cookie header sent with every request of this task
    #[serde(default)]
    pub cookie: Option<String>,

    /// Only follow links on the seed's host
    #[serde(rename = "same-host", default = "default_same_host")]
    pub same_host: bool,

    /// Rate limits, all of which must allow a request before it is fetched
    #[serde(rename = "rate-limit", default)]
    pub rate_limits: Vec<RateLimitEntry>,
}

/// A rate of `events` requests per `per_secs` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitEntry {
    pub events: u32,

    #[serde(rename = "per-secs")]
    pub per_secs: u64,
}

fn default_worker_count() -> usize {
    16
}

fn default_min_body_length() -> usize {
    6000
}

fn default_result_buffer() -> usize {
    64
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("spindle/{}", env!("CARGO_PKG_VERSION"))
}

fn default_database_path() -> String {
    "./spindle.db".to_string()
}

fn default_batch_count() -> usize {
    crate::storage::DEFAULT_BATCH_COUNT
}

fn default_max_depth() -> u32 {
    crate::spider::DEFAULT_MAX_DEPTH
}

fn default_wait_time() -> u64 {
    crate::spider::DEFAULT_WAIT_TIME.as_secs()
}

fn default_same_host() -> bool {
    true
}
