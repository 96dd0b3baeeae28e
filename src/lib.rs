//! Spindle: a concurrent crawl engine
//!
//! This crate schedules URL-fetch requests produced by named crawl tasks,
//! deduplicates them, runs them on a fixed pool of workers and forwards the
//! extracted items to a storage sink.

pub mod config;
pub mod crawler;
pub mod limiter;
pub mod output;
pub mod spider;
pub mod state;
pub mod storage;
pub mod tasks;

use thiserror::Error;

/// Main error type for Spindle operations
#[derive(Debug, Error)]
pub enum SpindleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] crawler::SchedulerError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while building a task
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task '{0}' has no root generator")]
    MissingRoot(String),

    #[error("Task '{0}' has no parse rules")]
    NoRules(String),

    #[error("Task '{0}' has a rule with an empty name")]
    EmptyRuleName(String),

    #[error("Task name cannot be empty")]
    EmptyName,
}

/// Result type alias for Spindle operations
pub type Result<T> = std::result::Result<T, SpindleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CoordinatorBuilder, Fetcher, HttpFetcher, Scheduler};
pub use limiter::{GovernorLimiter, MultiLimiter, RateLimiter};
pub use spider::{Context, Item, ParseResult, Request, Rule, RuleTree, Task, TaskBuilder, TempData};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
