use crate::config::types::{
    Config, EngineConfig, FetcherConfig, RateLimitEntry, StorageConfig, TaskConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest accepted worker pool
pub const MAX_WORKER_COUNT: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    validate_tasks(&config.tasks)?;
    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > MAX_WORKER_COUNT {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and {}, got {}",
            MAX_WORKER_COUNT, config.worker_count
        )));
    }

    if config.result_buffer < 1 {
        return Err(ConfigError::Validation(
            "result_buffer must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.batch_count < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_count must be >= 1, got {}",
            config.batch_count
        )));
    }

    Ok(())
}

/// Validates task entries
fn validate_tasks(tasks: &[TaskConfig]) -> Result<(), ConfigError> {
    if tasks.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[task]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for task in tasks {
        if task.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Task name cannot be empty".to_string(),
            ));
        }

        if !names.insert(task.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate task name '{}'",
                task.name
            )));
        }

        if task.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Task '{}' must have at least one seed URL",
                task.name
            )));
        }

        for seed in &task.seeds {
            validate_seed_url(seed)?;
        }

        for limit in &task.rate_limits {
            validate_rate_limit(&task.name, limit)?;
        }
    }

    Ok(())
}

/// Validates a seed URL
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

fn validate_rate_limit(task: &str, limit: &RateLimitEntry) -> Result<(), ConfigError> {
    if limit.events < 1 || limit.per_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "Task '{}' has an invalid rate limit of {} per {}s: both values must be >= 1",
            task, limit.events, limit.per_secs
        )));
    }
    Ok(())
}
