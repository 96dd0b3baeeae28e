//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the engine, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Sending the request's method and its task's cookie
//! - Error classification for transport and status failures

use crate::config::FetcherConfig;
use crate::spider::Request;
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching a request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid HTTP method '{method}' for {url}")]
    InvalidMethod { url: String, method: String },

    #[error("{0}")]
    Other(String),
}

/// Retrieves the body of a request
///
/// Implementations must be shareable across workers. Any error, and any body
/// shorter than the engine's minimum length, counts as a failed fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, req: &Request) -> Result<Vec<u8>, FetchError>;
}

/// Default fetcher backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher from configuration
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use spindle::config::FetcherConfig;
/// use spindle::crawler::build_http_client;
///
/// let config = FetcherConfig {
///     timeout_secs: 5,
///     user_agent: "spindle/0.1".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, req: &Request) -> Result<Vec<u8>, FetchError> {
        let method =
            Method::from_bytes(req.method.as_bytes()).map_err(|_| FetchError::InvalidMethod {
                url: req.url.clone(),
                method: req.method.clone(),
            })?;

        let mut builder = self.client.request(method, req.url.as_str());
        if let Some(cookie) = req.task().and_then(|task| task.cookie.as_deref()) {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&req.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: req.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(&req.url, e))?;

        tracing::trace!("Fetched {} bytes from {}", body.len(), req.url);
        Ok(body.to_vec())
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
