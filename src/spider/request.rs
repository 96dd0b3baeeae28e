use crate::spider::{Task, TempData};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// One schedulable fetch-and-parse unit
///
/// A request is created by a task's root generator or by a parse rule, pushed
/// into the scheduler and consumed by exactly one worker.
#[derive(Clone)]
pub struct Request {
    /// Target URL
    pub url: String,

    /// HTTP method, upper case
    pub method: String,

    /// Name of the rule to run on the fetched body
    pub rule_name: String,

    /// Distance from the task's root requests
    pub depth: u32,

    task: Option<Arc<Task>>,
    temp: TempData,
}

impl Request {
    /// Creates a GET request at depth 0 with no owning task yet
    pub fn new(url: impl Into<String>, rule_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            rule_name: rule_name.into(),
            depth: 0,
            task: None,
            temp: TempData::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_temp(mut self, temp: TempData) -> Self {
        self.temp = temp;
        self
    }

    /// Stable identity used for deduplication
    ///
    /// Hex SHA-256 of the method and URL. Depth and rule are not part of the
    /// identity, so the same URL reached through another rule is the same
    /// request.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The task this request belongs to, once stamped
    pub fn task(&self) -> Option<&Arc<Task>> {
        self.task.as_ref()
    }

    /// Name of the owning task, or an empty string if unstamped
    pub fn task_name(&self) -> &str {
        self.task.as_ref().map_or("", |task| task.name.as_str())
    }

    /// Attaches the owning task
    pub fn stamp(&mut self, task: Arc<Task>) {
        self.task = Some(task);
    }

    pub fn temp(&self) -> &TempData {
        &self.temp
    }

    pub fn temp_mut(&mut self) -> &mut TempData {
        &mut self.temp
    }

    /// Adopts a request discovered while parsing `parent`
    ///
    /// An unstamped child inherits the parent's task, and a child is always at
    /// least one level deeper than its parent.
    pub(crate) fn adopt(&mut self, parent: &Request) {
        if self.task.is_none() {
            self.task = parent.task.clone();
        }
        if self.depth <= parent.depth {
            self.depth = parent.depth + 1;
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("rule_name", &self.rule_name)
            .field("depth", &self.depth)
            .field("task", &self.task_name())
            .field("temp", &self.temp)
            .finish()
    }
}
