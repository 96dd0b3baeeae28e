//! Crawl tasks and their rule trees
//!
//! A task is a named crawl unit: limits, an optional cookie, an optional rate
//! limiter and fetcher override, and a rule tree made of a root generator plus
//! named parse rules. Tasks are immutable once built and shared by every
//! request they spawn.

use crate::crawler::Fetcher;
use crate::limiter::RateLimiter;
use crate::spider::{Context, Item, ParseResult, Request};
use crate::TaskError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default depth limit for a task
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Default upper bound of the per-request jitter
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(5);

/// Produces a task's initial requests
pub type RootFn = Arc<dyn Fn() -> anyhow::Result<Vec<Request>> + Send + Sync>;

/// Turns a fetched body into discovered requests and items
pub type ParseFn = Arc<dyn Fn(&Context<'_>) -> anyhow::Result<ParseResult> + Send + Sync>;

/// A named parse rule
#[derive(Clone)]
pub struct Rule {
    /// Field names of the items this rule emits
    pub item_fields: Vec<String>,

    pub parse: ParseFn,
}

impl Rule {
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&Context<'_>) -> anyhow::Result<ParseResult> + Send + Sync + 'static,
    {
        Self {
            item_fields: Vec::new(),
            parse: Arc::new(parse),
        }
    }

    pub fn with_item_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declared fields absent from an item's payload
    ///
    /// A payload that is not a JSON object lacks every declared field.
    pub fn missing_fields<'a>(&'a self, item: &Item) -> Vec<&'a str> {
        let object = item.data.as_object();
        self.item_fields
            .iter()
            .filter(|field| !object.is_some_and(|data| data.contains_key(field.as_str())))
            .map(String::as_str)
            .collect()
    }
}

/// Root generator plus the rules it and its descendants dispatch to
#[derive(Clone)]
pub struct RuleTree {
    pub root: RootFn,
    pub trunk: HashMap<String, Rule>,
}

impl RuleTree {
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.trunk.get(name)
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.trunk.contains_key(name)
    }
}

/// A named crawl unit
pub struct Task {
    pub name: String,
    pub max_depth: u32,

    /// Upper bound of the random delay before each fetch
    pub wait_time: Duration,

    pub cookie: Option<String>,

    limiter: Option<Arc<dyn RateLimiter>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    rules: RuleTree,
}

impl Task {
    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(name)
    }

    pub fn rules(&self) -> &RuleTree {
        &self.rules
    }

    pub fn limiter(&self) -> Option<&Arc<dyn RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Fetcher override for this task, if one was configured
    pub fn fetcher(&self) -> Option<&Arc<dyn Fetcher>> {
        self.fetcher.as_ref()
    }

    /// Runs the root generator
    pub fn root_requests(&self) -> anyhow::Result<Vec<Request>> {
        (self.rules.root)()
    }

    /// Sorted rule names, for logging
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.trunk.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("max_depth", &self.max_depth)
            .field("wait_time", &self.wait_time)
            .field("cookie", &self.cookie.is_some())
            .field("limiter", &self.limiter.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("rules", &self.rule_names())
            .finish()
    }
}

/// Builder for [`Task`]
pub struct TaskBuilder {
    name: String,
    max_depth: u32,
    wait_time: Duration,
    cookie: Option<String>,
    limiter: Option<Arc<dyn RateLimiter>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    root: Option<RootFn>,
    trunk: HashMap<String, Rule>,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            wait_time: DEFAULT_WAIT_TIME,
            cookie: None,
            limiter: None,
            fetcher: None,
            root: None,
            trunk: HashMap::new(),
        }
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        self.cookie = (!cookie.is_empty()).then_some(cookie);
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn root<F>(mut self, root: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<Request>> + Send + Sync + 'static,
    {
        self.root = Some(Arc::new(root));
        self
    }

    pub fn rule<F>(self, name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&Context<'_>) -> anyhow::Result<ParseResult> + Send + Sync + 'static,
    {
        self.with_rule(name, Rule::new(parse))
    }

    pub fn with_rule(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.trunk.insert(name.into(), rule);
        self
    }

    pub fn build(self) -> Result<Task, TaskError> {
        if self.name.is_empty() {
            return Err(TaskError::EmptyName);
        }
        let root = self.root.ok_or_else(|| TaskError::MissingRoot(self.name.clone()))?;
        if self.trunk.is_empty() {
            return Err(TaskError::NoRules(self.name));
        }
        if self.trunk.contains_key("") {
            return Err(TaskError::EmptyRuleName(self.name));
        }

        Ok(Task {
            name: self.name,
            max_depth: self.max_depth,
            wait_time: self.wait_time,
            cookie: self.cookie,
            limiter: self.limiter,
            fetcher: self.fetcher,
            rules: RuleTree {
                root,
                trunk: self.trunk,
            },
        })
    }
}
