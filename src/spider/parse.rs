use crate::spider::{Request, TempData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// One extracted output cell destined for the storage sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Name of the task that produced the item
    pub task: String,

    /// Destination table, defaults to the task name
    pub table: String,

    /// URL of the page the item was extracted from
    pub url: String,

    /// Opaque payload
    pub data: Value,
}

impl Item {
    /// Redirects the item to another table
    pub fn in_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}

/// Outcome of a parse rule
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Newly discovered requests
    pub requests: Vec<Request>,

    /// Extracted items
    pub items: Vec<Item>,
}

impl ParseResult {
    pub fn new(requests: Vec<Request>, items: Vec<Item>) -> Self {
        Self { requests, items }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.items.is_empty()
    }
}

/// What a parse rule sees: the fetched body and the request that produced it
pub struct Context<'a> {
    pub body: &'a [u8],
    pub req: &'a Request,
}

impl<'a> Context<'a> {
    pub fn new(body: &'a [u8], req: &'a Request) -> Self {
        Self { body, req }
    }

    /// The body decoded as UTF-8, with invalid sequences replaced
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.body)
    }

    pub fn temp(&self) -> &TempData {
        self.req.temp()
    }

    /// Wraps `data` into an item attributed to this request
    pub fn output(&self, data: impl Into<Value>) -> Item {
        let task = self.req.task_name().to_string();
        Item {
            table: task.clone(),
            task,
            url: self.req.url.clone(),
            data: data.into(),
        }
    }

    /// Builds a child request one level deeper, owned by the same task
    pub fn follow(&self, url: impl Into<String>, rule_name: impl Into<String>) -> Request {
        let mut child = Request::new(url, rule_name).with_depth(self.req.depth + 1);
        if let Some(task) = self.req.task() {
            child.stamp(task.clone());
        }
        child
    }
}
