//! Crawl data model
//!
//! This module contains the types shared between the engine and crawl rules:
//! - Tasks and their rule trees
//! - Requests and their per-request `TempData`
//! - The parse `Context`, `ParseResult` and output `Item`s

mod parse;
mod request;
mod task;
mod temp;

pub use parse::{Context, Item, ParseResult};
pub use request::Request;
pub use task::{
    ParseFn, RootFn, Rule, RuleTree, Task, TaskBuilder, DEFAULT_MAX_DEPTH, DEFAULT_WAIT_TIME,
};
pub use temp::TempData;
