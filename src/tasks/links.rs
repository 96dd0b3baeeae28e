//! Built-in link-following task
//!
//! Starts from configured seed URLs, records one item per page and follows
//! every link, optionally staying on the seed's host.

use crate::config::TaskConfig;
use crate::spider::{Context, ParseResult, Request, Rule, Task, TempData};
use crate::tasks::html::parse_html;
use crate::tasks::build_limiter;
use crate::SpindleError;
use anyhow::{anyhow, Context as _};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Name of the only rule of a link task
pub const PAGE_RULE: &str = "page";

/// TempData key holding the seed host
pub const ORIGIN_KEY: &str = "origin";

/// Builds a link-following task from its configuration
pub fn link_task(config: &TaskConfig) -> Result<Task, SpindleError> {
    let seeds = config.seeds.clone();
    let same_host = config.same_host;

    let page = Rule::new(move |ctx| parse_page(ctx, same_host))
        .with_item_fields(["url", "title", "depth"]);

    let mut builder = Task::builder(config.name.as_str())
        .max_depth(config.max_depth)
        .wait_time(Duration::from_secs(config.wait_time))
        .root(move || seed_requests(&seeds))
        .with_rule(PAGE_RULE, page);

    if let Some(cookie) = &config.cookie {
        builder = builder.cookie(cookie.as_str());
    }
    if let Some(limiter) = build_limiter(&config.rate_limits)? {
        builder = builder.limiter(limiter);
    }

    let task = builder.build()?;
    tracing::debug!(
        task = %task.name,
        "Built link task with {} seeds",
        config.seeds.len()
    );
    Ok(task)
}

fn seed_requests(seeds: &[String]) -> anyhow::Result<Vec<Request>> {
    seeds
        .iter()
        .map(|seed| {
            let url = Url::parse(seed).with_context(|| format!("invalid seed URL '{}'", seed))?;
            let host = url
                .host_str()
                .ok_or_else(|| anyhow!("seed URL '{}' has no host", seed))?;

            let mut temp = TempData::new();
            temp.set(ORIGIN_KEY, host);
            Ok(Request::new(url.as_str(), PAGE_RULE).with_temp(temp))
        })
        .collect()
}

fn parse_page(ctx: &Context<'_>, same_host: bool) -> anyhow::Result<ParseResult> {
    let base = Url::parse(&ctx.req.url).with_context(|| format!("bad page URL '{}'", ctx.req.url))?;
    let page = parse_html(&ctx.text(), &base);
    let origin = ctx.temp().get_str(ORIGIN_KEY);

    let item = ctx.output(json!({
        "url": ctx.req.url,
        "title": page.title,
        "depth": ctx.req.depth,
    }));

    let mut seen = HashSet::new();
    let requests = page
        .links
        .into_iter()
        .filter(|link| !same_host || origin.map_or(true, |host| link.host_str() == Some(host)))
        .filter(|link| seen.insert(link.to_string()))
        .map(|link| {
            let mut child = ctx.follow(link.as_str(), PAGE_RULE);
            if let Some(host) = origin {
                child.temp_mut().set(ORIGIN_KEY, host);
            }
            child
        })
        .collect();

    Ok(ParseResult::new(requests, vec![item]))
}
