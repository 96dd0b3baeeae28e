//! Integration tests for the crawl engine
//!
//! These tests drive the full engine against an in-process scripted site, so
//! fetch counts can be asserted per URL without any network.

use async_trait::async_trait;
use serde_json::json;
use spindle::crawler::{Coordinator, FetchError, Fetcher};
use spindle::output::CrawlStatistics;
use spindle::spider::{Context, Item, ParseResult, Request, Task};
use spindle::storage::{MemoryStorage, SqliteStorage, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// Serves fixed bodies and counts how often each URL is fetched
///
/// A body lists child URLs, one per line. Unknown URLs answer 404.
struct Site {
    pages: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
}

impl Site {
    fn new(pages: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            hits: Mutex::new(HashMap::new()),
        })
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for Site {
    async fn get(&self, req: &Request) -> Result<Vec<u8>, FetchError> {
        *self.hits.lock().unwrap().entry(req.url.clone()).or_default() += 1;

        match self.pages.get(&req.url) {
            Some(body) => Ok(body.clone().into_bytes()),
            None => Err(FetchError::Status {
                url: req.url.clone(),
                status: 404,
            }),
        }
    }
}

fn follow_lines(ctx: &Context<'_>) -> anyhow::Result<ParseResult> {
    let requests = ctx
        .text()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ctx.follow(line, "page"))
        .collect();

    Ok(ParseResult::new(
        requests,
        vec![ctx.output(json!({ "url": ctx.req.url }))],
    ))
}

fn site_task(name: &str, roots: &'static [&'static str], max_depth: u32) -> Task {
    Task::builder(name)
        .max_depth(max_depth)
        .wait_time(Duration::ZERO)
        .root(move || Ok(roots.iter().map(|url| Request::new(*url, "page")).collect()))
        .rule("page", follow_lines)
        .build()
        .unwrap()
}

fn engine(site: &Arc<Site>, tasks: Vec<Task>, workers: usize) -> Coordinator {
    Coordinator::builder()
        .fetcher(Arc::clone(site) as Arc<dyn Fetcher>)
        .worker_count(workers)
        .min_body_len(0)
        .seeds(tasks)
        .build()
        .unwrap()
}

async fn crawl(engine: &mut Coordinator) -> CrawlStatistics {
    timeout(Duration::from_secs(10), engine.run_to_completion())
        .await
        .expect("crawl did not drain")
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_root_with_three_children() {
    let site = Site::new(&[
        ("https://site.test/a", "https://site.test/b\nhttps://site.test/c\nhttps://site.test/d"),
        ("https://site.test/b", ""),
        ("https://site.test/c", ""),
        ("https://site.test/d", ""),
    ]);
    let mut engine = engine(&site, vec![site_task("tree", &["https://site.test/a"], 5)], 4);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.total_hits(), 4);
    for url in ["a", "b", "c", "d"] {
        assert_eq!(site.hits(&format!("https://site.test/{}", url)), 1);
    }
    assert_eq!(engine.visited_count(), 4);
    assert_eq!(stats.fetched, 4);
    assert_eq!(stats.discovered, 3);
    assert_eq!(stats.items, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_child_fetched_once() {
    let site = Site::new(&[
        ("https://site.test/p1", "https://site.test/x"),
        ("https://site.test/p2", "https://site.test/x"),
        ("https://site.test/x", ""),
    ]);
    let task = site_task("shared", &["https://site.test/p1", "https://site.test/p2"], 5);
    let mut engine = engine(&site, vec![task], 4);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/x"), 1);
    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_url_fetched_exactly_twice() {
    let site = Site::new(&[("https://site.test/a", "https://site.test/missing")]);
    let mut engine = engine(&site, vec![site_task("flaky", &["https://site.test/a"], 5)], 2);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/missing"), 2);
    assert_eq!(stats.fetch_failures, 2);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(engine.failed_urls(), vec!["https://site.test/missing".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_depth_limit_never_fetches() {
    let site = Site::new(&[
        ("https://site.test/a", "https://site.test/b"),
        ("https://site.test/b", "https://site.test/c"),
        ("https://site.test/c", ""),
    ]);
    let mut engine = engine(&site, vec![site_task("shallow", &["https://site.test/a"], 1)], 2);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/c"), 0);
    assert_eq!(stats.depth_exceeded, 1);
    assert_eq!(engine.visited_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_root_skips_only_its_task() {
    let site = Site::new(&[("https://site.test/a", "")]);
    let broken = Task::builder("broken")
        .root(|| Err(anyhow::anyhow!("no seeds today")))
        .rule("page", follow_lines)
        .build()
        .unwrap();
    let tasks = vec![broken, site_task("healthy", &["https://site.test/a"], 5)];
    let mut engine = engine(&site, tasks, 2);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/a"), 1);
    assert_eq!(stats.fetched, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parse_error_is_not_retried() {
    let site = Site::new(&[("https://site.test/a", "")]);
    let task = Task::builder("picky")
        .wait_time(Duration::ZERO)
        .root(|| Ok(vec![Request::new("https://site.test/a", "page")]))
        .rule("page", |_| Err(anyhow::anyhow!("unexpected markup")))
        .build()
        .unwrap();
    let mut engine = engine(&site, vec![task], 2);

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/a"), 1);
    assert_eq!(stats.parse_failures, 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_short_body_counts_as_failure() {
    let site = Site::new(&[
        ("https://site.test/tiny", "tiny"),
        ("https://site.test/full", "a body comfortably long enough"),
    ]);
    let task = Task::builder("bodies")
        .wait_time(Duration::ZERO)
        .root(|| {
            Ok(vec![
                Request::new("https://site.test/tiny", "page"),
                Request::new("https://site.test/full", "page"),
            ])
        })
        .rule("page", |ctx| {
            Ok(ParseResult::new(Vec::new(), vec![ctx.output(json!({}))]))
        })
        .build()
        .unwrap();

    let mut engine = Coordinator::builder()
        .fetcher(Arc::clone(&site) as Arc<dyn Fetcher>)
        .worker_count(2)
        .min_body_len(10)
        .seed(task)
        .build()
        .unwrap();

    let stats = crawl(&mut engine).await;

    assert_eq!(site.hits("https://site.test/tiny"), 2);
    assert_eq!(site.hits("https://site.test/full"), 1);
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.items, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_rule_stops_only_one_worker() {
    let site = Site::new(&[
        (
            "https://site.test/a",
            "https://site.test/boom\nhttps://site.test/b\nhttps://site.test/c",
        ),
        ("https://site.test/boom", ""),
        ("https://site.test/b", ""),
        ("https://site.test/c", ""),
    ]);
    let task = Task::builder("fragile")
        .wait_time(Duration::ZERO)
        .root(|| Ok(vec![Request::new("https://site.test/a", "page")]))
        .rule("page", |ctx| {
            if ctx.req.url.ends_with("/boom") {
                panic!("rule exploded");
            }
            follow_lines(ctx)
        })
        .build()
        .unwrap();
    let mut engine = engine(&site, vec![task], 2);

    let stats = crawl(&mut engine).await;

    assert_eq!(stats.worker_faults, 1);
    assert_eq!(site.hits("https://site.test/b"), 1);
    assert_eq!(site.hits("https://site.test/c"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dense_mesh_fetches_each_page_once() {
    let urls: Vec<String> = (0..30).map(|n| format!("https://mesh.test/{}", n)).collect();
    let body = urls.join("\n");
    let pages: Vec<(&str, &str)> = urls.iter().map(|url| (url.as_str(), body.as_str())).collect();
    let site = Site::new(&pages);

    let mut engine = engine(&site, vec![site_task("mesh", &["https://mesh.test/0"], 10)], 8);
    let stats = crawl(&mut engine).await;

    for url in &urls {
        assert_eq!(site.hits(url), 1, "{} fetched more than once", url);
    }
    assert_eq!(engine.visited_count(), 30);
    assert_eq!(stats.fetched, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_items_persist_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("items.db");

    let site = Site::new(&[
        ("https://site.test/a", "https://site.test/b\nhttps://site.test/c"),
        ("https://site.test/b", ""),
        ("https://site.test/c", ""),
    ]);
    let mut engine = Coordinator::builder()
        .fetcher(Arc::clone(&site) as Arc<dyn Fetcher>)
        .worker_count(2)
        .min_body_len(0)
        .storage(SqliteStorage::new(&db_path, 2).unwrap())
        .seed(site_task("saved", &["https://site.test/a"], 5))
        .build()
        .unwrap();

    let stats = crawl(&mut engine).await;
    assert_eq!(stats.items, 3);

    let storage = SqliteStorage::new(&db_path, 2).unwrap();
    assert_eq!(storage.count_by_table().unwrap(), vec![("saved".to_string(), 3)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_stops_unbounded_crawl() {
    // Every page links to a fresh child, so this crawl never drains
    struct Endless;

    #[async_trait]
    impl Fetcher for Endless {
        async fn get(&self, _req: &Request) -> Result<Vec<u8>, FetchError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Vec::new())
        }
    }

    let task = Task::builder("endless")
        .max_depth(u32::MAX)
        .wait_time(Duration::ZERO)
        .root(|| Ok(vec![Request::new("https://endless.test/0", "page")]))
        .rule("page", |ctx| {
            let next = format!("https://endless.test/{}", ctx.req.depth + 1);
            Ok(ParseResult::new(vec![ctx.follow(next, "page")], Vec::new()))
        })
        .build()
        .unwrap();

    let storage = MemoryStorage::new();
    let mut engine = Coordinator::builder()
        .fetcher(Arc::new(Endless))
        .worker_count(4)
        .min_body_len(0)
        .storage(storage.clone())
        .seed(task)
        .build()
        .unwrap();

    engine.run().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.shutdown();

    timeout(Duration::from_secs(5), engine.join())
        .await
        .expect("workers did not stop after shutdown");

    assert!(engine.stats().fetched > 0);
    assert_eq!(storage.flush_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_ends_when_last_worker_dies() {
    let site = Site::new(&[("https://site.test/boom", ""), ("https://site.test/ok", "")]);
    let task = Task::builder("doomed")
        .wait_time(Duration::ZERO)
        .root(|| {
            Ok(vec![
                Request::new("https://site.test/boom", "page"),
                Request::new("https://site.test/ok", "page"),
            ])
        })
        .rule("page", |ctx| {
            if ctx.req.url.ends_with("/boom") {
                panic!("rule exploded");
            }
            follow_lines(ctx)
        })
        .build()
        .unwrap();
    let mut engine = engine(&site, vec![task], 1);

    let stats = timeout(Duration::from_secs(3), engine.run_to_completion())
        .await
        .expect("run did not end after its only worker died")
        .unwrap();

    assert_eq!(stats.worker_faults, 1);
    assert_eq!(site.hits("https://site.test/boom"), 1);
    assert_eq!(site.hits("https://site.test/ok"), 0);
}

/// Sink whose every write fails
struct BrokenDisk;

impl Storage for BrokenDisk {
    fn save(&mut self, _items: Vec<Item>) -> StorageResult<()> {
        Err(StorageError::Database("disk full".to_string()))
    }

    fn flush(&mut self) -> StorageResult<()> {
        Err(StorageError::Database("disk full".to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_sink_does_not_stop_crawl() {
    let site = Site::new(&[
        ("https://site.test/a", "https://site.test/b\nhttps://site.test/c"),
        ("https://site.test/b", ""),
        ("https://site.test/c", ""),
    ]);
    let mut engine = Coordinator::builder()
        .fetcher(Arc::clone(&site) as Arc<dyn Fetcher>)
        .worker_count(2)
        .min_body_len(0)
        .storage(BrokenDisk)
        .seed(site_task("lost", &["https://site.test/a"], 5))
        .build()
        .unwrap();

    let stats = crawl(&mut engine).await;

    assert_eq!(site.total_hits(), 3);
    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.items, 3);
    assert_eq!(stats.items_dropped, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_sqlite_batch_counts_buffered_items() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("items.db");

    let site = Site::new(&[
        ("https://site.test/a", "https://site.test/b\nhttps://site.test/c"),
        ("https://site.test/b", ""),
        ("https://site.test/c", ""),
    ]);
    // The table is gone before the only write, a final flush of all three
    let storage = SqliteStorage::new(&db_path, 10).unwrap();
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("DROP TABLE items")
        .unwrap();

    let mut engine = Coordinator::builder()
        .fetcher(Arc::clone(&site) as Arc<dyn Fetcher>)
        .worker_count(2)
        .min_body_len(0)
        .storage(storage)
        .seed(site_task("lost", &["https://site.test/a"], 5))
        .build()
        .unwrap();

    let stats = crawl(&mut engine).await;

    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.items, 3);
    assert_eq!(stats.items_dropped, 3);
}
