//! Run-wide guarantees checked over whole crawls

use crate::support::{step_over, NonAtomicStore, StaticSite, YieldingStore};
use ripple_crawl::crawler::{LocalScheduler, StepParams};
use ripple_crawl::storage::{KeyValueStore, MemoryStore, SqliteStore};
use ripple_crawl::url::normalize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A site where every page links to every other page
fn complete_graph(pages: usize) -> StaticSite {
    let urls: Vec<String> = (0..pages)
        .map(|i| format!("https://example.com/p{}", i))
        .collect();

    let mut site = StaticSite::new();
    for url in &urls {
        let links: Vec<&str> = urls.iter().map(String::as_str).collect();
        site = site.page(url, &links);
    }
    site
}

#[test]
fn test_normalization_is_idempotent() {
    let inputs = [
        "https://example.com",
        "https://EXAMPLE.com/Docs/",
        "https://example.com/a//b///",
        "http://example.com:8080/x/?q=1#frag",
        "https://example.com/list?b=2&a=1",
        "https://Sub.Example.COM/path/to/page.html#top",
        "https://example.com/%7Euser/",
        "  https://example.com/padded/  ",
        "https://example.com/?",
    ];

    for input in inputs {
        let once = normalize(input).unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice, "normalizing {:?} is not idempotent", input);
    }
}

#[tokio::test]
async fn test_every_page_fetched_once() {
    let site = Arc::new(complete_graph(12));
    let store = Arc::new(MemoryStore::new());
    let step = step_over(store.clone(), site.clone(), "converge");

    let mut root = StepParams::new("https://example.com/p0");
    root.max_depth = 20;
    root.max_pages = 1_000;

    let report = LocalScheduler::new(step, 8).run(root).await.unwrap();

    assert_eq!(report.pages_fetched(), 12);
    assert!(report.failures.is_empty());
    assert_eq!(site.render_counts().len(), 12);
    assert!(site.render_counts().values().all(|count| *count == 1));
    assert_eq!(store.keys_with_prefix("converge_visited_").len(), 12);
}

#[tokio::test]
async fn test_runs_do_not_share_visits() {
    let site = Arc::new(complete_graph(5));
    let store = Arc::new(MemoryStore::new());

    for run in ["first", "second"] {
        let step = step_over(store.clone(), site.clone(), run);
        let report = LocalScheduler::new(step, 4)
            .run(StepParams::new("https://example.com/p0"))
            .await
            .unwrap();
        assert_eq!(report.pages_fetched(), 5);
    }

    assert!(site.render_counts().values().all(|count| *count == 2));
}

#[tokio::test]
async fn test_no_work_item_exceeds_max_depth() {
    // Binary tree of depth 6: /t, /t0, /t1, /t00, ...
    let mut site = StaticSite::new();
    let mut frontier = vec![String::from("t")];
    for _ in 0..6 {
        let mut next = Vec::new();
        for node in &frontier {
            let children = [format!("{}0", node), format!("{}1", node)];
            let links: Vec<String> = children.iter().map(|c| format!("/{}", c)).collect();
            let links: Vec<&str> = links.iter().map(String::as_str).collect();
            site = site.page(&format!("https://example.com/{}", node), &links);
            next.extend(children);
        }
        frontier = next;
    }
    for leaf in &frontier {
        site = site.page(&format!("https://example.com/{}", leaf), &[]);
    }

    let site = Arc::new(site);

    for max_depth in [0, 1, 3] {
        let run = format!("depth-{}", max_depth);
        let step = step_over(Arc::new(MemoryStore::new()), site.clone(), &run);
        let mut root = StepParams::new("https://example.com/t");
        root.max_depth = max_depth;
        root.max_pages = 10_000;

        let mut queue = VecDeque::from([root.clone()]);
        let mut fetched = 0;
        while let Some(params) = queue.pop_front() {
            let outcome = step.run(&params).await.unwrap();
            if !outcome.result.is_skipped() {
                fetched += 1;
                assert!(outcome.result.depth <= max_depth);
            }
            for item in &outcome.work_items {
                assert!(item.depth <= max_depth, "work item {:?} too deep", item);
                queue.push_back(root.child(item));
            }
        }

        // Pages per level double
        let expected_total = (1u32 << (max_depth + 1)) - 1;
        assert_eq!(fetched, expected_total);
    }
}

#[tokio::test]
async fn test_scheduler_report_respects_depth() {
    let site = Arc::new(complete_graph(4));
    let step = step_over(Arc::new(MemoryStore::new()), site, "depth-report");

    let mut root = StepParams::new("https://example.com/p0");
    root.max_depth = 1;

    let report = LocalScheduler::new(step, 4).run(root).await.unwrap();
    assert_eq!(report.max_depth_reached(), Some(1));
    assert_eq!(report.pages_fetched(), 4);
}

async fn crawl_with_budget(
    store: Arc<dyn KeyValueStore>,
    concurrency: usize,
    max_pages: u64,
) -> Arc<StaticSite> {
    let site = Arc::new(complete_graph(30).with_latency(Duration::from_millis(5)));
    let step = step_over(store, site.clone(), "budget");

    let mut root = StepParams::new("https://example.com/p0");
    root.max_depth = 10;
    root.max_pages = max_pages;

    let report = LocalScheduler::new(step, concurrency)
        .run(root)
        .await
        .unwrap();
    assert!(report.failures.is_empty());
    site
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_page_budget_is_exact_with_memory_store() {
    let store = Arc::new(MemoryStore::new());
    let site = crawl_with_budget(store.clone(), 8, 7).await;
    assert_eq!(site.total_renders(), 7);
    assert_eq!(store.keys_with_prefix("budget_visited_").len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_page_budget_is_exact_with_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(&dir.path().join("ledger.db")).unwrap());
    let site = crawl_with_budget(store.clone(), 8, 7).await;
    assert_eq!(site.total_renders(), 7);
    assert_eq!(store.count_prefix("budget_visited_").unwrap(), 7);
}

/// Every ledger call gives other steps a chance to run, so steps that lose
/// the budget race are interleaved with the winners
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_budget_losers_leave_no_visited_marker() {
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(YieldingStore::new(memory.clone()));

    let site = crawl_with_budget(store, 16, 7).await;

    assert_eq!(site.total_renders(), 7);
    assert_eq!(memory.keys_with_prefix("budget_visited_").len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_page_budget_overshoot_bounded_without_atomic_store() {
    let concurrency = 4;
    let max_pages = 5;

    let site = crawl_with_budget(Arc::new(NonAtomicStore::default()), concurrency, max_pages).await;

    assert!(site.peak_in_flight() <= concurrency);
    assert!(site.total_renders() >= max_pages as usize);
    assert!(
        site.total_renders() <= max_pages as usize + concurrency,
        "rendered {} pages with budget {} and concurrency {}",
        site.total_renders(),
        max_pages,
        concurrency
    );
}
