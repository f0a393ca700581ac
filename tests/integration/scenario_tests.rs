//! End-to-end crawl scenarios, driven step by step the way an external
//! scheduler would: every emitted work item becomes the next step's input.

use crate::support::{step_over, RecordingArchiver, StaticSite};
use ripple_crawl::crawler::{CrawlStep, SkipReason, StepOutcome, StepParams};
use ripple_crawl::storage::MemoryStore;
use ripple_crawl::StepState;
use std::collections::VecDeque;
use std::sync::Arc;

const RUN: &str = "scenario";

/// Runs steps in FIFO order until no work is left
async fn drive(step: &CrawlStep, root: StepParams) -> Vec<StepOutcome> {
    let mut queue = VecDeque::from([root.clone()]);
    let mut outcomes = Vec::new();

    while let Some(params) = queue.pop_front() {
        let outcome = step.run(&params).await.unwrap();
        for item in &outcome.work_items {
            queue.push_back(root.child(item));
        }
        outcomes.push(outcome);
    }
    outcomes
}

fn claimed(store: &MemoryStore) -> usize {
    store.keys_with_prefix(&format!("{}_visited_", RUN)).len()
}

fn outcome_for<'a>(outcomes: &'a [StepOutcome], url: &str) -> &'a StepOutcome {
    outcomes
        .iter()
        .find(|o| o.result.url == url && !o.result.is_skipped())
        .unwrap_or_else(|| panic!("no fetched outcome for {}", url))
}

#[tokio::test]
async fn test_simple_chain() {
    let site = StaticSite::new()
        .page("https://example.com/a", &["/b"])
        .page("https://example.com/b", &["/c"])
        .page("https://example.com/c", &[]);
    let store = Arc::new(MemoryStore::new());
    let step = step_over(store.clone(), Arc::new(site), RUN);

    let mut root = StepParams::new("https://example.com/a");
    root.max_depth = 2;
    root.max_pages = 10;

    let outcomes = drive(&step, root).await;

    let a = outcome_for(&outcomes, "https://example.com/a");
    assert_eq!(a.work_items.len(), 1);
    assert_eq!(a.work_items[0].url, "https://example.com/b");
    assert_eq!(a.work_items[0].depth, 1);

    let b = outcome_for(&outcomes, "https://example.com/b");
    assert_eq!(b.work_items.len(), 1);
    assert_eq!(b.work_items[0].url, "https://example.com/c");
    assert_eq!(b.work_items[0].depth, 2);

    let c = outcome_for(&outcomes, "https://example.com/c");
    assert_eq!(c.result.depth, 2);
    assert!(c.work_items.is_empty());

    assert_eq!(outcomes.len(), 3);
    assert_eq!(claimed(&store), 3);
}

#[tokio::test]
async fn test_cycle_terminates() {
    let site = StaticSite::new()
        .page("https://example.com/a", &["/b"])
        .page("https://example.com/b", &["/a"]);
    let store = Arc::new(MemoryStore::new());
    let site = Arc::new(site);
    let step = step_over(store.clone(), site.clone(), RUN);

    let mut root = StepParams::new("https://example.com/a");
    root.max_depth = 5;

    let outcomes = drive(&step, root).await;

    let b = outcome_for(&outcomes, "https://example.com/b");
    assert_eq!(b.result.links_found, 1);
    assert_eq!(b.result.links_queued, 0);
    assert!(b.work_items.is_empty());

    assert_eq!(outcomes.len(), 2);
    assert_eq!(claimed(&store), 2);
    assert_eq!(site.total_renders(), 2);
}

#[tokio::test]
async fn test_budget_cutoff() {
    let pages = ["p1", "p2", "p3", "p4", "p5"];
    let mut site = StaticSite::new();
    for page in pages {
        let links: Vec<String> = pages
            .iter()
            .filter(|other| **other != page)
            .map(|other| format!("/{}", other))
            .collect();
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        site = site.page(&format!("https://example.com/{}", page), &links);
    }

    let store = Arc::new(MemoryStore::new());
    let site = Arc::new(site);
    let step = step_over(store.clone(), site.clone(), RUN);

    let mut root = StepParams::new("https://example.com/p1");
    root.max_pages = 3;

    let outcomes = drive(&step, root).await;

    let fetched: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.state == StepState::Done)
        .map(|o| o.result.url.as_str())
        .collect();
    assert_eq!(
        fetched,
        vec![
            "https://example.com/p1",
            "https://example.com/p2",
            "https://example.com/p3"
        ]
    );

    for late in ["https://example.com/p4", "https://example.com/p5"] {
        let first_attempt = outcomes
            .iter()
            .find(|o| o.result.url == late)
            .unwrap();
        assert!(first_attempt.result.is_skipped());
        assert_eq!(first_attempt.result.reason, Some(SkipReason::MaxPagesReached));
        assert_eq!(first_attempt.state, StepState::SkippedBudget);
    }

    assert_eq!(claimed(&store), 3);
    assert_eq!(site.total_renders(), 3);
    assert_eq!(step.ledger().page_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_file_link_is_archived_not_queued() {
    let site = StaticSite::new().page(
        "https://example.com/",
        &["/docs/manual.pdf", "/about"],
    );
    let site = site.page("https://example.com/about", &[]);
    let archiver = Arc::new(RecordingArchiver::default());
    let step = step_over(Arc::new(MemoryStore::new()), Arc::new(site), RUN)
        .with_archiver(archiver.clone());

    let mut params = StepParams::new("https://example.com/");
    params.include_attachments = true;

    let outcome = step.run(&params).await.unwrap();

    assert_eq!(outcome.result.links_found, 2);
    assert_eq!(outcome.work_items.len(), 1);
    assert_eq!(outcome.work_items[0].url, "https://example.com/about");
    assert_eq!(outcome.result.attachments.len(), 1);
    assert_eq!(
        outcome.result.attachments[0].source_url,
        "https://example.com/docs/manual.pdf"
    );
    assert_eq!(
        *archiver.archived.lock().unwrap(),
        vec!["https://example.com/docs/manual.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_file_link_without_attachments_is_dropped() {
    let site = StaticSite::new().page("https://example.com/", &["/docs/manual.pdf"]);
    let archiver = Arc::new(RecordingArchiver::default());
    let step = step_over(Arc::new(MemoryStore::new()), Arc::new(site), RUN)
        .with_archiver(archiver.clone());

    let outcome = step.run(&StepParams::new("https://example.com/")).await.unwrap();

    assert!(outcome.work_items.is_empty());
    assert!(outcome.result.attachments.is_empty());
    assert!(archiver.archived.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_external_links_filtered() {
    let site = StaticSite::new().page(
        "https://example.com/",
        &["https://other.com/page", "/local"],
    );
    let step = step_over(Arc::new(MemoryStore::new()), Arc::new(site), RUN);

    let outcome = step.run(&StepParams::new("https://example.com/")).await.unwrap();

    assert_eq!(outcome.result.links_found, 1);
    assert_eq!(outcome.work_items.len(), 1);
    assert_eq!(outcome.work_items[0].url, "https://example.com/local");
}

#[tokio::test]
async fn test_external_links_followed_when_enabled() {
    let site = StaticSite::new().page(
        "https://example.com/",
        &["https://other.com/page", "/local"],
    );
    let step = step_over(Arc::new(MemoryStore::new()), Arc::new(site), RUN);

    let mut params = StepParams::new("https://example.com/");
    params.include_external = true;
    let outcome = step.run(&params).await.unwrap();

    assert_eq!(outcome.result.links_found, 2);
    assert!(outcome.work_items.iter().all(|item| item.include_external));
    assert!(outcome
        .work_items
        .iter()
        .any(|item| item.url == "https://other.com/page"));
}

#[tokio::test]
async fn test_retry_of_failed_step_is_skipped() {
    let site = StaticSite::new().page("https://example.com/", &["/gone"]);
    let step = step_over(Arc::new(MemoryStore::new()), Arc::new(site), RUN);

    let root = StepParams::new("https://example.com/");
    let outcome = step.run(&root).await.unwrap();
    let child = root.child(&outcome.work_items[0]);

    assert!(step.run(&child).await.is_err());

    let retry = step.run(&child).await.unwrap();
    assert_eq!(retry.result.reason, Some(SkipReason::AlreadyVisited));
}
