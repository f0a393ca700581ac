//! Crawls against a mock HTTP server with the real renderer, store and archiver

use ripple_crawl::archive::LocalArchiver;
use ripple_crawl::config::UserAgentConfig;
use ripple_crawl::crawler::{
    build_http_client, CrawlStep, HtmlContentExtractor, HttpRenderer, LocalScheduler, SkipReason,
    StepOutcome, StepParams,
};
use ripple_crawl::ledger::{RunId, VisitedLedger};
use ripple_crawl::storage::SqliteStore;
use ripple_crawl::RippleError;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_page(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    let body = format!(
        "<html><head><title>Test</title></head><body><p>Hello</p>{}</body></html>",
        anchors
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(links))
        .expect(1)
        .mount(server)
        .await;
}

fn http_step(db_path: &Path, run: &str) -> CrawlStep {
    let store = SqliteStore::new(db_path).unwrap();
    let ledger = VisitedLedger::new(Arc::new(store), RunId::new(run));
    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    CrawlStep::new(
        ledger,
        Arc::new(HttpRenderer::new(client)),
        Arc::new(HtmlContentExtractor::new()),
    )
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        &["/page1", "/page2/", "/files/report.pdf", "https://other.example/x"],
    )
    .await;
    mount_page(&server, "/page1", &["/", "/page2", "/missing"]).await;
    mount_page(&server, "/page2", &["/page1/"]).await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4 test".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive_dir = dir.path().join("archive");
    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let step = http_step(&dir.path().join("ledger.db"), "http-run")
        .with_archiver(Arc::new(LocalArchiver::new(client, &archive_dir)));

    let mut root = StepParams::new(&base);
    root.include_attachments = true;

    let report = LocalScheduler::new(step, 4).run(root).await.unwrap();

    assert_eq!(
        report.fetched_urls(),
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]
    );

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, format!("{}/missing", base));
    assert_eq!(report.failures[0].depth, 2);
    assert!(report.failures[0].error.contains("404"));

    assert_eq!(report.attachment_count(), 1);
    let home = report
        .fetched()
        .find(|r| r.url == format!("{}/", base))
        .unwrap();
    assert_eq!(home.content["title"], "Test");
    assert!(home.content["markdown"].as_str().unwrap().contains("Hello"));

    let archived = &home.attachments[0];
    assert_eq!(archived.source_url, format!("{}/files/report.pdf", base));
    assert!(Path::new(&archived.location).starts_with(&archive_dir));
    assert_eq!(std::fs::read(&archived.location).unwrap(), b"%PDF-1.4 test");
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let server = MockServer::start().await;
    let user_agent = UserAgentConfig::default().user_agent_string();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", user_agent.as_str()))
        .respond_with(html_page(&[]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let step = http_step(&dir.path().join("ledger.db"), "ua");

    let outcome = step.run(&StepParams::new(server.uri())).await.unwrap();
    assert!(outcome.result.success);
}

#[tokio::test]
async fn test_non_html_response_is_navigation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let step = http_step(&dir.path().join("ledger.db"), "json");

    let params = StepParams::new(format!("{}/data", server.uri()));
    let err = step.run(&params).await.unwrap_err();
    assert!(matches!(err, RippleError::Navigation { .. }));

    // The failed URL stays claimed, so a redelivery does not refetch it
    let retry = step.run(&params).await.unwrap();
    assert_eq!(retry.result.reason, Some(SkipReason::AlreadyVisited));
}

/// Two workers with their own store handles on one database, fed by a
/// queue that delivers every work item twice
#[tokio::test]
async fn test_workers_share_ledger_through_database() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &["/a", "/b"]).await;
    mount_page(&server, "/a", &["/b", "/"]).await;
    mount_page(&server, "/b", &["/a", "/c"]).await;
    mount_page(&server, "/c", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("shared.db");
    let workers = [http_step(&db_path, "shared"), http_step(&db_path, "shared")];

    let root = StepParams::new(&base);
    let mut queue = VecDeque::from([serde_json::to_string(&root).unwrap()]);
    let mut fetched = Vec::new();
    let mut duplicates = 0;
    let mut turn = 0;

    while let Some(message) = queue.pop_front() {
        let params: StepParams = serde_json::from_str(&message).unwrap();
        let worker = &workers[turn % workers.len()];
        turn += 1;

        let reply = serde_json::to_string(&worker.run(&params).await.unwrap()).unwrap();
        let outcome: StepOutcome = serde_json::from_str(&reply).unwrap();

        if outcome.result.is_skipped() {
            assert_eq!(outcome.result.reason, Some(SkipReason::AlreadyVisited));
            duplicates += 1;
            continue;
        }

        fetched.push(outcome.result.url.clone());
        for item in &outcome.work_items {
            let child = serde_json::to_string(&root.child(item)).unwrap();
            queue.push_back(child.clone());
            queue.push_back(child);
        }
    }

    fetched.sort();
    assert_eq!(
        fetched,
        vec![
            format!("{}/", base),
            format!("{}/a", base),
            format!("{}/b", base),
            format!("{}/c", base),
        ]
    );
    assert!(duplicates >= 4);
    assert_eq!(workers[0].ledger().page_count().await.unwrap(), 4);
    assert_eq!(workers[1].ledger().page_count().await.unwrap(), 4);
}
