//! Statistics for a finished run
//!
//! This module summarizes a `RunReport` and prints it.

use crate::crawler::SkipReason;
use crate::output::RunReport;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    pub pages_fetched: usize,
    pub skipped_duplicate: usize,
    pub skipped_budget: usize,
    pub failed: usize,

    /// Fetched pages per depth
    pub pages_by_depth: BTreeMap<u32, usize>,

    pub links_found: usize,
    pub links_queued: usize,
    pub attachments: usize,
    pub duration_seconds: Option<i64>,
}

impl CrawlStatistics {
    pub fn from_report(report: &RunReport) -> Self {
        let mut pages_by_depth = BTreeMap::new();
        for result in report.fetched() {
            *pages_by_depth.entry(result.depth).or_insert(0) += 1;
        }

        Self {
            pages_fetched: report.pages_fetched(),
            skipped_duplicate: report.skipped_for(SkipReason::AlreadyVisited),
            skipped_budget: report.skipped_for(SkipReason::MaxPagesReached),
            failed: report.failures.len(),
            pages_by_depth,
            links_found: report.fetched().map(|r| r.links_found).sum(),
            links_queued: report.fetched().map(|r| r.links_queued).sum(),
            attachments: report.attachment_count(),
            duration_seconds: report.duration_seconds(),
        }
    }

    /// Share of attempted fetches that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_fetched + self.failed;
        if attempted == 0 {
            0.0
        } else {
            (self.pages_fetched as f64 / attempted as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(report: &RunReport) {
    let stats = CrawlStatistics::from_report(report);

    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Run: {}", report.run_id);
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Links found: {}", stats.links_found);
    println!("  Links queued: {}", stats.links_queued);
    println!("  Attachments archived: {}", stats.attachments);
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!();

    if !stats.pages_by_depth.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in &stats.pages_by_depth {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    println!("Skipped:");
    println!("  {}: {}", SkipReason::AlreadyVisited, stats.skipped_duplicate);
    println!("  {}: {}", SkipReason::MaxPagesReached, stats.skipped_budget);
    println!();

    if !report.failures.is_empty() {
        println!("Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  - {} (depth {}): {}", failure.url, failure.depth, failure.error);
        }
        println!();
    }

    println!("Success rate: {:.1}%", stats.success_rate());
}
