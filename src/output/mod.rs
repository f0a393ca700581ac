//! Output module for run reports
//!
//! This module handles:
//! - Collecting step results of a local run into a `RunReport`
//! - Computing and printing run statistics

mod report;
pub mod stats;

pub use report::{RunReport, StepFailure};
pub use stats::{print_statistics, CrawlStatistics};
