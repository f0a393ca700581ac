//! Crawler module for crawl steps and local runs
//!
//! This module contains the core crawling logic, including:
//! - The crawl step state machine (`CrawlStep`)
//! - Page rendering and content extraction capabilities
//! - Link extraction and scoping
//! - An in-process scheduler for whole runs

pub mod content;
mod fetcher;
pub mod links;
mod params;
mod scheduler;
mod step;

pub use content::{extract_content, ContentExtractor, ExtractionMode, HtmlContentExtractor};
pub use fetcher::{build_http_client, HttpRenderer, PageRenderer, RenderedPage};
pub use links::{extract_links, extract_links_from_hrefs};
pub use params::{CrawlResult, CrawlWorkItem, SkipReason, StepOutcome, StepParams};
pub use scheduler::LocalScheduler;
pub use step::{CrawlStep, StepTimeouts};
