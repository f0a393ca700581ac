//! The crawl step
//!
//! A step handles exactly one URL of a run:
//!
//! 1. Normalize the URL and resolve the run's base domain
//! 2. Skip if the URL was already visited or the page budget is spent
//! 3. Claim the URL and reserve a page in one ledger operation
//! 4. Render the page and extract its content
//! 5. Archive linked files and emit work items for the other links
//!
//! The claim always happens before the fetch, so a page is fetched at most
//! once per run even when the scheduler delivers the same item twice.

use crate::archive::{is_file_url, ArchivedFile, FileArchiver};
use crate::crawler::content::{extract_content, ContentExtractor, ExtractionMode};
use crate::crawler::fetcher::PageRenderer;
use crate::crawler::links::extract_links;
use crate::crawler::params::{CrawlResult, CrawlWorkItem, SkipReason, StepOutcome, StepParams};
use crate::ledger::VisitedLedger;
use crate::state::StepState;
use crate::storage::ClaimOutcome;
use crate::url::{base_domain, normalize_url, Scope};
use crate::RippleError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Time limits for the external calls of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    pub navigation: Duration,
    pub extraction: Duration,
    pub archive: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            extraction: Duration::from_secs(10),
            archive: Duration::from_secs(60),
        }
    }
}

/// Crawl step orchestrator
///
/// Holds the run's ledger and the capabilities a step calls out to. It is
/// cheap to clone and safe to share between concurrently running steps.
#[derive(Clone)]
pub struct CrawlStep {
    ledger: VisitedLedger,
    renderer: Arc<dyn PageRenderer>,
    extractor: Arc<dyn ContentExtractor>,
    archiver: Option<Arc<dyn FileArchiver>>,
    timeouts: StepTimeouts,
}

impl CrawlStep {
    pub fn new(
        ledger: VisitedLedger,
        renderer: Arc<dyn PageRenderer>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Self {
        Self {
            ledger,
            renderer,
            extractor,
            archiver: None,
            timeouts: StepTimeouts::default(),
        }
    }

    /// Enables archiving of file links for steps that ask for attachments
    pub fn with_archiver(mut self, archiver: Arc<dyn FileArchiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn with_timeouts(mut self, timeouts: StepTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn ledger(&self) -> &VisitedLedger {
        &self.ledger
    }

    /// Runs one step
    ///
    /// Skips are successful outcomes and echo the URL as the caller sent it.
    /// Errors are returned for invalid input, ledger failures, and failed or
    /// timed-out rendering or extraction; in the last two cases the URL stays
    /// claimed.
    pub async fn run(&self, params: &StepParams) -> Result<StepOutcome, RippleError> {
        params.validate()?;

        let mut state = StepState::Init;
        let depth = params.depth;

        // ===== Scope =====
        let url = normalize_url(params.url.trim())?;
        let url_key = url.to_string();
        let local_domain = base_domain(&url)?;

        let domain = if depth == 0 {
            self.ledger.set_base_domain(&local_domain).await?;
            local_domain
        } else {
            self.ledger.base_domain().await?.unwrap_or(local_domain)
        };
        state.advance(StepState::ScopeResolved)?;

        tracing::info!(
            "Step start: {} (depth {}/{}, run {})",
            url_key,
            depth,
            params.max_depth,
            self.ledger.run_id()
        );

        // ===== Dedup and budget =====
        if self.ledger.is_visited(&url_key).await? {
            return skip(&mut state, &params.url, depth, SkipReason::AlreadyVisited);
        }
        state.advance(StepState::DedupChecked)?;

        let page_count = self.ledger.page_count().await?;
        if page_count >= params.max_pages {
            return skip(&mut state, &params.url, depth, SkipReason::MaxPagesReached);
        }
        state.advance(StepState::BudgetChecked)?;

        // ===== Claim =====
        let page_number = match self.ledger.claim(&url_key, params.max_pages).await? {
            ClaimOutcome::Claimed(page_number) => page_number,
            ClaimOutcome::AlreadyClaimed => {
                tracing::debug!("Lost claim race for {}", url_key);
                return skip(&mut state, &params.url, depth, SkipReason::AlreadyVisited);
            }
            ClaimOutcome::LimitReached => {
                tracing::debug!("Budget exhausted while claiming {}", url_key);
                return skip(&mut state, &params.url, depth, SkipReason::MaxPagesReached);
            }
        };
        state.advance(StepState::Claimed)?;

        // ===== Fetch and extract =====
        let page = timed(
            &url_key,
            "navigation",
            self.timeouts.navigation,
            self.renderer.render(&url),
        )
        .await?;
        state.advance(StepState::Fetched)?;

        let mode = ExtractionMode::from_schema(params.schema.as_ref());
        let content = timed(
            &url_key,
            "extraction",
            self.timeouts.extraction,
            extract_content(self.extractor.as_ref(), &page, &mode),
        )
        .await?;
        state.advance(StepState::ContentExtracted)?;

        // ===== Expand links =====
        let scope = Scope::new(domain, params.include_external)
            .with_allowed_domains(&params.allowed_domains);
        let links = extract_links(&page, &scope);

        let mut attachments = Vec::new();
        let mut work_items = Vec::new();

        for link in &links {
            let link_url = match Url::parse(link) {
                Ok(u) => u,
                Err(_) => continue,
            };

            if is_file_url(&link_url) {
                if params.include_attachments {
                    if let Some(file) = self.archive(&link_url).await {
                        attachments.push(file);
                    }
                }
                continue;
            }

            if depth >= params.max_depth {
                continue;
            }

            // Advisory: the child step re-checks under the claim
            if self.ledger.is_visited(link).await? {
                tracing::trace!("Not queueing visited link {}", link);
                continue;
            }

            tracing::debug!("Queueing {} at depth {}", link, depth + 1);
            work_items.push(CrawlWorkItem {
                url: link.clone(),
                depth: depth + 1,
                include_external: params.include_external,
            });
        }
        state.advance(StepState::LinksExpanded)?;

        let result = CrawlResult {
            success: true,
            url: url_key,
            depth,
            content,
            links_found: links.len(),
            links_queued: work_items.len(),
            attachments,
            skipped: None,
            reason: None,
        };
        state.advance(StepState::Done)?;

        tracing::info!(
            "Step done: {} (page {}/{}, {} links, {} queued, {} attachments)",
            result.url,
            page_number,
            params.max_pages,
            result.links_found,
            result.links_queued,
            result.attachments.len()
        );

        Ok(StepOutcome {
            result,
            work_items,
            state,
        })
    }

    /// Archives one file link; failures are logged and dropped
    async fn archive(&self, url: &Url) -> Option<ArchivedFile> {
        let Some(archiver) = &self.archiver else {
            tracing::warn!("No archiver configured, dropping attachment {}", url);
            return None;
        };

        match tokio::time::timeout(self.timeouts.archive, archiver.archive(url)).await {
            Ok(Ok(file)) => Some(file),
            Ok(Err(e)) => {
                tracing::warn!("Dropping attachment {}: {}", url, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Dropping attachment {}: timed out after {:?}",
                    url,
                    self.timeouts.archive
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for CrawlStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlStep")
            .field("ledger", &self.ledger)
            .field("archiver", &self.archiver.is_some())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn skip(
    state: &mut StepState,
    url: &str,
    depth: u32,
    reason: SkipReason,
) -> Result<StepOutcome, RippleError> {
    state.advance(reason.state())?;
    tracing::info!("Step skipped: {} ({})", url, reason);
    Ok(StepOutcome::skipped(url, depth, reason))
}

/// Awaits a capability call under a time limit
async fn timed<T, F>(
    url: &str,
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, RippleError>
where
    F: Future<Output = Result<T, RippleError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RippleError::Timeout {
            url: url.to_string(),
            operation,
            elapsed: limit,
        }),
    }
}
