/// Step state definitions for tracking crawl progress
///
/// This module defines every state a crawl step passes through while handling
/// one URL, and which transitions between them are legal.
use crate::RippleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a crawl step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    // ===== Active States =====
    /// Parameters accepted, nothing resolved yet
    Init,

    /// URL normalized and the run's base domain known
    ScopeResolved,

    /// URL confirmed not yet visited
    DedupChecked,

    /// Page budget confirmed not yet exhausted
    BudgetChecked,

    /// URL claimed in the ledger and a page reserved
    Claimed,

    /// Page rendered
    Fetched,

    /// Page content extracted
    ContentExtracted,

    /// Links archived or turned into work items
    LinksExpanded,

    // ===== Terminal States =====
    /// Step finished successfully
    Done,

    /// URL was already visited, or a concurrent step claimed it first
    SkippedDuplicate,

    /// Run reached its page budget
    SkippedBudget,
}

impl StepState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::SkippedDuplicate | Self::SkippedBudget
        )
    }

    /// Returns true if the step ended without fetching
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedDuplicate | Self::SkippedBudget)
    }

    /// Returns true if a page was fetched in this state or an earlier one
    pub fn has_fetched(&self) -> bool {
        matches!(
            self,
            Self::Fetched | Self::ContentExtracted | Self::LinksExpanded | Self::Done
        )
    }

    /// Returns true if moving from `self` to `next` is legal
    ///
    /// The happy path is strictly linear. A duplicate can be detected by the
    /// dedup check or by losing the claim; an exhausted budget by the budget
    /// check or by a failed page reservation.
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;

        matches!(
            (self, next),
            (Init, ScopeResolved)
                | (ScopeResolved, DedupChecked)
                | (ScopeResolved, SkippedDuplicate)
                | (DedupChecked, BudgetChecked)
                | (DedupChecked, SkippedBudget)
                | (BudgetChecked, Claimed)
                | (BudgetChecked, SkippedDuplicate)
                | (BudgetChecked, SkippedBudget)
                | (Claimed, Fetched)
                | (Fetched, ContentExtracted)
                | (ContentExtracted, LinksExpanded)
                | (LinksExpanded, Done)
        )
    }

    /// Moves to `next`, or fails with `InvalidTransition`
    pub fn advance(&mut self, next: StepState) -> Result<(), RippleError> {
        if !self.can_transition_to(next) {
            return Err(RippleError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!("Step state {} -> {}", self, next);
        *self = next;
        Ok(())
    }

    /// Short name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ScopeResolved => "scope_resolved",
            Self::DedupChecked => "dedup_checked",
            Self::BudgetChecked => "budget_checked",
            Self::Claimed => "claimed",
            Self::Fetched => "fetched",
            Self::ContentExtracted => "content_extracted",
            Self::LinksExpanded => "links_expanded",
            Self::Done => "done",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedBudget => "skipped_budget",
        }
    }

    /// Returns all possible step states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Init,
            Self::ScopeResolved,
            Self::DedupChecked,
            Self::BudgetChecked,
            Self::Claimed,
            Self::Fetched,
            Self::ContentExtracted,
            Self::LinksExpanded,
            Self::Done,
            Self::SkippedDuplicate,
            Self::SkippedBudget,
        ]
    }
}

impl Default for StepState {
    fn default() -> Self {
        Self::Init
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
