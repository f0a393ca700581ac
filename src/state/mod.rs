//! State module for tracking crawl step progress
//!
//! A crawl step walks a fixed sequence of states from `Init` to `Done`, or
//! stops early in one of the skip states. Illegal transitions are rejected.

mod step_state;

// Re-export main types
pub use step_state::StepState;
