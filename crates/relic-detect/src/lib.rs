// crates/relic-detect/src/lib.rs
//
// relic-detect: Baseline maintenance and change detection for the Relic monitor.
//
// A baseline per (site, index) learns the normal behaviour of the index's
// spatial mean. Once established, each new observation is scored as a
// z-score against it; significant deviations become change events and are
// kept out of the baseline. Everything in this crate is pure: callers persist
// the returned state.

pub mod aging;
pub mod detector;
pub mod pairwise;
pub mod pixel;
pub mod replay;
pub mod stats;

pub use detector::{evaluate, Assessment, Evaluation};
pub use pairwise::{difference, ChangeClass, ChangeMap, ChangeSummary};
pub use replay::{replay, ReplaySummary};
