//! Stage DAG over a shared research record with per-field merge policies.

pub mod engine;
pub mod graph;
pub mod merge;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::Pipeline;
pub use graph::{Stage, StageGraph};
pub use merge::{MergePolicy, StateSchema};
pub use state::{ResearchState, StateUpdate, fields};
