use crate::pipeline::graph::{Stage, StageGraph};
use crate::pipeline::merge::StateSchema;
use crate::pipeline::state::{ResearchState, StateUpdate, fields};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::task::{Id, JoinError, JoinSet};

/// Executes a [`StageGraph`] over a shared [`ResearchState`].
///
/// A stage starts once every upstream stage has completed, successfully or
/// not. Independent stages run concurrently. Each stage sees a snapshot of the
/// merged state at the moment it starts, and its update is merged through the
/// schema before any dependent is released. A failing or panicking stage
/// records `"<stage> failed: <reason>"` in `error` and the run carries on.
///
/// Only the fields a stage declares in [`Stage::writes`] (plus `error`) are
/// merged. Undeclared fields are dropped with a warning, and an update left
/// with none of its declared fields records `"<stage> did not produce ..."`.
/// An empty update is a deliberate skip and merges nothing.
pub struct Pipeline {
    graph: StageGraph,
    schema: StateSchema,
}

impl Pipeline {
    pub fn new(graph: StageGraph, schema: StateSchema) -> Self {
        Self { graph, schema }
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub async fn run(&self, initial: ResearchState) -> ResearchState {
        let total = self.graph.len();
        let mut state = initial;
        let mut pending: Vec<usize> = (0..total).map(|i| self.graph.upstream_of(i).len()).collect();
        let mut started = vec![false; total];
        let mut running: JoinSet<StateUpdate> = JoinSet::new();
        let mut tasks: HashMap<Id, usize> = HashMap::new();
        let run_start = Instant::now();

        self.spawn_ready(&state, &pending, &mut started, &mut running, &mut tasks);

        while let Some(joined) = running.join_next_with_id().await {
            let (id, update) = match joined {
                Ok(done) => done,
                Err(e) => (e.id(), self.join_failure(&tasks, &e)),
            };
            let Some(finished) = tasks.remove(&id) else {
                ::log::error!("Finished task {} belongs to no stage", id);
                continue;
            };

            let changed = self.schema.merge(&mut state, update);
            ::log::debug!(
                "Merged {} into state: {:?}",
                self.graph.stage(finished).name(),
                changed
            );

            for dependent in 0..total {
                if self.graph.upstream_of(dependent).contains(&finished) {
                    pending[dependent] -= 1;
                }
            }
            self.spawn_ready(&state, &pending, &mut started, &mut running, &mut tasks);
        }

        let skipped: Vec<&str> = (0..total)
            .filter(|&i| !started[i])
            .map(|i| self.graph.stage(i).name())
            .collect();
        if !skipped.is_empty() {
            ::log::warn!("Stages never started: {:?}", skipped);
        }
        ::log::info!(
            "Pipeline finished {} stages in {:.2}s",
            total - skipped.len(),
            run_start.elapsed().as_secs_f64()
        );
        state
    }

    /// Error update for a stage task that ended without returning
    pub(super) fn join_failure(&self, tasks: &HashMap<Id, usize>, e: &JoinError) -> StateUpdate {
        let name = tasks
            .get(&e.id())
            .map(|&i| self.graph.stage(i).name())
            .unwrap_or("unknown stage");
        let reason = if e.is_cancelled() {
            "task was cancelled"
        } else {
            "task panicked"
        };
        ::log::error!("Stage {} could not be joined: {}", name, e);
        StateUpdate::error(format!("{} failed: {}", name, reason))
    }

    fn spawn_ready(
        &self,
        state: &ResearchState,
        pending: &[usize],
        started: &mut [bool],
        running: &mut JoinSet<StateUpdate>,
        tasks: &mut HashMap<Id, usize>,
    ) {
        for i in 0..pending.len() {
            if started[i] || pending[i] > 0 {
                continue;
            }
            started[i] = true;
            let stage = self.graph.stage(i).clone();
            let snapshot = state.clone();
            ::log::info!("Starting stage {}", stage.name());

            let handle = running.spawn(async move {
                let start = Instant::now();
                let outcome = AssertUnwindSafe(stage.run(&snapshot)).catch_unwind().await;
                match outcome {
                    Ok(Ok(update)) => {
                        ::log::info!(
                            "Stage {} completed in {:.2}s",
                            stage.name(),
                            start.elapsed().as_secs_f64()
                        );
                        declared_only(stage.as_ref(), update)
                    }
                    Ok(Err(e)) => {
                        ::log::error!("Stage {} failed: {}", stage.name(), e);
                        StateUpdate::error(format!("{} failed: {}", stage.name(), e))
                    }
                    Err(panic) => {
                        let reason = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "panicked".to_string());
                        ::log::error!("Stage {} panicked: {}", stage.name(), reason);
                        StateUpdate::error(format!("{} failed: {}", stage.name(), reason))
                    }
                }
            });
            tasks.insert(handle.id(), i);
        }
    }
}

/// Keep the fields `stage` declares (and `error`), dropping the rest
fn declared_only(stage: &dyn Stage, update: StateUpdate) -> StateUpdate {
    let declared = stage.writes();
    let mut kept = StateUpdate::new();
    let mut dropped = Vec::new();
    for (field, value) in update {
        if field == fields::ERROR || declared.iter().any(|d| *d == field) {
            kept.set(&field, value);
        } else {
            dropped.push(field);
        }
    }
    if dropped.is_empty() {
        return kept;
    }

    ::log::warn!(
        "Stage {} wrote undeclared fields {:?}; dropping them",
        stage.name(),
        dropped
    );
    let produced = kept.fields().any(|f| f != fields::ERROR);
    if !produced && kept.get(fields::ERROR).is_none() && !declared.is_empty() {
        kept.set(
            fields::ERROR,
            format!("{} did not produce {}", stage.name(), declared.join(", ")),
        );
    }
    kept
}
