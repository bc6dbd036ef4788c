use crate::error::{PipelineError, StageError};
use crate::pipeline::state::{ResearchState, StateUpdate, fields};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// One node of the pipeline.
///
/// Dependencies come from the fields a stage reads: every other stage writing
/// one of them runs first. `after` adds explicit ordering on top of that.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields this stage consumes
    fn reads(&self) -> &[&'static str] {
        &[]
    }

    /// Fields this stage produces
    fn writes(&self) -> &[&'static str];

    /// Stages that must complete first regardless of fields
    fn after(&self) -> &[&'static str] {
        &[]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError>;
}

/// Validated stage DAG with a fixed topological order
pub struct StageGraph {
    stages: Vec<Arc<dyn Stage>>,
    upstream: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field("order", &self.topological_order())
            .finish()
    }
}

impl StageGraph {
    /// Builds the graph, deriving edges from reads/writes plus explicit `after`
    /// declarations. The `error` field never creates an edge.
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self, PipelineError> {
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.name(), i).is_some() {
                return Err(PipelineError::DuplicateStage(stage.name().to_string()));
            }
        }

        let mut upstream = vec![BTreeSet::new(); stages.len()];
        for (i, stage) in stages.iter().enumerate() {
            for field in stage.reads().iter().filter(|f| **f != fields::ERROR) {
                for (j, writer) in stages.iter().enumerate() {
                    if i != j && writer.writes().contains(field) {
                        upstream[i].insert(j);
                    }
                }
            }
            for dependency in stage.after() {
                let Some(&j) = index.get(dependency) else {
                    return Err(PipelineError::UnknownDependency {
                        stage: stage.name().to_string(),
                        dependency: dependency.to_string(),
                    });
                };
                if j != i {
                    upstream[i].insert(j);
                }
            }
        }

        let order = topological_sort(&upstream).map_err(|stuck| {
            PipelineError::Cycle(stuck.iter().map(|&i| stages[i].name().to_string()).collect())
        })?;

        Ok(Self {
            stages,
            upstream,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn stage(&self, i: usize) -> &Arc<dyn Stage> {
        &self.stages[i]
    }

    pub(crate) fn upstream_of(&self, i: usize) -> &BTreeSet<usize> {
        &self.upstream[i]
    }

    /// Names of the stages `name` waits for
    pub fn dependencies_of(&self, name: &str) -> Vec<&'static str> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .map(|i| self.upstream[i].iter().map(|&j| self.stages[j].name()).collect())
            .unwrap_or_default()
    }

    /// Stage names in a valid execution order
    pub fn topological_order(&self) -> Vec<&'static str> {
        self.order.iter().map(|&i| self.stages[i].name()).collect()
    }

    /// Groups of stages that can run together: each level only depends on earlier levels
    pub fn levels(&self) -> Vec<Vec<&'static str>> {
        let mut depth = vec![0usize; self.stages.len()];
        for &i in &self.order {
            depth[i] = self.upstream[i]
                .iter()
                .map(|&j| depth[j] + 1)
                .max()
                .unwrap_or(0);
        }
        let mut levels: Vec<Vec<&'static str>> = Vec::new();
        for &i in &self.order {
            if levels.len() <= depth[i] {
                levels.resize_with(depth[i] + 1, Vec::new);
            }
            levels[depth[i]].push(self.stages[i].name());
        }
        levels
    }
}

/// Kahn's algorithm, ties broken by declaration order. On a cycle returns the
/// stages that could never be scheduled.
fn topological_sort(upstream: &[BTreeSet<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let mut pending: Vec<usize> = upstream.iter().map(BTreeSet::len).collect();
    let mut ready: VecDeque<usize> = (0..upstream.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(upstream.len());

    while let Some(i) = ready.pop_front() {
        order.push(i);
        for (j, deps) in upstream.iter().enumerate() {
            if deps.contains(&i) {
                pending[j] -= 1;
                if pending[j] == 0 {
                    ready.push_back(j);
                }
            }
        }
    }

    if order.len() == upstream.len() {
        Ok(order)
    } else {
        Err((0..upstream.len()).filter(|i| !order.contains(i)).collect())
    }
}
