use super::*;
use crate::error::{PipelineError, StageError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::task::JoinSet;

type Events = Arc<Mutex<Vec<String>>>;

enum Behavior {
    Write(Vec<(&'static str, Value)>),
    Fail(&'static str),
    Panic,
    Inspect(fn(&ResearchState) -> StateUpdate),
}

struct TestStage {
    name: &'static str,
    reads: Vec<&'static str>,
    writes: Vec<&'static str>,
    after: Vec<&'static str>,
    behavior: Behavior,
    barrier: Option<Arc<Barrier>>,
    events: Events,
}

impl TestStage {
    fn new(name: &'static str, events: &Events) -> Self {
        Self {
            name,
            reads: Vec::new(),
            writes: Vec::new(),
            after: Vec::new(),
            behavior: Behavior::Write(Vec::new()),
            barrier: None,
            events: events.clone(),
        }
    }

    fn reading(mut self, names: &[&'static str]) -> Self {
        self.reads = names.to_vec();
        self
    }

    fn following(mut self, stages: &[&'static str]) -> Self {
        self.after = stages.to_vec();
        self
    }

    fn writing(mut self, field: &'static str, value: Value) -> Self {
        self.writes.push(field);
        if let Behavior::Write(values) = &mut self.behavior {
            values.push((field, value));
        }
        self
    }

    /// Returns `field` without declaring it in `writes`
    fn smuggling(mut self, field: &'static str, value: Value) -> Self {
        if let Behavior::Write(values) = &mut self.behavior {
            values.push((field, value));
        }
        self
    }

    fn declaring(mut self, field: &'static str) -> Self {
        self.writes.push(field);
        self
    }

    fn fails(mut self, reason: &'static str) -> Self {
        self.behavior = Behavior::Fail(reason);
        self
    }

    fn panics(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    fn inspects(mut self, field: &'static str, f: fn(&ResearchState) -> StateUpdate) -> Self {
        self.writes.push(field);
        self.behavior = Behavior::Inspect(f);
        self
    }

    fn meets(mut self, barrier: &Arc<Barrier>) -> Self {
        self.barrier = Some(barrier.clone());
        self
    }

    fn arc(self) -> Arc<dyn Stage> {
        Arc::new(self)
    }
}

#[async_trait]
impl Stage for TestStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reads(&self) -> &[&'static str] {
        &self.reads
    }

    fn writes(&self) -> &[&'static str] {
        &self.writes
    }

    fn after(&self) -> &[&'static str] {
        &self.after
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        self.events.lock().unwrap().push(format!("start {}", self.name));
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        let result = match &self.behavior {
            Behavior::Write(values) => Ok(values
                .iter()
                .fold(StateUpdate::new(), |update, (field, value)| {
                    update.with(field, value.clone())
                })),
            Behavior::Fail(reason) => Err(StageError::Shape(reason.to_string())),
            Behavior::Panic => panic!("stage exploded"),
            Behavior::Inspect(f) => Ok(f(state)),
        };
        self.events.lock().unwrap().push(format!("end {}", self.name));
        result
    }
}

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn position(events: &Events, entry: &str) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("missing event {entry}"))
}

async fn run(stages: Vec<Arc<dyn Stage>>) -> ResearchState {
    let graph = StageGraph::new(stages).unwrap();
    let pipeline = Pipeline::new(graph, StateSchema::research());
    tokio::time::timeout(Duration::from_secs(5), pipeline.run(ResearchState::for_company("Acme")))
        .await
        .expect("pipeline did not finish")
}

#[tokio::test]
async fn test_fan_in_waits_for_both_branches() {
    let ev = events();
    let barrier = Arc::new(Barrier::new(2));
    let stages = vec![
        TestStage::new("crawl", &ev)
            .reading(&[fields::COMPANY_NAME])
            .writing(fields::WEBSITE_CONTENT, json!({"totalPages": 3}))
            .arc(),
        // both branches must be in flight together to pass the barrier
        TestStage::new("a", &ev)
            .reading(&[fields::WEBSITE_CONTENT])
            .writing(fields::NICHE, json!("finance"))
            .meets(&barrier)
            .arc(),
        TestStage::new("b", &ev)
            .reading(&[fields::WEBSITE_CONTENT])
            .writing(fields::PERIODIC_TABLE_REPORT, json!({"Localization": 40}))
            .meets(&barrier)
            .arc(),
        TestStage::new("c", &ev)
            .reading(&[fields::NICHE, fields::PERIODIC_TABLE_REPORT])
            .inspects(fields::VISIBILITY_REPORT, |state| {
                StateUpdate::new().with(
                    fields::VISIBILITY_REPORT,
                    json!({
                        "sawNiche": state.is_set(fields::NICHE),
                        "sawTable": state.is_set(fields::PERIODIC_TABLE_REPORT),
                    }),
                )
            })
            .arc(),
    ];

    let state = run(stages).await;

    assert!(position(&ev, "end a") < position(&ev, "start c"));
    assert!(position(&ev, "end b") < position(&ev, "start c"));
    assert_eq!(
        state.get(fields::VISIBILITY_REPORT),
        Some(&json!({"sawNiche": true, "sawTable": true}))
    );
    assert!(state.error().is_none());
}

#[tokio::test]
async fn test_first_write_wins_across_stages() {
    let ev = events();
    let stages = vec![
        TestStage::new("brand", &ev)
            .writing(fields::NICHE, json!("finance"))
            .arc(),
        TestStage::new("refine", &ev)
            .following(&["brand"])
            .writing(fields::NICHE, json!("retail"))
            .arc(),
    ];
    let state = run(stages).await;
    assert_eq!(state.get_str(fields::NICHE), Some("finance"));
}

#[tokio::test]
async fn test_latest_error_wins_and_run_continues() {
    let ev = events();
    let stages = vec![
        TestStage::new("first", &ev).fails("bad json").arc(),
        TestStage::new("second", &ev).following(&["first"]).fails("timeout").arc(),
        TestStage::new("third", &ev)
            .following(&["second"])
            .writing(fields::BRAND_METRICS, json!({"brand_rank": 2}))
            .arc(),
    ];
    let state = run(stages).await;
    assert_eq!(
        state.error(),
        Some("second failed: unexpected response shape: timeout")
    );
    assert!(state.is_set(fields::BRAND_METRICS));
}

#[tokio::test]
async fn test_panicking_stage_is_recorded() {
    let ev = events();
    let stages = vec![
        TestStage::new("fragile", &ev).panics().arc(),
        TestStage::new("next", &ev)
            .following(&["fragile"])
            .writing(fields::NICHE, json!("saas"))
            .arc(),
    ];
    let state = run(stages).await;
    assert_eq!(state.error(), Some("fragile failed: stage exploded"));
    assert_eq!(state.get_str(fields::NICHE), Some("saas"));
}

#[tokio::test]
async fn test_initial_state_is_preserved() {
    let ev = events();
    let stages = vec![
        TestStage::new("rename", &ev)
            .writing(fields::COMPANY_NAME, json!("Other"))
            .arc(),
    ];
    let state = run(stages).await;
    assert_eq!(state.get_str(fields::COMPANY_NAME), Some("Acme"));
}

#[tokio::test]
async fn test_undeclared_fields_are_dropped() {
    let ev = events();
    let stages = vec![
        TestStage::new("brand", &ev)
            .declaring(fields::NICHE)
            .smuggling(fields::INDUSTRY, json!("banking"))
            .arc(),
        TestStage::new("keywords", &ev)
            .writing(fields::SEO_KEYWORDS, json!(["payroll"]))
            .smuggling(fields::USP, json!(["fast"]))
            .arc(),
    ];
    let state = run(stages).await;

    assert!(!state.is_set(fields::INDUSTRY));
    assert!(!state.is_set(fields::USP));
    assert_eq!(state.get(fields::SEO_KEYWORDS), Some(&json!(["payroll"])));
    assert_eq!(state.error(), Some("brand did not produce niche"));
}

#[tokio::test]
async fn test_empty_update_is_a_quiet_skip() {
    let ev = events();
    let stages = vec![
        TestStage::new("optional", &ev).declaring(fields::PROMPT_REPORT).arc(),
        TestStage::new("after", &ev)
            .following(&["optional"])
            .writing(fields::NICHE, json!("saas"))
            .arc(),
    ];
    let state = run(stages).await;
    assert!(state.error().is_none());
    assert!(!state.is_set(fields::PROMPT_REPORT));
    assert_eq!(state.get_str(fields::NICHE), Some("saas"));
}

#[tokio::test]
async fn test_lost_task_is_named_in_error() {
    let ev = events();
    let graph = StageGraph::new(vec![
        TestStage::new("crawl", &ev).arc(),
        TestStage::new("brand", &ev).arc(),
    ])
    .unwrap();
    let pipeline = Pipeline::new(graph, StateSchema::research());

    let mut set: JoinSet<StateUpdate> = JoinSet::new();
    let handle = set.spawn(std::future::pending());
    handle.abort();
    let err = set.join_next_with_id().await.unwrap().unwrap_err();

    // "brand" is the second stage in graph order
    let tasks = HashMap::from([(handle.id(), 1)]);
    let update = pipeline.join_failure(&tasks, &err);
    assert_eq!(
        update.get(fields::ERROR),
        Some(&json!("brand failed: task was cancelled"))
    );
}

#[test]
fn test_cycle_is_rejected() {
    let ev = events();
    let stages = vec![
        TestStage::new("x", &ev)
            .reading(&[fields::NICHE])
            .writing(fields::INDUSTRY, json!("a"))
            .arc(),
        TestStage::new("y", &ev)
            .reading(&[fields::INDUSTRY])
            .writing(fields::NICHE, json!("b"))
            .arc(),
        TestStage::new("z", &ev).arc(),
    ];
    assert_eq!(
        StageGraph::new(stages).err(),
        Some(PipelineError::Cycle(vec!["x".to_string(), "y".to_string()]))
    );
}

#[test]
fn test_graph_construction_errors() {
    let ev = events();
    let duplicate = vec![
        TestStage::new("x", &ev).arc(),
        TestStage::new("x", &ev).arc(),
    ];
    assert_eq!(
        StageGraph::new(duplicate).err(),
        Some(PipelineError::DuplicateStage("x".to_string()))
    );

    let unknown = vec![TestStage::new("x", &ev).following(&["ghost"]).arc()];
    assert_eq!(
        StageGraph::new(unknown).err(),
        Some(PipelineError::UnknownDependency {
            stage: "x".to_string(),
            dependency: "ghost".to_string(),
        })
    );
}

#[test]
fn test_error_field_creates_no_edges() {
    let ev = events();
    let stages = vec![
        TestStage::new("x", &ev)
            .reading(&[fields::ERROR])
            .writing(fields::ERROR, json!("e"))
            .arc(),
        TestStage::new("y", &ev)
            .reading(&[fields::ERROR])
            .writing(fields::ERROR, json!("e"))
            .arc(),
    ];
    let graph = StageGraph::new(stages).unwrap();
    assert!(graph.dependencies_of("x").is_empty());
    assert_eq!(graph.levels(), vec![vec!["x", "y"]]);
}

#[test]
fn test_levels_and_order() {
    let ev = events();
    let stages = vec![
        TestStage::new("c", &ev)
            .reading(&[fields::NICHE, fields::INDUSTRY])
            .arc(),
        TestStage::new("a", &ev)
            .reading(&[fields::WEBSITE_CONTENT])
            .writing(fields::NICHE, json!(1))
            .arc(),
        TestStage::new("b", &ev)
            .reading(&[fields::WEBSITE_CONTENT])
            .writing(fields::INDUSTRY, json!(1))
            .arc(),
        TestStage::new("crawl", &ev)
            .writing(fields::WEBSITE_CONTENT, json!(1))
            .arc(),
    ];
    let graph = StageGraph::new(stages).unwrap();
    assert_eq!(graph.topological_order(), vec!["crawl", "a", "b", "c"]);
    assert_eq!(
        graph.levels(),
        vec![vec!["crawl"], vec!["a", "b"], vec!["c"]]
    );
    assert_eq!(graph.dependencies_of("c"), vec!["a", "b"]);
}
