//! Routing decisions, plan steps, and the generic DAG/wavefront executor
//! that drives them (spec §3, §4.5).
//!
//! The executor here is deliberately agnostic of *what* a step does —
//! `model_generate`/`tool_call`/`confidence_check`/`aggregate` semantics
//! live in the orchestrator crate behind the [`PlanStepExecutor`] trait.
//! This module only guarantees the DAG shape: no cycles, steps run once
//! every dependency has completed, and independent steps may run
//! concurrently up to a caller-supplied parallelism cap.
//!
//! Grounded on `message_graph::executor`'s `JoinSet` + per-frontier
//! wavefront loop, generalised from a message-routing DAG to a plan-step
//! DAG and from a per-node semaphore to a single per-request parallelism
//! cap (spec §5: "independent steps may be dispatched concurrently up to a
//! per-request parallelism cap").

use crate::error::LaloError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Routing category for a request (GLOSSARY: Path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Path {
    Simple,
    Complex,
    Specialized,
}

/// The Router's output (spec §3 "Routing Decision"). Immutable once
/// produced; `validate` checks the invariants the spec requires before the
/// orchestrator acts on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    pub path: Path,
    pub complexity: f32,
    pub confidence: f32,
    pub reason: String,
    pub recommended: Vec<String>,
    pub required_tools: BTreeSet<String>,
    pub action_plan: Option<Plan>,
}

/// Same shape as [`RoutingDecision`]; aliased so `event.rs` doesn't need to
/// depend on validation-only methods.
pub type RoutingDecisionView = RoutingDecision;

impl RoutingDecision {
    /// Checks the invariants spec §3 requires of every Routing Decision.
    /// `known_model_ids` is the Model Registry's set of registered ids.
    pub fn validate(&self, known_model_ids: &[String]) -> Result<(), LaloError> {
        if self.recommended.is_empty() {
            return Err(LaloError::invalid_request(
                "routing decision must recommend at least one model",
            ));
        }
        for id in &self.recommended {
            if !known_model_ids.iter().any(|k| k == id) {
                return Err(LaloError::invalid_request(format!(
                    "recommended model '{id}' is not in the registry"
                )));
            }
        }
        if !self.complexity.is_finite() || !(0.0..=1.0).contains(&self.complexity) {
            return Err(LaloError::invalid_request(
                "complexity must be a finite number in [0, 1]",
            ));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(LaloError::invalid_request(
                "confidence must be a finite number in [0, 1]",
            ));
        }
        if let Some(plan) = &self.action_plan {
            plan.validate()?;
        }
        Ok(())
    }
}

/// What kind of work a [`PlanStep`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ModelGenerate,
    ToolCall,
    ConfidenceCheck,
    Aggregate,
}

/// A step input: either a literal value or a reference to an earlier
/// step's output, resolved by the orchestrator at execution time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PlanValue {
    StepRef(u32),
    Literal(serde_json::Value),
}

/// What to do when a `confidence_check` step downstream of this one
/// recommends `retry` (spec §4.5, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// One node of a Routing Decision's action plan (spec §3 "PlanStep").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub id: u32,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, PlanValue>,
    #[serde(default)]
    pub depends_on: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_low_confidence: Option<RetryPolicy>,
}

/// An ordered DAG of [`PlanStep`]s. Construction does not validate;
/// call [`Plan::validate`] before executing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("duplicate step id {0}")]
    DuplicateId(u32),
    #[error("step {step} depends on unknown step {dep}")]
    UnknownDependency { step: u32, dep: u32 },
    #[error("plan contains a cycle")]
    Cycle,
    #[error("plan has no steps")]
    Empty,
}

impl From<PlanError> for LaloError {
    fn from(e: PlanError) -> Self {
        LaloError::invalid_request(e.to_string())
    }
}

impl Plan {
    /// Rejects duplicate ids, dependencies on unknown/later steps, and
    /// cycles (spec §9 Open Question #1: cyclic plans are `invalid_request`).
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(PlanError::DuplicateId(step.id));
            }
        }
        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep) {
                    return Err(PlanError::UnknownDependency {
                        step: step.id,
                        dep: *dep,
                    });
                }
            }
        }
        self.topological_order().map(|_| ()).ok_or(PlanError::Cycle)
    }

    /// Kahn's algorithm; `None` if a cycle is present.
    fn topological_order(&self) -> Option<Vec<u32>> {
        let mut indegree: HashMap<u32, usize> =
            self.steps.iter().map(|s| (s.id, s.depends_on.len())).collect();
        let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
        for step in &self.steps {
            for dep in &step.depends_on {
                dependents.entry(*dep).or_default().push(step.id);
            }
        }
        let mut frontier: Vec<u32> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        frontier.sort_unstable();
        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(id) = frontier.pop() {
            order.push(id);
            if let Some(children) = dependents.get(&id) {
                for child in children {
                    let entry = indegree.get_mut(child).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        frontier.push(*child);
                    }
                }
            }
        }
        if order.len() == self.steps.len() {
            Some(order)
        } else {
            None
        }
    }

    fn step(&self, id: u32) -> &PlanStep {
        self.steps.iter().find(|s| s.id == id).expect("validated plan")
    }
}

/// What a completed step produced, keyed by step id so downstream steps
/// can resolve [`PlanValue::StepRef`] inputs and the final `aggregate`
/// step (or the last topologically-ordered step) can be read off.
#[derive(Debug, Clone)]
pub enum StepOutput {
    Text(String),
    Tool(serde_json::Value),
}

impl StepOutput {
    pub fn as_text(&self) -> String {
        match self {
            StepOutput::Text(t) => t.clone(),
            StepOutput::Tool(v) => v.to_string(),
        }
    }
}

/// Implemented by the orchestrator to give each [`StepKind`] its real
/// behaviour; the plan executor only calls this once a step's
/// dependencies have all completed.
#[async_trait]
pub trait PlanStepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &PlanStep,
        completed: &HashMap<u32, StepOutput>,
    ) -> Result<StepOutput, LaloError>;
}

/// Outcome of running a whole plan: per-step outputs and the id of the
/// step whose output is the plan's final text (the `aggregate` step if
/// present, else the last topologically-ordered step — spec §4.5).
pub struct PlanExecutionReport {
    pub outputs: HashMap<u32, StepOutput>,
    pub final_step_id: u32,
}

/// Runs `plan` to completion, dispatching ready steps through `executor`
/// with at most `parallelism_cap` concurrent steps. The first step error
/// aborts the whole plan (the orchestrator is responsible for turning that
/// into a retry or a terminal `Error` event per its own retry policy).
pub async fn execute_plan(
    plan: &Plan,
    parallelism_cap: usize,
    executor: Arc<dyn PlanStepExecutor>,
) -> Result<PlanExecutionReport, LaloError> {
    plan.validate()?;
    let order = plan
        .topological_order()
        .expect("validated above: plan is acyclic");

    let semaphore = Arc::new(Semaphore::new(parallelism_cap.max(1)));
    let mut outputs: HashMap<u32, StepOutput> = HashMap::new();
    let mut remaining: Vec<u32> = order;

    while !remaining.is_empty() {
        let ready: Vec<u32> = remaining
            .iter()
            .copied()
            .filter(|id| plan.step(*id).depends_on.iter().all(|d| outputs.contains_key(d)))
            .collect();
        if ready.is_empty() {
            // Can't happen for a validated (acyclic) plan, but guard anyway.
            return Err(LaloError::internal("plan executor stalled with unmet dependencies"));
        }

        let mut joinset: JoinSet<(u32, Result<StepOutput, LaloError>)> = JoinSet::new();
        for id in &ready {
            let step = plan.step(*id).clone();
            let snapshot = outputs.clone();
            let exec = executor.clone();
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            joinset.spawn(async move {
                let _permit = permit;
                let result = exec.execute(&step, &snapshot).await;
                (step.id, result)
            });
        }

        while let Some(joined) = joinset.join_next().await {
            let (id, result) = joined.map_err(|e| LaloError::internal(format!("step task panicked: {e}")))?;
            match result {
                Ok(output) => {
                    outputs.insert(id, output);
                }
                Err(err) => return Err(err),
            }
        }

        remaining.retain(|id| !ready.contains(id));
    }

    let final_step_id = plan
        .steps
        .iter()
        .find(|s| s.kind == StepKind::Aggregate)
        .map(|s| s.id)
        .unwrap_or_else(|| *plan.topological_order().unwrap().last().unwrap());

    Ok(PlanExecutionReport {
        outputs,
        final_step_id,
    })
}
