//! Complex path (spec §4.5): drives a [`Plan`] through
//! [`lalo_kernel::plan::execute_plan`] via [`StepExecutor`], the concrete
//! [`PlanStepExecutor`] that gives `model_generate`/`tool_call`/
//! `confidence_check`/`aggregate` their real behaviour.
//!
//! Confidence-driven retry lives inside `model_generate` itself: it retries
//! the same model up to its `on_low_confidence` policy, keeps the
//! best-scoring attempt, and stores that attempt's [`ConfidenceReport`]
//! keyed by step id. A downstream `confidence_check` step reads that report
//! back, is the only step that emits [`Event::Confidence`], and turns
//! "exhausted retries without `Accept`" into the step error that aborts the
//! whole plan — `execute_plan` itself never needs to know about retries or
//! confidence at all.

use crate::generate::{confidence_event, GeneratedOutcome};
use crate::orchestrator::Orchestrator;
use crate::request::AgentRequest;
use crate::usage::UsageSummary;
use async_trait::async_trait;
use lalo_kernel::error::LaloError;
use lalo_kernel::event::Event;
use lalo_kernel::plan::{execute_plan, Plan, PlanStep, PlanStepExecutor, PlanValue, RoutingDecision, StepKind, StepOutput};
use lalo_kernel::tools::{SandboxPolicy, ToolOutcome};
use lalo_kernel::validator::{ConfidenceReport, Recommendation};
use lalo_local_llm::CancellationHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// The orchestrator's [`PlanStepExecutor`] for one in-flight request: holds
/// everything a step needs that the generic DAG executor doesn't carry —
/// the event sink, the cancellation token, and per-step scratch state.
pub(crate) struct StepExecutor {
    orchestrator: Orchestrator,
    request: AgentRequest,
    cancel: CancellationHandle,
    tx: mpsc::Sender<Event>,
    reports: AsyncMutex<HashMap<u32, ConfidenceReport>>,
    usages: AsyncMutex<Vec<GeneratedOutcome>>,
}

impl StepExecutor {
    fn new(orchestrator: Orchestrator, request: AgentRequest, cancel: CancellationHandle, tx: mpsc::Sender<Event>) -> Self {
        Self {
            orchestrator,
            request,
            cancel,
            tx,
            reports: AsyncMutex::new(HashMap::new()),
            usages: AsyncMutex::new(Vec::new()),
        }
    }

    async fn total_usage(&self) -> UsageSummary {
        let usages = self.usages.lock().await;
        let prompt_tokens = usages.iter().map(|u| u.prompt_tokens).sum();
        let completion_tokens = usages.iter().map(|u| u.completion_tokens).sum();
        let model_id = usages.last().map(|u| u.model_id.clone()).unwrap_or_else(|| "none".to_string());
        UsageSummary {
            model_id,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    async fn run_model_generate(&self, step: &PlanStep, completed: &HashMap<u32, StepOutput>) -> Result<StepOutput, LaloError> {
        let model_id = step
            .model
            .clone()
            .ok_or_else(|| LaloError::invalid_request(format!("step {} has no model", step.id)))?;
        let mut prompt = step
            .inputs
            .get("prompt")
            .map(|v| resolve_text(v, completed))
            .unwrap_or_else(|| self.request.prompt.clone());
        if let Some(context) = step.inputs.get("context") {
            let context_text = resolve_text(context, completed);
            if !context_text.is_empty() {
                prompt = format!("{prompt}\n\ntool output:\n{context_text}");
            }
        }

        let max_retries = step.on_low_confidence.as_ref().map(|p| p.max_retries).unwrap_or(self.orchestrator.config.max_retries_per_step);

        let mut best: Option<(GeneratedOutcome, ConfidenceReport)> = None;
        for attempt in 0..=max_retries {
            if self.cancel.is_cancelled() {
                return Err(LaloError::Cancelled);
            }
            let outcome = self
                .orchestrator
                .generate_text(&model_id, &self.request, &prompt, Some(step.id), &self.cancel, &self.tx)
                .await?;
            let report = self.orchestrator.score_text(&outcome.text).await;
            let accept = report.recommendation == Recommendation::Accept;
            let better = best.as_ref().map(|(_, r)| report.overall > r.overall).unwrap_or(true);
            if better {
                best = Some((outcome, report.clone()));
            }
            if accept || attempt == max_retries {
                break;
            }
        }

        let (outcome, report) = best.expect("loop always runs at least once");
        self.reports.lock().await.insert(step.id, report);
        self.usages.lock().await.push(outcome.clone());

        let _ = self
            .tx
            .send(Event::StepComplete {
                step_id: step.id,
                summary: crate::usage::summarize(&outcome.text),
            })
            .await;

        Ok(StepOutput::Text(outcome.text))
    }

    async fn run_confidence_check(&self, step: &PlanStep, completed: &HashMap<u32, StepOutput>) -> Result<StepOutput, LaloError> {
        let target = step
            .depends_on
            .iter()
            .next()
            .copied()
            .ok_or_else(|| LaloError::invalid_request(format!("confidence_check step {} has no dependency to check", step.id)))?;
        let checked_text = completed
            .get(&target)
            .map(StepOutput::as_text)
            .ok_or_else(|| LaloError::internal(format!("confidence_check step {} ran before its dependency completed", step.id)))?;

        let report = {
            let mut reports = self.reports.lock().await;
            match reports.remove(&target) {
                Some(report) => report,
                None => self.orchestrator.score_text(&checked_text).await,
            }
        };

        let _ = self.tx.send(confidence_event(&report)).await;
        let _ = self
            .tx
            .send(Event::StepComplete {
                step_id: step.id,
                summary: format!("confidence: {}", report.recommendation),
            })
            .await;

        if report.recommendation == Recommendation::Accept {
            Ok(StepOutput::Text(checked_text))
        } else {
            Err(LaloError::internal(format!(
                "step {target} output did not reach acceptable confidence ({})",
                report.recommendation
            )))
        }
    }

    async fn run_tool_call(&self, step: &PlanStep, completed: &HashMap<u32, StepOutput>) -> Result<StepOutput, LaloError> {
        let tool_id = step
            .tool
            .clone()
            .ok_or_else(|| LaloError::invalid_request(format!("step {} has no tool", step.id)))?;
        let args = resolve_args(&step.inputs, completed);

        let _ = self
            .tx
            .send(Event::ToolCall {
                tool: tool_id.clone(),
                args: args.clone(),
                step_id: step.id,
            })
            .await;

        let policy = SandboxPolicy::default();
        let result = self.orchestrator.tools.execute(&tool_id, args, &policy).await;

        match result {
            Ok(outcome) => {
                let value = match &outcome {
                    ToolOutcome::Text(text) => serde_json::Value::String(text.clone()),
                    ToolOutcome::Structured(value) => value.clone(),
                };
                let _ = self
                    .tx
                    .send(Event::ToolResult {
                        step_id: step.id,
                        result: Some(value.clone()),
                        error: None,
                    })
                    .await;
                let _ = self
                    .tx
                    .send(Event::StepComplete {
                        step_id: step.id,
                        summary: crate::usage::summarize(&value.to_string()),
                    })
                    .await;
                Ok(StepOutput::Tool(value))
            }
            Err(err) => {
                let _ = self
                    .tx
                    .send(Event::ToolResult {
                        step_id: step.id,
                        result: None,
                        error: Some(err.to_string()),
                    })
                    .await;
                Err(err.into())
            }
        }
    }

    async fn run_aggregate(&self, step: &PlanStep, completed: &HashMap<u32, StepOutput>) -> Result<StepOutput, LaloError> {
        let mut parts = Vec::new();
        for dep in &step.depends_on {
            if let Some(output) = completed.get(dep) {
                parts.push(output.as_text());
            }
        }
        let joined = parts.join("\n");
        let _ = self
            .tx
            .send(Event::StepComplete {
                step_id: step.id,
                summary: crate::usage::summarize(&joined),
            })
            .await;
        Ok(StepOutput::Text(joined))
    }
}

#[async_trait]
impl PlanStepExecutor for StepExecutor {
    async fn execute(&self, step: &PlanStep, completed: &HashMap<u32, StepOutput>) -> Result<StepOutput, LaloError> {
        match step.kind {
            StepKind::ModelGenerate => self.run_model_generate(step, completed).await,
            StepKind::ToolCall => self.run_tool_call(step, completed).await,
            StepKind::ConfidenceCheck => self.run_confidence_check(step, completed).await,
            StepKind::Aggregate => self.run_aggregate(step, completed).await,
        }
    }
}

fn resolve_text(value: &PlanValue, completed: &HashMap<u32, StepOutput>) -> String {
    match value {
        PlanValue::StepRef(id) => completed.get(id).map(StepOutput::as_text).unwrap_or_default(),
        PlanValue::Literal(serde_json::Value::String(s)) => s.clone(),
        PlanValue::Literal(other) => other.to_string(),
    }
}

fn resolve_json(value: &PlanValue, completed: &HashMap<u32, StepOutput>) -> serde_json::Value {
    match value {
        PlanValue::StepRef(id) => match completed.get(id) {
            Some(StepOutput::Tool(v)) => v.clone(),
            Some(StepOutput::Text(t)) => serde_json::Value::String(t.clone()),
            None => serde_json::Value::Null,
        },
        PlanValue::Literal(v) => v.clone(),
    }
}

fn resolve_args(inputs: &HashMap<String, PlanValue>, completed: &HashMap<u32, StepOutput>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> =
        inputs.iter().map(|(k, v)| (k.clone(), resolve_json(v, completed))).collect();
    serde_json::Value::Object(map)
}

impl Orchestrator {
    pub(crate) async fn run_complex(
        &self,
        request: &AgentRequest,
        decision: &RoutingDecision,
        cancel: &CancellationHandle,
        tx: &mpsc::Sender<Event>,
    ) -> Result<(String, UsageSummary), LaloError> {
        let plan = match &decision.action_plan {
            Some(plan) => plan.clone(),
            None => self.synthesize_plan(request, decision),
        };
        self.run_plan(request, &plan, cancel, tx).await
    }

    pub(crate) async fn run_plan(
        &self,
        request: &AgentRequest,
        plan: &Plan,
        cancel: &CancellationHandle,
        tx: &mpsc::Sender<Event>,
    ) -> Result<(String, UsageSummary), LaloError> {
        for step in &plan.steps {
            if step.kind == StepKind::ToolCall {
                let tool_id = step
                    .tool
                    .as_deref()
                    .ok_or_else(|| LaloError::invalid_request(format!("step {} has no tool", step.id)))?;
                if !self.tools.has_tool(tool_id) {
                    return Err(LaloError::invalid_request(format!("unknown tool '{tool_id}'")));
                }
            }
        }

        let executor = Arc::new(StepExecutor::new(self.clone(), request.clone(), cancel.clone(), tx.clone()));
        let report = execute_plan(plan, self.config.max_parallel_steps_per_request, executor.clone()).await?;

        let final_text = report
            .outputs
            .get(&report.final_step_id)
            .map(StepOutput::as_text)
            .unwrap_or_default();
        let usage = executor.total_usage().await;
        Ok((final_text, usage))
    }

    /// Builds a minimal plan on the best recommended model, used for a
    /// plan-less `complex` decision and for the simple path's
    /// confidence-exhaustion escalation: generate + confidence_check, with
    /// a single tool_call step prepended when the routing decision names
    /// required tools (spec §4.5: "optionally preceded by a single tool
    /// call if required_tools is non-empty").
    pub(crate) fn synthesize_plan(&self, request: &AgentRequest, decision: &RoutingDecision) -> Plan {
        let model = decision.recommended.first().cloned();
        let mut steps = Vec::new();
        let mut generate_depends_on = std::collections::BTreeSet::new();

        let mut generate_inputs = HashMap::new();
        generate_inputs.insert("prompt".to_string(), PlanValue::Literal(serde_json::Value::String(request.prompt.clone())));

        if let Some(tool_id) = decision.required_tools.iter().next() {
            let mut tool_inputs = HashMap::new();
            tool_inputs.insert("query".to_string(), PlanValue::Literal(serde_json::Value::String(request.prompt.clone())));
            steps.push(PlanStep {
                id: 1,
                kind: StepKind::ToolCall,
                model: None,
                tool: Some(tool_id.clone()),
                inputs: tool_inputs,
                depends_on: Default::default(),
                on_low_confidence: None,
            });
            generate_inputs.insert("context".to_string(), PlanValue::StepRef(1));
            generate_depends_on.insert(1);
        }

        let generate_id = steps.len() as u32 + 1;
        steps.push(PlanStep {
            id: generate_id,
            kind: StepKind::ModelGenerate,
            model,
            tool: None,
            inputs: generate_inputs,
            depends_on: generate_depends_on,
            on_low_confidence: Some(lalo_kernel::plan::RetryPolicy {
                max_retries: self.config.max_retries_per_step,
            }),
        });

        let check_id = generate_id + 1;
        steps.push(PlanStep {
            id: check_id,
            kind: StepKind::ConfidenceCheck,
            model: None,
            tool: None,
            inputs: HashMap::new(),
            depends_on: [generate_id].into_iter().collect(),
            on_low_confidence: None,
        });

        Plan { steps }
    }
}
