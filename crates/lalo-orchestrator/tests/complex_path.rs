use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use lalo_foundation::cloud::HttpCloudAdapter;
use lalo_foundation::config::LaloConfig;
use lalo_foundation::registry::{Backend, ModelDescriptor, ModelRegistry, Specialty};
use lalo_kernel::event::Event;
use lalo_kernel::plan::{Path, Plan, PlanStep, PlanValue, RoutingDecision, StepKind};
use lalo_kernel::telemetry::{InMemoryUsageRepository, TracingTelemetrySink};
use lalo_kernel::validator::{ConfidenceValidator, ValidatorConfig};
use lalo_local_llm::{CancellationHandle, LocalInferencePool, PoolConfig};
use lalo_orchestrator::{AgentRequest, Orchestrator};
use lalo_smith::SmithToolExecutor;

fn demo_registry() -> Arc<ModelRegistry> {
    let general = ModelDescriptor::builder("general-small", Backend::LocalGguf)
        .specialty(Specialty::General)
        .context_window(4096)
        .build();
    let validation = ModelDescriptor::builder("validator-small", Backend::LocalGguf)
        .specialty(Specialty::Validation)
        .context_window(4096)
        .build();
    Arc::new(ModelRegistry::from_descriptors(vec![general, validation]))
}

fn test_orchestrator() -> Orchestrator {
    let registry = demo_registry();
    let mut pool_config = PoolConfig::default();
    pool_config.demo_mode = true;
    let pool = Arc::new(LocalInferencePool::new(registry.clone(), pool_config));
    let cloud = Arc::new(HttpCloudAdapter::default());
    let tools = Arc::new(SmithToolExecutor::default());
    let validator = Arc::new(ConfidenceValidator::new(ValidatorConfig::default()));
    let telemetry = Arc::new(TracingTelemetrySink);
    let usage_repo = Arc::new(InMemoryUsageRepository::new());
    let mut config = LaloConfig::default();
    config.demo_mode = true;

    Orchestrator::new(registry, pool, cloud, tools, validator, telemetry, usage_repo, config)
}

/// Plan: generate (1) -> word_count tool over its output (2) -> confidence
/// check over the generate step (3, independent of the tool step) ->
/// aggregate both (4).
fn four_step_plan() -> Plan {
    let mut generate_inputs = HashMap::new();
    generate_inputs.insert("prompt".to_string(), PlanValue::Literal(serde_json::json!("Tell me about the history of Rome")));

    let mut tool_inputs = HashMap::new();
    tool_inputs.insert("text".to_string(), PlanValue::StepRef(1));

    Plan {
        steps: vec![
            PlanStep {
                id: 1,
                kind: StepKind::ModelGenerate,
                model: Some("general-small".to_string()),
                tool: None,
                inputs: generate_inputs,
                depends_on: BTreeSet::new(),
                on_low_confidence: None,
            },
            PlanStep {
                id: 2,
                kind: StepKind::ToolCall,
                model: None,
                tool: Some("word_count".to_string()),
                inputs: tool_inputs,
                depends_on: [1].into_iter().collect(),
                on_low_confidence: None,
            },
            PlanStep {
                id: 3,
                kind: StepKind::ConfidenceCheck,
                model: None,
                tool: None,
                inputs: HashMap::new(),
                depends_on: [1].into_iter().collect(),
                on_low_confidence: None,
            },
            PlanStep {
                id: 4,
                kind: StepKind::Aggregate,
                model: None,
                tool: None,
                inputs: HashMap::new(),
                depends_on: [2, 3].into_iter().collect(),
                on_low_confidence: None,
            },
        ],
    }
}

#[tokio::test]
async fn complex_plan_runs_tool_and_confidence_steps_to_an_aggregate() {
    let orchestrator = test_orchestrator();
    let request = AgentRequest::new("Tell me about the history of Rome");
    let decision = RoutingDecision {
        path: Path::Complex,
        complexity: 0.9,
        confidence: 0.7,
        reason: "research request needing a tool".to_string(),
        recommended: vec!["general-small".to_string()],
        required_tools: ["word_count".to_string()].into_iter().collect(),
        action_plan: Some(four_step_plan()),
    };

    let mut rx = orchestrator.execute(request, decision, CancellationHandle::new());

    let mut tool_call_seen = false;
    let mut tool_result_seen = false;
    let mut step_completions = Vec::new();
    let mut terminal = None;

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ToolCall { tool, .. } => {
                assert_eq!(tool, "word_count");
                tool_call_seen = true;
            }
            Event::ToolResult { error, .. } => {
                assert!(error.is_none());
                tool_result_seen = true;
            }
            Event::StepComplete { step_id, .. } => step_completions.push(*step_id),
            Event::Done { .. } | Event::Error { .. } => terminal = Some(event),
            _ => {}
        }
    }

    assert!(tool_call_seen);
    assert!(tool_result_seen);
    assert!(step_completions.contains(&2));
    assert!(step_completions.contains(&3));
    assert!(step_completions.contains(&4));
    match terminal {
        Some(Event::Done { final_text, .. }) => assert!(!final_text.is_empty()),
        other => panic!("expected Done, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_tool_in_plan_is_rejected_before_execution() {
    let orchestrator = test_orchestrator();
    let request = AgentRequest::new("hi");
    let mut plan = four_step_plan();
    plan.steps[1].tool = Some("does-not-exist".to_string());
    let decision = RoutingDecision {
        path: Path::Complex,
        complexity: 0.9,
        confidence: 0.7,
        reason: "bogus tool".to_string(),
        recommended: vec!["general-small".to_string()],
        required_tools: BTreeSet::new(),
        action_plan: Some(plan),
    };

    let err = orchestrator
        .execute_blocking(request, decision, CancellationHandle::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}
