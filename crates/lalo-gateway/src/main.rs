//! `lalo-gateway` — entry point for the Request Handler facade.
//!
//! Loads [`LaloConfig`], builds a Model Registry from a declarative
//! catalogue file, wires every core collaborator, and serves the HTTP/SSE
//! surface described in `lalo_gateway::server`.

use clap::Parser;
use lalo_foundation::cloud::HttpCloudAdapter;
use lalo_foundation::router::{NoClassifier, Router as FoundationRouter};
use lalo_foundation::{LaloConfig, ModelCatalogue, ModelRegistry, Specialty};
use lalo_gateway::classifier::{ConfiguredClassifier, PoolClassifier};
use lalo_gateway::{GatewayConfig, GatewayServer, LaloContext, RateLimiter};
use lalo_kernel::telemetry::{InMemoryUsageRepository, JsonlTelemetrySink, TelemetrySink, TracingTelemetrySink, UsageRepository};
use lalo_kernel::validator::{ConfidenceValidator, ValidatorConfig};
use lalo_local_llm::{LocalInferencePool, PoolConfig};
use lalo_orchestrator::Orchestrator;
use lalo_smith::SmithToolExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lalo-gateway", about = "LALO request router and multi-agent orchestrator facade")]
struct Cli {
    /// Path to a LALO config file (TOML/YAML/JSON/INI/RON/JSON5). Falls
    /// back to spec defaults when absent.
    #[arg(long, env = "LALO_CONFIG", default_value = "lalo.toml")]
    config: String,

    /// Path to a YAML model catalogue (spec §4.1). Omit to run with an
    /// empty registry (every request then returns `model_unavailable`).
    #[arg(long, env = "LALO_MODELS")]
    models: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "LALO_PORT", default_value_t = 8080)]
    port: u16,

    /// Append Usage Records to this JSONL file in addition to structured
    /// `tracing` logging. Omit to log only.
    #[arg(long, env = "LALO_USAGE_LOG")]
    usage_log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lalo_gateway=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    let config = LaloConfig::load_or_default(&cli.config);

    let descriptors = match &cli.models {
        Some(path) => ModelCatalogue::load_yaml_file(path)?,
        None => {
            tracing::warn!("no --models catalogue given; starting with an empty Model Registry");
            Vec::new()
        }
    };
    let registry = Arc::new(ModelRegistry::from_descriptors(descriptors));

    let pool = Arc::new(LocalInferencePool::new(registry.clone(), PoolConfig::from_lalo_config(&config)));
    let cloud = Arc::new(HttpCloudAdapter::new());
    let tools = Arc::new(SmithToolExecutor::default());
    let validator = Arc::new(ConfidenceValidator::new(ValidatorConfig {
        accept_threshold: config.confidence_accept_threshold,
        escalate_threshold: config.confidence_escalate_threshold,
        evasive_patterns: if config.evasive_patterns.is_empty() {
            lalo_kernel::validator::default_evasive_patterns()
        } else {
            config.evasive_patterns.clone()
        },
    }));

    let telemetry: Arc<dyn TelemetrySink> = match &cli.usage_log {
        Some(path) => {
            tracing::info!(path = %path, "usage records will be appended to this file");
            Arc::new(JsonlTelemetrySink::new(path))
        }
        None => Arc::new(TracingTelemetrySink),
    };
    let usage_repo: Arc<dyn UsageRepository> = Arc::new(InMemoryUsageRepository::new());

    let has_routing_model = registry.list(Some(Specialty::Routing)).into_iter().any(|d| !d.unavailable);
    let router = Arc::new(if has_routing_model {
        FoundationRouter::new(ConfiguredClassifier::Pool(PoolClassifier::new(
            pool.clone(),
            registry.clone(),
            config.default_routing_model.clone(),
        )))
    } else {
        FoundationRouter::new(ConfiguredClassifier::None(NoClassifier))
    });

    let orchestrator = Orchestrator::new(
        registry.clone(),
        pool.clone(),
        cloud.clone(),
        tools.clone(),
        validator.clone(),
        telemetry.clone(),
        usage_repo.clone(),
        config.clone(),
    );

    let rate_limiter = Arc::new(RateLimiter::new(120, Duration::from_secs(60)));

    let context = LaloContext::new(
        config,
        registry,
        pool,
        cloud,
        tools,
        validator,
        telemetry,
        usage_repo,
        router,
        orchestrator,
        rate_limiter,
    );

    tokio::spawn(lalo_gateway::server::run_rate_limiter_gc(context.clone(), Duration::from_secs(60)));

    let server = GatewayServer::new(GatewayConfig { port: cli.port }, context);
    server.start().await?;
    Ok(())
}
