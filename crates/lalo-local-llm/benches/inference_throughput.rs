//! Inference throughput benchmark for the Local Inference Pool.
//!
//! Compares demo-mode generation against the placeholder mmap-backed compute
//! path so regressions in pool scheduling overhead show up independently of
//! whatever real inference engine eventually replaces
//! [`lalo_local_llm::PlaceholderGenerationBackend`].
//!
//! Run with: `cargo bench -p lalo-local-llm`

use lalo_foundation::registry::{Backend, ModelDescriptor, Specialty};
use lalo_foundation::ModelRegistry;
use lalo_local_llm::{CancellationHandle, GenerationRequest, LocalInferencePool, PoolConfig};
use std::sync::Arc;
use std::time::Instant;

const PROMPTS: &[&str] = &[
    "explain the difference between CUDA and ROCm in two sentences",
    "what is the capital of France",
    "write a haiku about inference speed",
];

async fn bench_demo_mode() {
    let registry = Arc::new(ModelRegistry::new());
    let mut config = PoolConfig::default();
    config.demo_mode = true;
    let pool = LocalInferencePool::new(registry, config);

    let start = Instant::now();
    let mut total_tokens = 0usize;
    for prompt in PROMPTS {
        let request = GenerationRequest {
            model_id: "bench-demo".into(),
            prompt: prompt.to_string(),
            max_output_tokens: 128,
            temperature: 0.0,
            top_p: 1.0,
        };
        let out = pool.generate(request, &CancellationHandle::new()).await.unwrap();
        total_tokens += out.split_whitespace().count();
    }
    report("demo_mode", PROMPTS.len(), total_tokens, start.elapsed());
}

async fn bench_placeholder_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench-model.gguf");
    std::fs::write(&path, vec![0u8; 4096]).unwrap();

    let descriptor = ModelDescriptor::builder("bench-local", Backend::LocalGguf)
        .file_or_remote_name(path.to_string_lossy())
        .context_window(8192)
        .weight_bytes(4096)
        .specialty(Specialty::General)
        .build();
    let registry = Arc::new(ModelRegistry::from_descriptors(vec![descriptor]));
    let pool = LocalInferencePool::new(registry, PoolConfig::default());

    let start = Instant::now();
    let mut total_tokens = 0usize;
    for prompt in PROMPTS {
        let request = GenerationRequest {
            model_id: "bench-local".into(),
            prompt: prompt.to_string(),
            max_output_tokens: 128,
            temperature: 0.0,
            top_p: 1.0,
        };
        let out = pool.generate(request, &CancellationHandle::new()).await.unwrap();
        total_tokens += out.split_whitespace().count();
    }
    report("placeholder_backend", PROMPTS.len(), total_tokens, start.elapsed());
}

fn report(label: &str, prompt_count: usize, total_tokens: usize, elapsed: std::time::Duration) {
    println!(
        "{label} | prompts={prompt_count} tokens={total_tokens} elapsed={:.2}ms throughput={:.1} tok/s",
        elapsed.as_secs_f64() * 1000.0,
        total_tokens as f64 / elapsed.as_secs_f64().max(0.001),
    );
}

fn main() {
    println!("=== lalo-local-llm inference throughput benchmark ===");
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(bench_demo_mode());
    rt.block_on(bench_placeholder_backend());
}
