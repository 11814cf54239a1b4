//! Local Inference Pool (spec §4.2): owns local model handles, serialises
//! concurrent generation per model, and exposes blocking and streaming
//! `generate`.
//!
//! Grounded on `inference::model_pool::ModelPool`'s LRU-with-budget
//! eviction, generalised from a synchronous `HashMap` to handles backed by
//! memory-mapped weight files behind a per-id initialisation lock, and on
//! `inference_backend::InferenceBackend`'s trait-at-the-seam style for the
//! actual compute step — the pool itself only owns scheduling, loading,
//! and streaming; "how a token gets produced" is pluggable.

use crate::config::PoolConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use lalo_foundation::registry::ModelDescriptor;
use lalo_foundation::ModelRegistry;
use lalo_kernel::error::LaloError;
use lalo_kernel::telemetry::estimate_tokens;
use memmap2::Mmap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::mpsc;

/// One request to generate text from a local model (spec §3 "Request",
/// narrowed to the fields the pool needs).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model_id: String,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// One item of a streaming generation (spec §4.2 "Streaming contract").
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    Token(String),
    Error(LaloError),
}

/// Cooperative cancellation handle threaded Handler → Orchestrator → Pool
/// (spec §5). Checked between emitted tokens; never forces a generation
/// to stop mid-token.
#[derive(Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The actual compute step, pluggable so the pool's scheduling/loading
/// logic can be exercised without a real GGUF inference engine linked in.
/// The production default ([`PlaceholderGenerationBackend`]) is a stand-in
/// for wiring a real engine (llama.cpp/candle) behind this same seam.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn compute(&self, model_id: &str, mmap: &Mmap, prompt: &str, max_output_tokens: u32) -> String;
}

/// Placeholder compute path for a model whose weights are mapped but no
/// real inference engine is wired in yet — mirrors the
/// `run_inference_stub` idiom (per-backend stub functions documented as
/// "replace this with real backend calls").
pub struct PlaceholderGenerationBackend;

#[async_trait]
impl GenerationBackend for PlaceholderGenerationBackend {
    async fn compute(&self, model_id: &str, mmap: &Mmap, prompt: &str, _max_output_tokens: u32) -> String {
        let word_count = prompt.split_whitespace().count();
        format!(
            "[{model_id}] generated response for a {word_count}-word prompt over {} bytes of \
             mapped weights (placeholder compute path — wire a real inference engine here)",
            mmap.len()
        )
    }
}

/// A loaded local model: its memory-mapped weights plus the per-model
/// serialisation lock and LRU bookkeeping the pool needs.
struct ModelEntry {
    mmap: Mmap,
    weight_bytes: u64,
    /// Serialises generations against this handle — "at most one
    /// concurrent generation per handle" (spec §3, §5, §8 invariant).
    generation_lock: tokio::sync::Mutex<()>,
    last_used: StdMutex<Instant>,
}

fn mmap_weights(path: &str) -> std::io::Result<Mmap> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the mapped file is not expected to be mutated concurrently by
    // another process for the lifetime of the handle; this is the same
    // trust boundary every mmap-based model loader in this ecosystem
    // accepts.
    unsafe { Mmap::map(&file) }
}

/// Owns local model handles, serialises per-model generation, and exposes
/// blocking and streaming generate (spec §4.2).
pub struct LocalInferencePool {
    registry: Arc<ModelRegistry>,
    config: PoolConfig,
    backend: Arc<dyn GenerationBackend>,
    handles: StdMutex<HashMap<String, Arc<ModelEntry>>>,
    init_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl LocalInferencePool {
    pub fn new(registry: Arc<ModelRegistry>, config: PoolConfig) -> Self {
        Self::with_backend(registry, config, Arc::new(PlaceholderGenerationBackend))
    }

    pub fn with_backend(registry: Arc<ModelRegistry>, config: PoolConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            registry,
            config,
            backend,
            handles: StdMutex::new(HashMap::new()),
            init_locks: DashMap::new(),
        }
    }

    /// Whether demo mode is short-circuiting real inference (spec §4.2:
    /// "its activation is surfaced in the Routing Decision and Telemetry").
    pub fn demo_mode(&self) -> bool {
        self.config.demo_mode
    }

    /// Blocking-style generate: drains the stream and concatenates tokens,
    /// or returns the first error encountered (spec §4.2).
    pub async fn generate(&self, request: GenerationRequest, cancel: &CancellationHandle) -> Result<String, LaloError> {
        let mut rx = self.generate_stream(request, cancel.clone()).await?;
        let mut out = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                GenerationEvent::Token(text) => out.push_str(&text),
                GenerationEvent::Error(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// Streaming generate: tokens are emitted as soon as produced; the
    /// channel closing marks end-of-stream; an error mid-stream is
    /// terminal (spec §4.2 "Streaming contract").
    pub async fn generate_stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationHandle,
    ) -> Result<mpsc::Receiver<GenerationEvent>, LaloError> {
        let (tx, rx) = mpsc::channel(self.config.stream_channel_capacity);

        if self.config.demo_mode {
            let text = crate::demo::generate(&request.prompt);
            tokio::spawn(async move {
                stream_text(text, tx, cancel).await;
            });
            return Ok(rx);
        }

        let descriptor = self
            .registry
            .lookup(&request.model_id)
            .cloned()
            .ok_or_else(|| LaloError::ModelUnavailable(request.model_id.clone()))?;
        if descriptor.unavailable {
            return Err(LaloError::ModelUnavailable(request.model_id.clone()));
        }

        let prompt_tokens = estimate_tokens(&request.prompt);
        if !descriptor.fits(prompt_tokens, request.max_output_tokens) {
            return Err(LaloError::ContextOverflow);
        }

        let entry = self.get_or_load_handle(&descriptor).await?;
        let backend = self.backend.clone();
        let model_id = request.model_id.clone();
        let prompt = request.prompt.clone();
        let max_output_tokens = request.max_output_tokens;

        tokio::spawn(async move {
            // One generation at a time per handle (spec §3, §5, §8).
            let _permit = entry.generation_lock.lock().await;
            *entry.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
            if cancel.is_cancelled() {
                let _ = tx.send(GenerationEvent::Error(LaloError::Cancelled)).await;
                return;
            }
            let text = backend.compute(&model_id, &entry.mmap, &prompt, max_output_tokens).await;
            stream_text(text, tx, cancel).await;
        });

        Ok(rx)
    }

    /// Lazily creates a handle for `descriptor`, serialising concurrent
    /// first callers on a per-id lock so only one of them actually loads
    /// (spec §4.2). Requests for *different* models may load concurrently.
    async fn get_or_load_handle(&self, descriptor: &ModelDescriptor) -> Result<Arc<ModelEntry>, LaloError> {
        if let Some(entry) = self.touch_if_loaded(&descriptor.id) {
            return Ok(entry);
        }

        let init_lock = self
            .init_locks
            .entry(descriptor.id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _init_guard = init_lock.lock().await;

        // Another caller may have finished loading while we waited.
        if let Some(entry) = self.touch_if_loaded(&descriptor.id) {
            return Ok(entry);
        }

        let needed_bytes = (descriptor.weight_bytes as f64 * 1.2) as u64;
        self.make_room(needed_bytes, &descriptor.id)?;

        let path = descriptor.file_path_or_remote_name.clone();
        let load = tokio::task::spawn_blocking(move || mmap_weights(&path));
        let mmap = match tokio::time::timeout(self.config.model_load_timeout, load).await {
            Err(_elapsed) => {
                return Err(LaloError::ModelLoadTimeout {
                    model_id: descriptor.id.clone(),
                    timeout_secs: self.config.model_load_timeout.as_secs(),
                });
            }
            Ok(Err(_join_err)) => {
                return Err(LaloError::internal(format!("model load task panicked for '{}'", descriptor.id)));
            }
            Ok(Ok(Err(io_err))) => {
                return Err(LaloError::ModelUnavailable(format!("{}: {io_err}", descriptor.id)));
            }
            Ok(Ok(Ok(mmap))) => mmap,
        };

        let entry = Arc::new(ModelEntry {
            mmap,
            weight_bytes: descriptor.weight_bytes,
            generation_lock: tokio::sync::Mutex::new(()),
            last_used: StdMutex::new(Instant::now()),
        });
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).insert(descriptor.id.clone(), entry.clone());
        Ok(entry)
    }

    fn touch_if_loaded(&self, id: &str) -> Option<Arc<ModelEntry>> {
        let handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        let entry = handles.get(id)?;
        *entry.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        Some(entry.clone())
    }

    /// Evicts idle least-recently-used handles until `needed_bytes` fits
    /// under the memory budget, or fails with `insufficient_memory` if
    /// every remaining handle is in use (spec §5 "Resource policy").
    fn make_room(&self, needed_bytes: u64, loading_id: &str) -> Result<(), LaloError> {
        loop {
            let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            let current: u64 = handles.values().map(|e| (e.weight_bytes as f64 * 1.2) as u64).sum();
            if current + needed_bytes <= self.config.memory_budget_bytes {
                return Ok(());
            }
            let victim = handles
                .iter()
                .filter(|(id, entry)| id.as_str() != loading_id && entry.generation_lock.try_lock().is_ok())
                .min_by_key(|(_, entry)| *entry.last_used.lock().unwrap_or_else(|e| e.into_inner()))
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    handles.remove(&id);
                }
                None => {
                    return Err(LaloError::InsufficientMemory(format!(
                        "cannot fit model '{loading_id}' within the configured memory budget; no idle handle to evict"
                    )));
                }
            }
        }
    }
}

async fn stream_text(text: String, tx: mpsc::Sender<GenerationEvent>, cancel: CancellationHandle) {
    for chunk in text.split_inclusive(' ') {
        if cancel.is_cancelled() {
            return;
        }
        if tx.send(GenerationEvent::Token(chunk.to_string())).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lalo_foundation::registry::{Backend, Specialty};

    fn registry_with_file(id: &str, path: &std::path::Path, weight_bytes: u64) -> Arc<ModelRegistry> {
        let descriptor = ModelDescriptor::builder(id, Backend::LocalGguf)
            .file_or_remote_name(path.to_string_lossy())
            .context_window(4096)
            .weight_bytes(weight_bytes)
            .specialty(Specialty::General)
            .build();
        Arc::new(ModelRegistry::from_descriptors(vec![descriptor]))
    }

    #[tokio::test]
    async fn demo_mode_is_deterministic_and_skips_the_registry() {
        let registry = Arc::new(ModelRegistry::new());
        let mut config = PoolConfig::default();
        config.demo_mode = true;
        let pool = LocalInferencePool::new(registry, config);
        let request = GenerationRequest {
            model_id: "anything".into(),
            prompt: "What is 2+2?".into(),
            max_output_tokens: 64,
            temperature: 0.0,
            top_p: 1.0,
        };
        let out = pool.generate(request.clone(), &CancellationHandle::new()).await.unwrap();
        assert!(out.contains('4'));
        let out2 = pool.generate(request, &CancellationHandle::new()).await.unwrap();
        assert_eq!(out, out2);
    }

    #[tokio::test]
    async fn unknown_model_is_model_unavailable() {
        let registry = Arc::new(ModelRegistry::new());
        let pool = LocalInferencePool::new(registry, PoolConfig::default());
        let request = GenerationRequest {
            model_id: "ghost".into(),
            prompt: "hi".into(),
            max_output_tokens: 16,
            temperature: 0.0,
            top_p: 1.0,
        };
        let err = pool.generate(request, &CancellationHandle::new()).await.unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[tokio::test]
    async fn prompt_exceeding_context_window_overflows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.gguf");
        std::fs::write(&path, vec![0u8; 16]).unwrap();
        let registry = registry_with_file("small-ctx", &path, 16);
        // Build a registry whose only model has a tiny context window.
        let descriptor = ModelDescriptor::builder("small-ctx", Backend::LocalGguf)
            .file_or_remote_name(path.to_string_lossy())
            .context_window(4)
            .weight_bytes(16)
            .build();
        let registry = Arc::new(ModelRegistry::from_descriptors(vec![descriptor]));
        let _ = registry.clone();
        let pool = LocalInferencePool::new(registry, PoolConfig::default());
        let request = GenerationRequest {
            model_id: "small-ctx".into(),
            prompt: "this prompt has more than four words in it".into(),
            max_output_tokens: 100,
            temperature: 0.0,
            top_p: 1.0,
        };
        let err = pool.generate(request, &CancellationHandle::new()).await.unwrap_err();
        assert_eq!(err.kind(), "context_overflow");
    }

    #[tokio::test]
    async fn loads_and_generates_from_a_real_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.gguf");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        let registry = registry_with_file("local-1", &path, 4096);
        let pool = LocalInferencePool::new(registry, PoolConfig::default());
        let request = GenerationRequest {
            model_id: "local-1".into(),
            prompt: "hello world".into(),
            max_output_tokens: 32,
            temperature: 0.0,
            top_p: 1.0,
        };
        let out = pool.generate(request, &CancellationHandle::new()).await.unwrap();
        assert!(out.contains("local-1"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream() {
        let registry = Arc::new(ModelRegistry::new());
        let mut config = PoolConfig::default();
        config.demo_mode = true;
        let pool = LocalInferencePool::new(registry, config);
        let cancel = CancellationHandle::new();
        cancel.cancel();
        let request = GenerationRequest {
            model_id: "anything".into(),
            prompt: "Tell me a long story".into(),
            max_output_tokens: 64,
            temperature: 0.0,
            top_p: 1.0,
        };
        let mut rx = pool.generate_stream(request, cancel).await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn memory_budget_evicts_least_recently_used_idle_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.gguf");
        let path_b = dir.path().join("b.gguf");
        std::fs::write(&path_a, vec![0u8; 1024]).unwrap();
        std::fs::write(&path_b, vec![0u8; 1024]).unwrap();

        let descriptor_a = ModelDescriptor::builder("model-a", Backend::LocalGguf)
            .file_or_remote_name(path_a.to_string_lossy())
            .context_window(4096)
            .weight_bytes(1_000_000)
            .build();
        let descriptor_b = ModelDescriptor::builder("model-b", Backend::LocalGguf)
            .file_or_remote_name(path_b.to_string_lossy())
            .context_window(4096)
            .weight_bytes(1_000_000)
            .build();
        let registry = Arc::new(ModelRegistry::from_descriptors(vec![descriptor_a, descriptor_b]));

        let mut config = PoolConfig::default();
        // Budget fits one handle (1_000_000 * 1.2) but not two.
        config.memory_budget_bytes = 1_300_000;
        let pool = LocalInferencePool::new(registry, config);

        let req = |id: &str| GenerationRequest {
            model_id: id.into(),
            prompt: "hi".into(),
            max_output_tokens: 8,
            temperature: 0.0,
            top_p: 1.0,
        };

        pool.generate(req("model-a"), &CancellationHandle::new()).await.unwrap();
        pool.generate(req("model-b"), &CancellationHandle::new()).await.unwrap();

        let handles = pool.handles.lock().unwrap();
        assert_eq!(handles.len(), 1);
        assert!(handles.contains_key("model-b"));
    }
}
