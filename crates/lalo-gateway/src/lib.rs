//! LALO Request Handler facade: the HTTP/SSE front door over the Router and
//! Agent Orchestrator.
//!
//! This crate owns exactly one process-scoped [`state::LaloContext`]
//! (Registry, Pool, Cloud Adapter, Tool Executor, Validator, Telemetry Sink,
//! Usage Repository, Router, Orchestrator), built once at startup and
//! shared through axum's `State` extractor.
//!
//! # Endpoints
//!
//! | Method | Path                 | Description                                   |
//! |--------|----------------------|------------------------------------------------|
//! | `POST` | `/ai/chat`           | Non-streaming chat; buffers to one response    |
//! | `POST` | `/ai/chat/stream`    | SSE stream of orchestrator events              |
//! | `GET`  | `/ai/models`         | Model descriptors visible to the caller        |
//! | `POST` | `/ai/feedback`       | Record feedback on a past response             |
//! | `GET`  | `/health`            | Liveness probe                                 |
//! | `GET`  | `/ready`             | Readiness probe                                |
//!
//! Building a [`LaloContext`] from scratch wires every collaborator
//! described above; see `main.rs` for the reference wiring against
//! [`lalo_foundation::LaloConfig`] and a model catalogue file.

pub mod classifier;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use classifier::PoolClassifier;
pub use error::{ApiError, ApiResult};
pub use middleware::RateLimiter;
pub use server::{GatewayConfig, GatewayServer};
pub use state::LaloContext;
