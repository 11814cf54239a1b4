//! Cross-cutting axum middleware: currently just per-client rate limiting.
//! Authentication and request logging are handled directly in `server.rs`
//! via `tower-http`'s `TraceLayer` and a small bearer-token extractor,
//! rather than a bespoke filter-pipeline abstraction.

pub mod rate_limit;

pub use rate_limit::RateLimiter;
