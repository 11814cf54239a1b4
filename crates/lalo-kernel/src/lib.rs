//! Shared types and pure logic used across every LALO crate: the error
//! taxonomy, the streamed event vocabulary, the generic DAG plan executor,
//! the confidence validator, the tool executor interface, and the
//! telemetry sink trait + default implementations.

// error taxonomy (spec §7)
pub mod error;

// streamed Event vocabulary (spec §3, §6)
pub mod event;

// Routing Decision, PlanStep, and the DAG/wavefront executor (spec §3, §4.5)
pub mod plan;

// Confidence Validator (spec §4.6)
pub mod validator;

// Tool Executor interface (spec §4.7)
pub mod tools;

// Telemetry Sink + Usage Repository (spec §4.9)
pub mod telemetry;

// Unified configuration loader (multi-format, env substitution, merge)
#[cfg(feature = "config")]
pub mod config;
