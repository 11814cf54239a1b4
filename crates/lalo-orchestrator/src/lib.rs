#![allow(dead_code)]
//! Agent Orchestrator (spec §4.5): the component that takes a Router
//! decision and a request and drives them to a streamed, terminal outcome
//! — choosing the simple or complex path, retrying across candidate models,
//! gating on the Confidence Validator, and invoking tools along the way.
//!
//! The Request Handler façade (`lalo-gateway`) is the only intended caller
//! of [`Orchestrator`]; everything else in this crate is implementation
//! detail behind that one entry point.

mod generate;
pub mod orchestrator;
mod plan_exec;
pub mod request;
mod simple;
pub mod usage;

pub use lalo_kernel::event::{ConfidenceScoresView, Event, UsageView};
pub use orchestrator::Orchestrator;
pub use request::{provider_key, AgentRequest};
pub use usage::UsageSummary;
