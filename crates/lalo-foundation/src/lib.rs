#![allow(dead_code)]
//! Model Registry, Router, Cloud Adapter, and hardware detection — the
//! components responsible for knowing what models exist, which one a
//! request should use, and how to reach the cloud-hosted ones.
//!
//! The Local Inference Pool (`lalo-local-llm`) depends on this crate for
//! [`registry`], not the other way around, so that the pool and the cloud
//! adapter can both be swapped independently behind the Router.

pub mod cloud;
pub mod config;
pub mod hardware;
pub mod registry;
pub mod router;

pub use cloud::{CloudAdapter, CloudCompletionRequest, CloudCompletionResponse, HttpCloudAdapter};
pub use config::{CatalogueEntry, LaloConfig, ModelCatalogue};
pub use hardware::{detect_hardware, CpuFamily, HardwareCapability, OsClassification};
pub use registry::{Backend, ModelDescriptor, ModelDescriptorBuilder, ModelRegistry, Specialty};
pub use router::{Classifier, HeuristicRouter, NoClassifier, Router};
