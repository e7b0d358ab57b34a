//! PlanForge - graph-to-plan inference engine
//!
//! Compiles a typed computation graph into a reusable, device-resident
//! execution plan, caches compiled plans on disk keyed by a content
//! fingerprint, and executes them repeatedly against caller-supplied
//! tensors. The accelerator runtime and the graph lowering service sit
//! behind trait seams; a host-only reference implementation ships with the
//! crate for tests and experimentation.

pub mod backend;
pub mod binding;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod logging;
pub mod lowering;
pub mod profiling;
pub mod session;
pub mod tensor;

pub use backend::{DeviceError, DeviceRuntime, ReferenceLowering, ReferenceRuntime};
pub use cache::PlanCache;
pub use config::SessionConfig;
pub use error::{ErrorCategory, PlanForgeError, PlanResult};
pub use fingerprint::compute_fingerprint;
pub use graph::{Attribute, Graph, ModelGraph, Node};
pub use lowering::Lowering;
pub use session::InferenceSession;
pub use tensor::{ElementType, HostTensor};
