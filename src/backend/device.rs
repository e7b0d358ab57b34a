//! Device runtime contracts
//!
//! Trait seams over the accelerator toolkit: device enumeration, memory,
//! streams, plan compilation and execution. Every call returns a
//! [`DeviceResult`]; runtime failures surface to the caller as errors, never
//! as process aborts. Regions and streams are owned types released on drop,
//! so no raw handle escapes an error path.

use std::any::Any;

use thiserror::Error;

use crate::tensor::HostBuffer;

/// Errors reported by an accelerator runtime
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("device memory allocation failed: {0}")]
    AllocationFailed(String),
    #[error("memory copy failed: {0}")]
    CopyFailed(String),
    #[error("stream failure: {0}")]
    StreamFailed(String),
    #[error("network compilation failed: {0}")]
    CompilationFailed(String),
    #[error("plan execution failed: {0}")]
    ExecutionFailed(String),
    #[error("plan deserialization failed: {0}")]
    DeserializationFailed(String),
    #[error("graph lowering failed: {0}")]
    LoweringFailed(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Static properties of one device
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    /// Device model name; participates in the plan fingerprint
    pub name: String,
    /// Whether reduced-precision arithmetic is available
    pub supports_reduced_precision: bool,
}

/// Settings applied to the plan builder before compilation
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub max_batch_size: usize,
    /// Scratch memory budget for the builder, in bytes
    pub workspace_limit: usize,
    /// Use reduced-precision arithmetic
    pub reduced_precision: bool,
    /// Reject layers that cannot honor the requested precision
    pub strict_precision: bool,
}

/// Opaque network representation produced by lowering, consumed once by
/// [`DeviceRuntime::compile_network`] and discarded.
pub trait LoweredNetwork: Send {
    fn as_any(&self) -> &dyn Any;
}

/// Exclusively owned device memory region. Freed on drop.
pub trait DeviceRegion: Send + Sync {
    /// Region size in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_any(&self) -> &dyn Any;
}

/// A compiled, device-executable plan
pub trait DevicePlan: Send + Sync {
    /// Slot index for a mangled binding name, if the plan has one
    fn binding_index(&self, name: &str) -> Option<usize>;

    /// Total number of binding slots the plan requires
    fn binding_count(&self) -> usize;

    /// Serialize the plan for on-disk persistence
    fn serialize(&self) -> DeviceResult<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn DevicePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePlan")
            .field("binding_count", &self.binding_count())
            .finish_non_exhaustive()
    }
}

/// One asynchronous work queue. Queued copies and executions become
/// observable only after [`DeviceStream::synchronize`] returns; the queue
/// preserves submission order.
pub trait DeviceStream {
    /// Queue a host-to-device copy of `src` into `dst`. The bytes are
    /// captured at queue time.
    fn copy_to_device(&mut self, dst: &dyn DeviceRegion, src: &[u8]) -> DeviceResult<()>;

    /// Queue a device-to-host copy of exactly `len` bytes from `src` into
    /// the shared host buffer `dst`.
    fn copy_from_device(
        &mut self,
        dst: HostBuffer,
        src: &dyn DeviceRegion,
        len: usize,
    ) -> DeviceResult<()>;

    /// Queue plan execution over the full slot array at the given batch size
    fn execute(
        &mut self,
        plan: &dyn DevicePlan,
        batch_size: usize,
        slots: &[Option<&dyn DeviceRegion>],
    ) -> DeviceResult<()>;

    /// Barrier: run all queued work to completion
    fn synchronize(&mut self) -> DeviceResult<()>;
}

/// The accelerator runtime itself
pub trait DeviceRuntime: Send + Sync {
    /// Number of available devices
    fn device_count(&self) -> DeviceResult<usize>;

    /// Properties of one device; `device_id` must be in range
    fn device_properties(&self, device_id: usize) -> DeviceResult<DeviceProperties>;

    /// Allocate a device memory region of `bytes` on `device_id`
    fn allocate(&self, device_id: usize, bytes: usize) -> DeviceResult<Box<dyn DeviceRegion>>;

    /// Create a fresh asynchronous stream on `device_id`
    fn create_stream(&self, device_id: usize) -> DeviceResult<Box<dyn DeviceStream>>;

    /// Compile a lowered network into an executable plan, consuming the
    /// network representation.
    fn compile_network(
        &self,
        network: Box<dyn LoweredNetwork>,
        settings: &BuilderSettings,
    ) -> DeviceResult<Box<dyn DevicePlan>>;

    /// Reconstruct a plan from serialized bytes
    fn deserialize_plan(&self, bytes: &[u8]) -> DeviceResult<Box<dyn DevicePlan>>;
}
