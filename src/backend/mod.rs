//! Accelerator runtime seam

pub mod device;
pub mod reference;

pub use device::{
    BuilderSettings, DeviceError, DevicePlan, DeviceProperties, DeviceRegion, DeviceResult,
    DeviceRuntime, DeviceStream, LoweredNetwork,
};
pub use reference::{ReferenceDevice, ReferenceLowering, ReferenceRuntime};
