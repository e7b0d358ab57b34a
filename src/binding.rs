//! Binding table
//!
//! Resolves every named input/output tensor to its fixed slot index in the
//! compiled plan and allocates one device region per slot, sized to the
//! tensor's byte footprint. Built exactly once per session; `run()` reuses
//! the same regions on every invocation. Slots owned by no named tensor stay
//! `None` and are never touched.

use std::collections::HashMap;

use tracing::debug;

use crate::backend::{DevicePlan, DeviceRegion, DeviceRuntime};
use crate::error::{PlanForgeError, PlanResult};
use crate::lowering::Lowering;
use crate::tensor::{HostBuffer, HostTensor};

/// One resolved tensor binding
#[derive(Debug, Clone)]
pub struct BoundTensor {
    pub name: String,
    pub slot: usize,
    /// Byte footprint captured at build time; re-validated on every run
    pub byte_len: usize,
    /// Shared handle to the caller's host memory
    pub host: HostBuffer,
}

/// Flat slot array plus the resolved input/output bindings
pub struct BindingTable {
    slots: Vec<Option<Box<dyn DeviceRegion>>>,
    inputs: Vec<BoundTensor>,
    outputs: Vec<BoundTensor>,
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("slot_count", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl BindingTable {
    /// Resolve and allocate all bindings. Fails with a structural error if
    /// the plan lacks a slot for any named tensor.
    pub fn build(
        runtime: &dyn DeviceRuntime,
        lowering: &dyn Lowering,
        plan: &dyn DevicePlan,
        device_id: usize,
        input_table: &HashMap<String, HostTensor>,
        output_table: &HashMap<String, HostTensor>,
    ) -> PlanResult<Self> {
        let mut slots: Vec<Option<Box<dyn DeviceRegion>>> = Vec::new();
        slots.resize_with(plan.binding_count(), || None);

        let mut resolve = |table: &HashMap<String, HostTensor>,
                           slots: &mut Vec<Option<Box<dyn DeviceRegion>>>,
                           mangle: &dyn Fn(&str) -> String|
         -> PlanResult<Vec<BoundTensor>> {
            let mut names: Vec<_> = table.keys().collect();
            names.sort();

            let mut bound = Vec::with_capacity(names.len());
            for name in names {
                let tensor = &table[name];
                let slot = plan
                    .binding_index(&mangle(name))
                    .ok_or_else(|| PlanForgeError::TensorNotFound(name.clone()))?;
                let byte_len = tensor.byte_len();
                slots[slot] = Some(runtime.allocate(device_id, byte_len)?);
                debug!(tensor = %name, slot, byte_len, "bound tensor");
                bound.push(BoundTensor {
                    name: name.clone(),
                    slot,
                    byte_len,
                    host: tensor.buffer(),
                });
            }
            Ok(bound)
        };

        let inputs = resolve(input_table, &mut slots, &|n| lowering.input_binding_name(n))?;
        let outputs = resolve(output_table, &mut slots, &|n| {
            lowering.output_binding_name(n)
        })?;

        Ok(Self {
            slots,
            inputs,
            outputs,
        })
    }

    /// Borrowed slot array in plan index order, for execution
    pub fn slot_refs(&self) -> Vec<Option<&dyn DeviceRegion>> {
        self.slots.iter().map(|s| s.as_deref()).collect()
    }

    /// Device region backing a resolved binding
    pub fn region(&self, binding: &BoundTensor) -> &dyn DeviceRegion {
        self.slots[binding.slot]
            .as_deref()
            .expect("resolved binding always has a region")
    }

    pub fn inputs(&self) -> &[BoundTensor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[BoundTensor] {
        &self.outputs
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
