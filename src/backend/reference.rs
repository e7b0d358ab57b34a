//! Host-only reference runtime
//!
//! Implements the device seam entirely on the host: regions are plain byte
//! buffers, streams queue closures and run them at `synchronize()`, and a
//! compiled plan is an interpreter over a small operator set (`Identity`,
//! `Relu`, `Add`, `Scale`). This is the runtime the test suite and the demo
//! binary run against; a hardware runtime plugs into the same traits.
//!
//! The queued-stream model matters: nothing a stream is asked to do is
//! observable before `synchronize()` returns, which mirrors the ordering
//! contract real accelerator streams provide.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::backend::device::{
    BuilderSettings, DeviceError, DevicePlan, DeviceProperties, DeviceRegion, DeviceResult,
    DeviceRuntime, DeviceStream, LoweredNetwork,
};
use crate::graph::assembler::{CONST_OP, PLACEHOLDER_OP};
use crate::graph::{Attribute, Graph, Node};
use crate::lowering::Lowering;
use crate::tensor::{HostBuffer, HostTensor};

// ========== Runtime & devices ==========

/// One simulated device
#[derive(Debug, Clone)]
pub struct ReferenceDevice {
    pub name: String,
    pub supports_reduced_precision: bool,
}

impl ReferenceDevice {
    pub fn new(name: impl Into<String>, supports_reduced_precision: bool) -> Self {
        Self {
            name: name.into(),
            supports_reduced_precision,
        }
    }
}

/// Host-only runtime with a configurable device list
#[derive(Debug, Clone)]
pub struct ReferenceRuntime {
    devices: Vec<ReferenceDevice>,
}

impl ReferenceRuntime {
    /// Single default device with reduced-precision support
    pub fn new() -> Self {
        Self::with_devices(vec![ReferenceDevice::new("reference-0", true)])
    }

    pub fn with_devices(devices: Vec<ReferenceDevice>) -> Self {
        Self { devices }
    }

    fn device(&self, device_id: usize) -> DeviceResult<&ReferenceDevice> {
        self.devices.get(device_id).ok_or_else(|| {
            DeviceError::EnumerationFailed(format!(
                "device {} out of range ({} available)",
                device_id,
                self.devices.len()
            ))
        })
    }
}

impl Default for ReferenceRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRuntime for ReferenceRuntime {
    fn device_count(&self) -> DeviceResult<usize> {
        Ok(self.devices.len())
    }

    fn device_properties(&self, device_id: usize) -> DeviceResult<DeviceProperties> {
        let device = self.device(device_id)?;
        Ok(DeviceProperties {
            name: device.name.clone(),
            supports_reduced_precision: device.supports_reduced_precision,
        })
    }

    fn allocate(&self, device_id: usize, bytes: usize) -> DeviceResult<Box<dyn DeviceRegion>> {
        self.device(device_id)?;
        trace!(device_id, bytes, "allocating reference region");
        Ok(Box::new(ReferenceRegion::new(bytes)))
    }

    fn create_stream(&self, device_id: usize) -> DeviceResult<Box<dyn DeviceStream>> {
        self.device(device_id)?;
        Ok(Box::new(ReferenceStream::new()))
    }

    fn compile_network(
        &self,
        network: Box<dyn LoweredNetwork>,
        settings: &BuilderSettings,
    ) -> DeviceResult<Box<dyn DevicePlan>> {
        let network = network
            .as_any()
            .downcast_ref::<ReferenceNetwork>()
            .ok_or_else(|| {
                DeviceError::CompilationFailed(
                    "network was not produced by the reference lowering".to_string(),
                )
            })?;

        let mut ops = Vec::with_capacity(network.nodes.len());
        for node in &network.nodes {
            ops.push(parse_op(node)?);
        }

        let mut slots = Vec::new();
        for (binding_name, tensor) in &network.input_bindings {
            slots.push(SlotSpec {
                binding_name: binding_name.clone(),
                tensor: tensor.clone(),
                direction: SlotDirection::Input,
            });
        }
        for (binding_name, tensor) in &network.output_bindings {
            slots.push(SlotSpec {
                binding_name: binding_name.clone(),
                tensor: tensor.clone(),
                direction: SlotDirection::Output,
            });
        }

        debug!(
            ops = ops.len(),
            slots = slots.len(),
            max_batch_size = settings.max_batch_size,
            reduced_precision = settings.reduced_precision,
            "compiled reference plan"
        );

        Ok(Box::new(ReferencePlan {
            state: Arc::new(ReferencePlanState {
                ops,
                constants: network.constants.clone(),
                slots,
                max_batch_size: settings.max_batch_size,
                reduced_precision: settings.reduced_precision,
            }),
        }))
    }

    fn deserialize_plan(&self, bytes: &[u8]) -> DeviceResult<Box<dyn DevicePlan>> {
        let state: ReferencePlanState = bincode::deserialize(bytes)
            .map_err(|e| DeviceError::DeserializationFailed(e.to_string()))?;
        Ok(Box::new(ReferencePlan {
            state: Arc::new(state),
        }))
    }
}

// ========== Lowering ==========

/// Reference lowering: records sources and constants, keeps operator nodes
/// for the plan compiler, and prefixes binding names so lookups must go
/// through the mangling hooks.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLowering;

impl ReferenceLowering {
    pub fn new() -> Self {
        Self
    }
}

impl Lowering for ReferenceLowering {
    fn create_network(
        &self,
        graph: &Graph,
        parameter_table: &HashMap<String, HostTensor>,
        output_names: &[String],
    ) -> DeviceResult<Box<dyn LoweredNetwork>> {
        let mut nodes = Vec::new();
        let mut constants = HashMap::new();
        let mut input_bindings = Vec::new();
        let mut produced = Vec::new();

        for node in &graph.nodes {
            match node.op_type.as_str() {
                PLACEHOLDER_OP => {
                    let name = single_output(node)?;
                    input_bindings.push((self.input_binding_name(name), name.clone()));
                }
                CONST_OP => {
                    let name = single_output(node)?;
                    let tensor = parameter_table.get(name).ok_or_else(|| {
                        DeviceError::LoweringFailed(format!(
                            "constant '{}' missing from parameter table",
                            name
                        ))
                    })?;
                    constants.insert(name.clone(), tensor.read_bytes());
                }
                _ => {
                    produced.extend(node.outputs.iter().cloned());
                    nodes.push(node.clone());
                }
            }
        }

        // An output no node produces gets no binding slot; the binding
        // table reports it as "tensor not found" at build time.
        let output_bindings = output_names
            .iter()
            .filter(|name| produced.iter().any(|p| p == *name))
            .map(|name| (self.output_binding_name(name), name.clone()))
            .collect();

        Ok(Box::new(ReferenceNetwork {
            nodes,
            constants,
            input_bindings,
            output_bindings,
        }))
    }

    fn input_binding_name(&self, name: &str) -> String {
        format!("in.{}", name)
    }

    fn output_binding_name(&self, name: &str) -> String {
        format!("out.{}", name)
    }
}

fn single_output(node: &Node) -> DeviceResult<&String> {
    if node.outputs.len() != 1 {
        return Err(DeviceError::LoweringFailed(format!(
            "{} node must have exactly one output, got {}",
            node.op_type,
            node.outputs.len()
        )));
    }
    Ok(&node.outputs[0])
}

/// Network IR handed from lowering to the reference compiler
pub struct ReferenceNetwork {
    nodes: Vec<Node>,
    constants: HashMap<String, Vec<u8>>,
    input_bindings: Vec<(String, String)>,
    output_bindings: Vec<(String, String)>,
}

impl LoweredNetwork for ReferenceNetwork {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ========== Regions ==========

/// Host-backed "device" memory region
#[derive(Debug)]
pub struct ReferenceRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
    len: usize,
}

impl ReferenceRegion {
    fn new(len: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0u8; len])),
            len,
        }
    }

    fn bytes(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.bytes)
    }
}

impl DeviceRegion for ReferenceRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn as_reference_region(region: &dyn DeviceRegion) -> DeviceResult<&ReferenceRegion> {
    region
        .as_any()
        .downcast_ref::<ReferenceRegion>()
        .ok_or_else(|| {
            DeviceError::CopyFailed("region does not belong to the reference runtime".to_string())
        })
}

// ========== Stream ==========

type QueuedOp = Box<dyn FnOnce() -> DeviceResult<()> + Send>;

/// Queued work stream; nothing runs before `synchronize()`
pub struct ReferenceStream {
    queue: Vec<QueuedOp>,
}

impl ReferenceStream {
    fn new() -> Self {
        Self { queue: Vec::new() }
    }
}

impl DeviceStream for ReferenceStream {
    fn copy_to_device(&mut self, dst: &dyn DeviceRegion, src: &[u8]) -> DeviceResult<()> {
        let dst = as_reference_region(dst)?;
        if src.len() > dst.len() {
            return Err(DeviceError::CopyFailed(format!(
                "host-to-device copy of {} bytes into {}-byte region",
                src.len(),
                dst.len()
            )));
        }
        let target = dst.bytes();
        let captured = src.to_vec();
        self.queue.push(Box::new(move || {
            let mut guard = target.lock().expect("reference region lock poisoned");
            guard[..captured.len()].copy_from_slice(&captured);
            Ok(())
        }));
        Ok(())
    }

    fn copy_from_device(
        &mut self,
        dst: HostBuffer,
        src: &dyn DeviceRegion,
        len: usize,
    ) -> DeviceResult<()> {
        let src = as_reference_region(src)?;
        if len > src.len() {
            return Err(DeviceError::CopyFailed(format!(
                "device-to-host copy of {} bytes from {}-byte region",
                len,
                src.len()
            )));
        }
        let source = src.bytes();
        self.queue.push(Box::new(move || {
            let bytes = source.lock().expect("reference region lock poisoned");
            let mut guard = dst.write().expect("host buffer lock poisoned");
            if guard.len() < len {
                return Err(DeviceError::CopyFailed(format!(
                    "host buffer of {} bytes cannot receive {} bytes",
                    guard.len(),
                    len
                )));
            }
            guard[..len].copy_from_slice(&bytes[..len]);
            Ok(())
        }));
        Ok(())
    }

    fn execute(
        &mut self,
        plan: &dyn DevicePlan,
        batch_size: usize,
        slots: &[Option<&dyn DeviceRegion>],
    ) -> DeviceResult<()> {
        let plan = plan
            .as_any()
            .downcast_ref::<ReferencePlan>()
            .ok_or_else(|| {
                DeviceError::ExecutionFailed(
                    "plan was not produced by the reference runtime".to_string(),
                )
            })?;
        if batch_size > plan.state.max_batch_size {
            return Err(DeviceError::ExecutionFailed(format!(
                "batch size {} exceeds plan maximum {}",
                batch_size, plan.state.max_batch_size
            )));
        }
        if slots.len() != plan.state.slots.len() {
            return Err(DeviceError::ExecutionFailed(format!(
                "slot array has {} entries, plan requires {}",
                slots.len(),
                plan.state.slots.len()
            )));
        }

        let mut captured: Vec<Option<Arc<Mutex<Vec<u8>>>>> = Vec::with_capacity(slots.len());
        for slot in slots {
            captured.push(match slot {
                Some(region) => Some(as_reference_region(*region)?.bytes()),
                None => None,
            });
        }

        let state = Arc::clone(&plan.state);
        self.queue
            .push(Box::new(move || run_plan(&state, &captured)));
        Ok(())
    }

    fn synchronize(&mut self) -> DeviceResult<()> {
        let queued = std::mem::take(&mut self.queue);
        trace!(ops = queued.len(), "synchronizing reference stream");
        for op in queued {
            op()?;
        }
        Ok(())
    }
}

// ========== Plan & interpreter ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
enum PlanOp {
    Identity { input: String, output: String },
    Relu { input: String, output: String },
    Add { lhs: String, rhs: String, output: String },
    Scale { input: String, output: String, factor: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SlotDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotSpec {
    binding_name: String,
    tensor: String,
    direction: SlotDirection,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferencePlanState {
    ops: Vec<PlanOp>,
    constants: HashMap<String, Vec<u8>>,
    slots: Vec<SlotSpec>,
    max_batch_size: usize,
    reduced_precision: bool,
}

/// Compiled reference plan: interpreter state plus the binding layout
pub struct ReferencePlan {
    state: Arc<ReferencePlanState>,
}

impl DevicePlan for ReferencePlan {
    fn binding_index(&self, name: &str) -> Option<usize> {
        self.state
            .slots
            .iter()
            .position(|slot| slot.binding_name == name)
    }

    fn binding_count(&self) -> usize {
        self.state.slots.len()
    }

    fn serialize(&self) -> DeviceResult<Vec<u8>> {
        bincode::serialize(self.state.as_ref())
            .map_err(|e| DeviceError::CompilationFailed(format!("plan encoding failed: {}", e)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn parse_op(node: &Node) -> DeviceResult<PlanOp> {
    let arity = |n: usize| -> DeviceResult<()> {
        if node.inputs.len() != n || node.outputs.len() != 1 {
            return Err(DeviceError::CompilationFailed(format!(
                "{} expects {} input(s) and 1 output, got {}/{}",
                node.op_type,
                n,
                node.inputs.len(),
                node.outputs.len()
            )));
        }
        Ok(())
    };

    match node.op_type.as_str() {
        "Identity" => {
            arity(1)?;
            Ok(PlanOp::Identity {
                input: node.inputs[0].clone(),
                output: node.outputs[0].clone(),
            })
        }
        "Relu" => {
            arity(1)?;
            Ok(PlanOp::Relu {
                input: node.inputs[0].clone(),
                output: node.outputs[0].clone(),
            })
        }
        "Add" => {
            arity(2)?;
            Ok(PlanOp::Add {
                lhs: node.inputs[0].clone(),
                rhs: node.inputs[1].clone(),
                output: node.outputs[0].clone(),
            })
        }
        "Scale" => {
            arity(1)?;
            let factor = match node.attributes.get("factor") {
                Some(Attribute::Float(f)) => *f,
                Some(Attribute::Int(i)) => *i as f32,
                _ => {
                    return Err(DeviceError::CompilationFailed(
                        "Scale requires a numeric 'factor' attribute".to_string(),
                    ))
                }
            };
            Ok(PlanOp::Scale {
                input: node.inputs[0].clone(),
                output: node.outputs[0].clone(),
                factor,
            })
        }
        other => Err(DeviceError::CompilationFailed(format!(
            "unsupported operator: {}",
            other
        ))),
    }
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn f32_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn fetch<'a>(
    values: &'a HashMap<String, Vec<u8>>,
    name: &str,
) -> DeviceResult<&'a Vec<u8>> {
    values.get(name).ok_or_else(|| {
        DeviceError::ExecutionFailed(format!("tensor '{}' has no value during execution", name))
    })
}

fn run_plan(
    state: &ReferencePlanState,
    slots: &[Option<Arc<Mutex<Vec<u8>>>>],
) -> DeviceResult<()> {
    let mut values: HashMap<String, Vec<u8>> = state.constants.clone();

    for (index, spec) in state.slots.iter().enumerate() {
        if spec.direction == SlotDirection::Input {
            let region = slots[index].as_ref().ok_or_else(|| {
                DeviceError::ExecutionFailed(format!(
                    "input slot {} ('{}') is unbound",
                    index, spec.tensor
                ))
            })?;
            let bytes = region.lock().expect("reference region lock poisoned");
            values.insert(spec.tensor.clone(), bytes.clone());
        }
    }

    for op in &state.ops {
        match op {
            PlanOp::Identity { input, output } => {
                let value = fetch(&values, input)?.clone();
                values.insert(output.clone(), value);
            }
            PlanOp::Relu { input, output } => {
                let result: Vec<f32> = bytes_to_f32(fetch(&values, input)?)
                    .into_iter()
                    .map(|v| v.max(0.0))
                    .collect();
                values.insert(output.clone(), f32_to_bytes(&result));
            }
            PlanOp::Add { lhs, rhs, output } => {
                let a = bytes_to_f32(fetch(&values, lhs)?);
                let b = bytes_to_f32(fetch(&values, rhs)?);
                if a.len() != b.len() {
                    return Err(DeviceError::ExecutionFailed(format!(
                        "Add operands differ in length: {} vs {}",
                        a.len(),
                        b.len()
                    )));
                }
                let result: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
                values.insert(output.clone(), f32_to_bytes(&result));
            }
            PlanOp::Scale {
                input,
                output,
                factor,
            } => {
                let result: Vec<f32> = bytes_to_f32(fetch(&values, input)?)
                    .into_iter()
                    .map(|v| v * factor)
                    .collect();
                values.insert(output.clone(), f32_to_bytes(&result));
            }
        }
    }

    for (index, spec) in state.slots.iter().enumerate() {
        if spec.direction == SlotDirection::Output {
            let region = slots[index].as_ref().ok_or_else(|| {
                DeviceError::ExecutionFailed(format!(
                    "output slot {} ('{}') is unbound",
                    index, spec.tensor
                ))
            })?;
            let value = fetch(&values, &spec.tensor)?;
            let mut bytes = region.lock().expect("reference region lock poisoned");
            if bytes.len() < value.len() {
                return Err(DeviceError::ExecutionFailed(format!(
                    "output region for '{}' is {} bytes, result is {}",
                    spec.tensor,
                    bytes.len(),
                    value.len()
                )));
            }
            bytes[..value.len()].copy_from_slice(value);
        }
    }

    Ok(())
}
