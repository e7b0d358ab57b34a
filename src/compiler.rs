//! Plan compilation pipeline
//!
//! Drives the lowering service and the runtime compiler: validate the
//! device, lower the graph, apply batch/workspace/precision policy, build
//! the plan, and serialize it when caching is on. The network IR is consumed
//! by compilation and never outlives this module.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::backend::{BuilderSettings, DevicePlan, DeviceProperties, DeviceRuntime};
use crate::config::SessionConfig;
use crate::error::{PlanForgeError, PlanResult};
use crate::graph::Graph;
use crate::lowering::Lowering;
use crate::tensor::HostTensor;

/// Scratch memory budget handed to the plan builder
pub const WORKSPACE_LIMIT_BYTES: usize = 1 << 20;

/// Compilation output: the live plan, plus its serialized form when the
/// session will persist it.
pub struct CompiledArtifact {
    pub plan: Box<dyn DevicePlan>,
    pub serialized: Option<Vec<u8>>,
}

/// Resolve the precision policy against device capabilities.
///
/// Three-way priority: forced reduced precision requires device support and
/// turns on strict type constraints; otherwise allowed reduced precision is
/// taken opportunistically; otherwise full precision.
pub fn resolve_precision(
    config: &SessionConfig,
    props: &DeviceProperties,
) -> PlanResult<(bool, bool)> {
    if config.force_reduced_precision {
        if !props.supports_reduced_precision {
            return Err(PlanForgeError::PrecisionUnsupported(props.name.clone()));
        }
        Ok((true, true))
    } else if config.allow_reduced_precision && props.supports_reduced_precision {
        Ok((true, false))
    } else {
        Ok((false, false))
    }
}

/// Validate the configured device and return its properties
pub fn validate_device(
    runtime: &dyn DeviceRuntime,
    config: &SessionConfig,
) -> PlanResult<DeviceProperties> {
    let available = runtime.device_count()?;
    if config.device_id >= available {
        return Err(PlanForgeError::DeviceOutOfRange {
            requested: config.device_id,
            available,
        });
    }
    Ok(runtime.device_properties(config.device_id)?)
}

/// Compile the assembled graph into a device-executable plan.
///
/// `output_names` must already be lexicographically sorted so the plan's
/// binding structure is deterministic.
pub fn compile(
    runtime: &dyn DeviceRuntime,
    lowering: &dyn Lowering,
    graph: &Graph,
    parameter_table: &HashMap<String, HostTensor>,
    output_names: &[String],
    config: &SessionConfig,
) -> PlanResult<CompiledArtifact> {
    let props = validate_device(runtime, config)?;

    let network = lowering.create_network(graph, parameter_table, output_names)?;

    let (reduced_precision, strict_precision) = resolve_precision(config, &props)?;
    let settings = BuilderSettings {
        max_batch_size: config.max_batch_size,
        workspace_limit: WORKSPACE_LIMIT_BYTES,
        reduced_precision,
        strict_precision,
    };
    debug!(
        device = %props.name,
        max_batch_size = settings.max_batch_size,
        reduced_precision,
        "building execution plan"
    );

    // The network IR is consumed here; only the plan survives.
    let plan = runtime.compile_network(network, &settings)?;

    let serialized = if config.enable_plan_caching {
        Some(plan.serialize()?)
    } else {
        None
    };

    info!(
        bindings = plan.binding_count(),
        cached = serialized.is_some(),
        "plan compiled"
    );
    Ok(CompiledArtifact { plan, serialized })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ReferenceDevice, ReferenceLowering, ReferenceRuntime};
    use crate::graph::{assembler, ModelGraph, Node};

    fn props(supports: bool) -> DeviceProperties {
        DeviceProperties {
            name: "test-device".to_string(),
            supports_reduced_precision: supports,
        }
    }

    #[test]
    fn test_forced_precision_requires_support() {
        let config = SessionConfig::new().with_force_reduced_precision(true);
        let err = resolve_precision(&config, &props(false)).unwrap_err();
        assert!(matches!(err, PlanForgeError::PrecisionUnsupported(_)));

        let (reduced, strict) = resolve_precision(&config, &props(true)).unwrap();
        assert!(reduced);
        assert!(strict);
    }

    #[test]
    fn test_allowed_precision_is_opportunistic() {
        let config = SessionConfig::new().with_allow_reduced_precision(true);
        assert_eq!(resolve_precision(&config, &props(true)).unwrap(), (true, false));
        assert_eq!(resolve_precision(&config, &props(false)).unwrap(), (false, false));
    }

    #[test]
    fn test_force_takes_priority_over_allow() {
        let config = SessionConfig::new()
            .with_allow_reduced_precision(true)
            .with_force_reduced_precision(true);
        let err = resolve_precision(&config, &props(false)).unwrap_err();
        assert!(matches!(err, PlanForgeError::PrecisionUnsupported(_)));
    }

    #[test]
    fn test_validate_device_rejects_out_of_range_id() {
        let runtime = ReferenceRuntime::new();
        let config = SessionConfig::new().with_device_id(2);
        let err = validate_device(&runtime, &config).unwrap_err();
        match err {
            PlanForgeError::DeviceOutOfRange {
                requested,
                available,
            } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_compile_serializes_only_when_caching() {
        let runtime = ReferenceRuntime::with_devices(vec![ReferenceDevice::new("d0", false)]);
        let lowering = ReferenceLowering::new();
        let x = HostTensor::from_f32("x", vec![1, 2], &[1.0, 2.0]);
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), x);
        let model = ModelGraph::new(
            vec![Node::new(
                "Identity",
                vec!["x".to_string()],
                vec!["y".to_string()],
                HashMap::new(),
            )],
            vec![],
        );
        let outputs = vec!["y".to_string()];
        let graph = assembler::assemble(&inputs, &model, &outputs).unwrap();

        let artifact = compile(
            &runtime,
            &lowering,
            &graph,
            &model.parameter_table(),
            &outputs,
            &SessionConfig::default(),
        )
        .unwrap();
        assert!(artifact.serialized.is_none());

        let cached = compile(
            &runtime,
            &lowering,
            &graph,
            &model.parameter_table(),
            &outputs,
            &SessionConfig::default().with_plan_caching("/tmp"),
        )
        .unwrap();
        assert!(cached.serialized.is_some());
        assert_eq!(cached.plan.binding_count(), 2);
    }
}
