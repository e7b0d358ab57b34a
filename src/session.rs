//! Inference session
//!
//! Owns the full lifecycle: assemble the graph, fingerprint it, consult the
//! plan cache, compile on a miss, build the binding table once, then serve
//! repeated `run()` calls. The graph exists only during construction; the
//! plan and the device regions live as long as the session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::{DevicePlan, DeviceRuntime, ReferenceLowering, ReferenceRuntime};
use crate::binding::BindingTable;
use crate::cache::PlanCache;
use crate::compiler;
use crate::config::SessionConfig;
use crate::error::{PlanForgeError, PlanResult};
use crate::fingerprint::compute_fingerprint;
use crate::graph::{assembler, ModelGraph};
use crate::lowering::Lowering;
use crate::profiling::{NoopProfiler, Profiler, RecordingProfiler};
use crate::tensor::HostTensor;

pub struct InferenceSession {
    config: SessionConfig,
    fingerprint: Option<String>,
    runtime: Arc<dyn DeviceRuntime>,
    plan: Box<dyn DevicePlan>,
    bindings: BindingTable,
    profiler: Box<dyn Profiler>,
}

impl std::fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("config", &self.config)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl InferenceSession {
    /// Build a session against an explicit runtime and lowering service.
    ///
    /// Fails with a structural error for an empty output table, an
    /// out-of-range device id, an unsatisfiable precision request, or a
    /// tensor the compiled plan has no slot for.
    pub fn new(
        input_table: HashMap<String, HostTensor>,
        output_table: HashMap<String, HostTensor>,
        model: ModelGraph,
        config: SessionConfig,
        runtime: Arc<dyn DeviceRuntime>,
        lowering: Arc<dyn Lowering>,
    ) -> PlanResult<Self> {
        if output_table.is_empty() {
            return Err(PlanForgeError::EmptyOutputTable);
        }

        let mut profiler: Box<dyn Profiler> = if config.enable_profiler {
            Box::new(RecordingProfiler::new())
        } else {
            Box::new(NoopProfiler)
        };

        let props = compiler::validate_device(runtime.as_ref(), &config)?;

        let fingerprint = if config.enable_plan_caching {
            let start = Instant::now();
            let fp = compute_fingerprint(&input_table, &output_table, &model, &config, &props.name);
            profiler.record("fingerprint", start.elapsed());
            info!(fingerprint = %fp, "computed plan fingerprint");
            Some(fp)
        } else {
            None
        };

        let mut output_names: Vec<String> = output_table.keys().cloned().collect();
        output_names.sort();

        let graph = assembler::assemble(&input_table, &model, &output_names)?;
        let parameter_table = model.parameter_table();

        let cache = PlanCache::new(&config.plan_cache_dir);
        let plan = Self::obtain_plan(
            runtime.as_ref(),
            lowering.as_ref(),
            &graph,
            &parameter_table,
            &output_names,
            &config,
            &cache,
            fingerprint.as_deref(),
            profiler.as_mut(),
        )?;

        let start = Instant::now();
        let bindings = BindingTable::build(
            runtime.as_ref(),
            lowering.as_ref(),
            plan.as_ref(),
            config.device_id,
            &input_table,
            &output_table,
        )?;
        profiler.record("bind", start.elapsed());

        debug!(slots = bindings.slot_count(), "session ready");
        Ok(Self {
            config,
            fingerprint,
            runtime,
            plan,
            bindings,
            profiler,
        })
    }

    /// Convenience constructor on the bundled reference runtime
    pub fn with_reference_runtime(
        input_table: HashMap<String, HostTensor>,
        output_table: HashMap<String, HostTensor>,
        model: ModelGraph,
        config: SessionConfig,
    ) -> PlanResult<Self> {
        Self::new(
            input_table,
            output_table,
            model,
            config,
            Arc::new(ReferenceRuntime::new()),
            Arc::new(ReferenceLowering::new()),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn obtain_plan(
        runtime: &dyn DeviceRuntime,
        lowering: &dyn Lowering,
        graph: &crate::graph::Graph,
        parameter_table: &HashMap<String, HostTensor>,
        output_names: &[String],
        config: &SessionConfig,
        cache: &PlanCache,
        fingerprint: Option<&str>,
        profiler: &mut dyn Profiler,
    ) -> PlanResult<Box<dyn DevicePlan>> {
        if let Some(key) = fingerprint {
            if let Some(bytes) = cache.load(key)? {
                match runtime.deserialize_plan(&bytes) {
                    Ok(plan) => return Ok(plan),
                    // A stale or corrupt file is not fatal; recompile and
                    // overwrite it below.
                    Err(e) => warn!(key, error = %e, "cached plan unusable, recompiling"),
                }
            }
        }

        let start = Instant::now();
        let artifact = compiler::compile(
            runtime,
            lowering,
            graph,
            parameter_table,
            output_names,
            config,
        )?;
        profiler.record("compile", start.elapsed());

        if let (Some(key), Some(bytes)) = (fingerprint, &artifact.serialized) {
            cache.store(key, bytes)?;
        }
        Ok(artifact.plan)
    }

    /// Execute the plan once. Overwrites the host memory of every registered
    /// output tensor; synchronous end-to-end from the caller's view.
    pub fn run(&mut self) -> PlanResult<()> {
        let start = Instant::now();

        // Host buffers may have been resized by the caller since binding.
        for binding in self.bindings.inputs().iter().chain(self.bindings.outputs()) {
            let actual = binding.host.read().expect("host buffer lock poisoned").len();
            if actual != binding.byte_len {
                return Err(PlanForgeError::ShapeMismatch {
                    name: binding.name.clone(),
                    bound: binding.byte_len,
                    actual,
                });
            }
        }

        let mut stream = self.runtime.create_stream(self.config.device_id)?;

        for binding in self.bindings.inputs() {
            let bytes = binding.host.read().expect("host buffer lock poisoned").clone();
            stream.copy_to_device(self.bindings.region(binding), &bytes)?;
        }

        let slots = self.bindings.slot_refs();
        stream.execute(self.plan.as_ref(), self.config.batch_size, &slots)?;

        for binding in self.bindings.outputs() {
            stream.copy_from_device(
                Arc::clone(&binding.host),
                self.bindings.region(binding),
                binding.byte_len,
            )?;
        }

        stream.synchronize()?;

        self.profiler.record("run", start.elapsed());
        if self.config.enable_profiler {
            self.profiler.report();
        }
        Ok(())
    }

    /// Fingerprint of this session's (graph, config, device) triple;
    /// computed only when plan caching is enabled.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Path the plan was (or would be) persisted under, when caching
    pub fn cached_plan_path(&self) -> Option<std::path::PathBuf> {
        self.fingerprint
            .as_deref()
            .map(|key| PlanCache::new(&self.config.plan_cache_dir).path_for(key))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of binding slots the compiled plan requires
    pub fn binding_count(&self) -> usize {
        self.plan.binding_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn identity_session_parts() -> (
        HashMap<String, HostTensor>,
        HashMap<String, HostTensor>,
        ModelGraph,
    ) {
        let mut inputs = HashMap::new();
        inputs.insert(
            "x".to_string(),
            HostTensor::from_f32("x", vec![1, 3], &[1.0, 2.0, 3.0]),
        );
        let mut outputs = HashMap::new();
        outputs.insert("y".to_string(), HostTensor::zeroed_f32("y", vec![1, 3]));
        let model = ModelGraph::new(
            vec![Node::new(
                "Identity",
                vec!["x".to_string()],
                vec!["y".to_string()],
                HashMap::new(),
            )],
            vec![],
        );
        (inputs, outputs, model)
    }

    #[test]
    fn test_empty_output_table_fails_construction() {
        let (inputs, _, model) = identity_session_parts();
        let err = InferenceSession::with_reference_runtime(
            inputs,
            HashMap::new(),
            model,
            SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanForgeError::EmptyOutputTable));
    }

    #[test]
    fn test_construction_succeeds_without_caching() {
        let (inputs, outputs, model) = identity_session_parts();
        let session = InferenceSession::with_reference_runtime(
            inputs,
            outputs,
            model,
            SessionConfig::default(),
        )
        .unwrap();
        assert!(session.fingerprint().is_none());
        assert_eq!(session.binding_count(), 2);
    }

    #[test]
    fn test_shape_mismatch_detected_on_run() {
        let (inputs, outputs, model) = identity_session_parts();
        let x = inputs["x"].clone();
        let mut session = InferenceSession::with_reference_runtime(
            inputs,
            outputs,
            model,
            SessionConfig::default(),
        )
        .unwrap();

        // Caller shrinks the host buffer after binding.
        x.write_bytes(&[0u8; 4]);
        let err = session.run().unwrap_err();
        assert!(matches!(err, PlanForgeError::ShapeMismatch { .. }));
    }
}
