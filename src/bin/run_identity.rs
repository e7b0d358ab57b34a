//! Identity graph runner
//! Demonstrates the full pipeline end-to-end on the reference runtime:
//! assemble, fingerprint, cache, compile, bind, run.

use std::collections::HashMap;

use anyhow::Result;
use planforge::{
    logging, HostTensor, InferenceSession, ModelGraph, Node, SessionConfig,
};

fn main() -> Result<()> {
    logging::init_logging();

    println!("PlanForge identity runner");
    println!("=========================");

    let input = HostTensor::from_f32("x", vec![1, 3], &[1.5, -2.0, 3.25]);
    let output = HostTensor::zeroed_f32("y", vec![1, 3]);
    println!("input  x = {:?}", input.to_f32_vec());

    let mut inputs = HashMap::new();
    inputs.insert("x".to_string(), input);
    let mut outputs = HashMap::new();
    outputs.insert("y".to_string(), output.clone());

    let model = ModelGraph::new(
        vec![Node::new(
            "Identity",
            vec!["x".to_string()],
            vec!["y".to_string()],
            HashMap::new(),
        )],
        vec![],
    );

    let cache_dir = std::env::temp_dir().join("planforge-demo");
    let config = SessionConfig::new()
        .with_profiler(true)
        .with_plan_caching(&cache_dir);

    let mut session = InferenceSession::with_reference_runtime(inputs, outputs, model, config)?;
    if let Some(fp) = session.fingerprint() {
        println!("fingerprint = {}", fp);
    }
    if let Some(path) = session.cached_plan_path() {
        println!("cached plan = {}", path.display());
    }

    session.run()?;
    println!("output y = {:?}", output.to_f32_vec());

    Ok(())
}
