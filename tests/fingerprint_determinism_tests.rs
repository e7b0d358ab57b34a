//! Fingerprint property tests
//!
//! Determinism across table iteration order, sensitivity to everything that
//! shapes the compiled plan, insensitivity to tensor values.

use std::collections::HashMap;

use planforge::{compute_fingerprint, Attribute, HostTensor, ModelGraph, Node, SessionConfig};

fn tensor(name: &str, values: &[f32]) -> HostTensor {
    HostTensor::from_f32(name, vec![1, values.len()], values)
}

fn model_with(attr: Attribute, weights: &[f32]) -> ModelGraph {
    let mut attrs = HashMap::new();
    attrs.insert("factor".to_string(), attr);
    ModelGraph::new(
        vec![Node::new(
            "Scale",
            vec!["x".to_string()],
            vec!["y".to_string()],
            attrs,
        )],
        vec![("w".to_string(), tensor("w", weights))],
    )
}

#[test]
fn identical_triples_hash_identically_regardless_of_insertion_order() {
    let mut forward = HashMap::new();
    forward.insert("a".to_string(), tensor("a", &[1.0]));
    forward.insert("b".to_string(), tensor("b", &[2.0]));
    forward.insert("c".to_string(), tensor("c", &[3.0]));

    let mut reversed = HashMap::new();
    reversed.insert("c".to_string(), tensor("c", &[3.0]));
    reversed.insert("b".to_string(), tensor("b", &[2.0]));
    reversed.insert("a".to_string(), tensor("a", &[1.0]));

    let outputs: HashMap<_, _> =
        std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let model = model_with(Attribute::Float(2.0), &[1.0]);
    let config = SessionConfig::default();

    let fp1 = compute_fingerprint(&forward, &outputs, &model, &config, "ref");
    let fp2 = compute_fingerprint(&reversed, &outputs, &model, &config, "ref");
    assert_eq!(fp1, fp2);
}

#[test]
fn attribute_value_change_changes_fingerprint() {
    let inputs: HashMap<_, _> = std::iter::once(("x".to_string(), tensor("x", &[0.0]))).collect();
    let outputs: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let config = SessionConfig::default();

    let a = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Float(2.0), &[1.0]),
        &config,
        "ref",
    );
    let b = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Float(2.5), &[1.0]),
        &config,
        "ref",
    );
    assert_ne!(a, b);
}

#[test]
fn parameter_bytes_change_changes_fingerprint() {
    let inputs: HashMap<_, _> = std::iter::once(("x".to_string(), tensor("x", &[0.0]))).collect();
    let outputs: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let config = SessionConfig::default();

    let a = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Int(1), &[1.0, 2.0]),
        &config,
        "ref",
    );
    let b = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Int(1), &[1.0, 2.5]),
        &config,
        "ref",
    );
    assert_ne!(a, b);
}

#[test]
fn config_change_changes_fingerprint() {
    let inputs: HashMap<_, _> = std::iter::once(("x".to_string(), tensor("x", &[0.0]))).collect();
    let outputs: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let model = model_with(Attribute::Int(1), &[1.0]);

    let a = compute_fingerprint(&inputs, &outputs, &model, &SessionConfig::default(), "ref");
    let b = compute_fingerprint(
        &inputs,
        &outputs,
        &model,
        &SessionConfig::default().with_batch_size(8),
        "ref",
    );
    assert_ne!(a, b);
}

#[test]
fn input_output_values_do_not_affect_fingerprint() {
    let model = model_with(Attribute::Int(1), &[1.0]);
    let config = SessionConfig::default();

    let quiet: HashMap<_, _> =
        std::iter::once(("x".to_string(), tensor("x", &[0.0, 0.0]))).collect();
    let loud: HashMap<_, _> =
        std::iter::once(("x".to_string(), tensor("x", &[1e9, -1e9]))).collect();
    let out_a: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let out_b: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[7.0]))).collect();

    let a = compute_fingerprint(&quiet, &out_a, &model, &config, "ref");
    let b = compute_fingerprint(&loud, &out_b, &model, &config, "ref");
    assert_eq!(a, b);
}

#[test]
fn int_and_float_attribute_tags_collide_nowhere() {
    let inputs: HashMap<_, _> = std::iter::once(("x".to_string(), tensor("x", &[0.0]))).collect();
    let outputs: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let config = SessionConfig::default();

    let as_int = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Int(3), &[1.0]),
        &config,
        "ref",
    );
    let as_float = compute_fingerprint(
        &inputs,
        &outputs,
        &model_with(Attribute::Float(3.0), &[1.0]),
        &config,
        "ref",
    );
    assert_ne!(as_int, as_float);
}

#[test]
fn device_identity_participates() {
    let inputs: HashMap<_, _> = std::iter::once(("x".to_string(), tensor("x", &[0.0]))).collect();
    let outputs: HashMap<_, _> = std::iter::once(("y".to_string(), tensor("y", &[0.0]))).collect();
    let model = model_with(Attribute::Int(1), &[1.0]);
    let config = SessionConfig::default();

    let a = compute_fingerprint(&inputs, &outputs, &model, &config, "gfx1030");
    let b = compute_fingerprint(&inputs, &outputs, &model, &config, "gfx1100");
    assert_ne!(a, b);
}
