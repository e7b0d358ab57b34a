//! Plan fingerprinting
//!
//! Computes a SHA-256 digest over the contract shape of a session: sorted
//! input/output names, graph structure in node order, parameter bytes, the
//! raw configuration string, and the device identity. Input/output *values*
//! never participate; parameter bytes do, so a weight change invalidates any
//! cached plan. The digest is stable across process runs and caller table
//! iteration order.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::config::SessionConfig;
use crate::graph::{Attribute, ModelGraph};
use crate::tensor::HostTensor;

fn add_str(hasher: &mut Sha256, s: &str) {
    hasher.update(s.as_bytes());
}

/// Hash table entries by sorted name only, never by value
fn add_variable_table(hasher: &mut Sha256, table: &HashMap<String, HostTensor>) {
    let mut names: Vec<_> = table.keys().collect();
    names.sort();
    for name in names {
        add_str(hasher, name);
    }
}

/// Type-tagged attribute encoding: the int 3 and the float 3 must differ
fn add_attribute(hasher: &mut Sha256, attr: &Attribute) {
    match attr {
        Attribute::Int(v) => add_str(hasher, &format!("int{}", v)),
        Attribute::Float(v) => add_str(hasher, &format!("float{}", v)),
        Attribute::Ints(vs) => {
            add_str(hasher, "ints");
            for v in vs {
                add_str(hasher, &v.to_string());
            }
        }
        Attribute::Floats(vs) => {
            add_str(hasher, "floats");
            for v in vs {
                add_str(hasher, &v.to_string());
            }
        }
    }
}

/// Compute the cache fingerprint for a (graph, config, device) triple.
///
/// Pure and deterministic; never fails for well-formed inputs.
pub fn compute_fingerprint(
    input_table: &HashMap<String, HostTensor>,
    output_table: &HashMap<String, HostTensor>,
    model: &ModelGraph,
    config: &SessionConfig,
    device_name: &str,
) -> String {
    let mut hasher = Sha256::new();

    add_variable_table(&mut hasher, input_table);
    add_variable_table(&mut hasher, output_table);

    for node in &model.nodes {
        add_str(&mut hasher, &node.op_type);
        for name in &node.inputs {
            add_str(&mut hasher, name);
        }
        for name in &node.outputs {
            add_str(&mut hasher, name);
        }
        for (name, attr) in node.sorted_attributes() {
            add_str(&mut hasher, name);
            add_attribute(&mut hasher, attr);
        }
    }

    // Parameters hash in declaration order, raw bytes included.
    for (name, tensor) in &model.parameters {
        add_str(&mut hasher, name);
        hasher.update(tensor.read_bytes());
    }

    add_str(&mut hasher, &config.raw_config());
    add_str(&mut hasher, device_name);

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn tensor(name: &str, values: &[f32]) -> HostTensor {
        HostTensor::from_f32(name, vec![1, values.len()], values)
    }

    fn table(entries: &[(&str, &[f32])]) -> HashMap<String, HostTensor> {
        entries
            .iter()
            .map(|(n, v)| (n.to_string(), tensor(n, v)))
            .collect()
    }

    fn simple_model(attr: Attribute, weights: &[f32]) -> ModelGraph {
        let mut attrs = HashMap::new();
        attrs.insert("alpha".to_string(), attr);
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
    fn test_fingerprint_is_hex_sha256() {
        let fp = compute_fingerprint(
            &table(&[("x", &[0.0])]),
            &table(&[("y", &[0.0])]),
            &ModelGraph::default(),
            &SessionConfig::default(),
            "ref",
        );
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_insensitive_to_io_values() {
        let model = simple_model(Attribute::Float(2.0), &[1.0]);
        let config = SessionConfig::default();
        let a = compute_fingerprint(
            &table(&[("x", &[1.0, 2.0])]),
            &table(&[("y", &[0.0])]),
            &model,
            &config,
            "ref",
        );
        let b = compute_fingerprint(
            &table(&[("x", &[9.0, -9.0])]),
            &table(&[("y", &[5.0])]),
            &model,
            &config,
            "ref",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_sensitive_to_parameter_bytes() {
        let config = SessionConfig::default();
        let inputs = table(&[("x", &[0.0])]);
        let outputs = table(&[("y", &[0.0])]);
        let a = compute_fingerprint(
            &inputs,
            &outputs,
            &simple_model(Attribute::Float(2.0), &[1.0]),
            &config,
            "ref",
        );
        let b = compute_fingerprint(
            &inputs,
            &outputs,
            &simple_model(Attribute::Float(2.0), &[1.5]),
            &config,
            "ref",
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_int_and_float_attributes_hash_differently() {
        let config = SessionConfig::default();
        let inputs = table(&[("x", &[0.0])]);
        let outputs = table(&[("y", &[0.0])]);
        let a = compute_fingerprint(
            &inputs,
            &outputs,
            &simple_model(Attribute::Int(3), &[1.0]),
            &config,
            "ref",
        );
        let b = compute_fingerprint(
            &inputs,
            &outputs,
            &simple_model(Attribute::Float(3.0), &[1.0]),
            &config,
            "ref",
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_sensitive_to_config_and_device() {
        let model = simple_model(Attribute::Int(1), &[1.0]);
        let inputs = table(&[("x", &[0.0])]);
        let outputs = table(&[("y", &[0.0])]);

        let base = compute_fingerprint(&inputs, &outputs, &model, &SessionConfig::default(), "ref");
        let other_config = compute_fingerprint(
            &inputs,
            &outputs,
            &model,
            &SessionConfig::default().with_max_batch_size(4),
            "ref",
        );
        let other_device =
            compute_fingerprint(&inputs, &outputs, &model, &SessionConfig::default(), "gfx1100");

        assert_ne!(base, other_config);
        assert_ne!(base, other_device);
    }
}
