//! Logical graph model
//!
//! Nodes carry an operator tag, ordered input/output tensor names, and named
//! attributes. A [`ModelGraph`] is what the caller hands to a session: the
//! operator node list plus the ordered parameter (weight) list. The
//! [`assembler`] merges caller inputs and parameters into one canonical
//! [`Graph`] before lowering.

pub mod assembler;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tensor::HostTensor;

/// Node attribute, exactly one variant active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i64),
    Float(f32),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
}

/// One operator node
#[derive(Debug, Clone)]
pub struct Node {
    /// Operator type tag, e.g. "Identity", "Relu"
    pub op_type: String,
    /// Input tensor names in positional order
    pub inputs: Vec<String>,
    /// Output tensor names in positional order
    pub outputs: Vec<String>,
    /// Attribute name -> value, keys unique
    pub attributes: HashMap<String, Attribute>,
}

impl Node {
    pub fn new(
        op_type: impl Into<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        attributes: HashMap<String, Attribute>,
    ) -> Self {
        Self {
            op_type: op_type.into(),
            inputs,
            outputs,
            attributes,
        }
    }

    /// Attributes sorted by name, for deterministic traversal
    pub fn sorted_attributes(&self) -> Vec<(&String, &Attribute)> {
        let mut attrs: Vec<_> = self.attributes.iter().collect();
        attrs.sort_by(|a, b| a.0.cmp(b.0));
        attrs
    }
}

/// Ordered node sequence produced by the assembler
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

/// Caller-supplied model: operator nodes plus learned parameters.
///
/// Parameters keep their original order; the fingerprint hashes them in that
/// order, so two models with identical weights in a different declaration
/// order are deliberately distinct.
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    pub nodes: Vec<Node>,
    pub parameters: Vec<(String, HostTensor)>,
}

impl ModelGraph {
    pub fn new(nodes: Vec<Node>, parameters: Vec<(String, HostTensor)>) -> Self {
        Self { nodes, parameters }
    }

    /// Parameter table keyed by name, used by lowering
    pub fn parameter_table(&self) -> HashMap<String, HostTensor> {
        self.parameters
            .iter()
            .map(|(name, tensor)| (name.clone(), tensor.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_attributes_orders_by_name() {
        let mut attrs = HashMap::new();
        attrs.insert("beta".to_string(), Attribute::Int(2));
        attrs.insert("alpha".to_string(), Attribute::Float(1.0));
        let node = Node::new("Op", vec![], vec![], attrs);

        let names: Vec<_> = node
            .sorted_attributes()
            .into_iter()
            .map(|(n, _)| n.clone())
            .collect();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_parameter_table_preserves_entries() {
        let w = HostTensor::from_f32("w", vec![2], &[1.0, 2.0]);
        let model = ModelGraph::new(vec![], vec![("w".to_string(), w)]);
        let table = model.parameter_table();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("w"));
    }
}
