//! Graph assembly
//!
//! Merges caller input tensors, model parameters, and operator nodes into
//! one canonical [`Graph`]: every input becomes a zero-input `Placeholder`
//! node, every parameter a zero-input `Const` node, each recording the
//! tensor shape in a `dims` attribute. Synthesized nodes are appended after
//! the operator list, exactly once per name.

use std::collections::HashMap;

use crate::error::{PlanForgeError, PlanResult};
use crate::graph::{Attribute, Graph, ModelGraph, Node};
use crate::tensor::HostTensor;

/// Operator tag for synthesized input nodes
pub const PLACEHOLDER_OP: &str = "Placeholder";
/// Operator tag for synthesized parameter nodes
pub const CONST_OP: &str = "Const";

fn dims_attribute(tensor: &HostTensor) -> HashMap<String, Attribute> {
    let dims: Vec<i64> = tensor.shape.iter().map(|&d| d as i64).collect();
    let mut attrs = HashMap::new();
    attrs.insert("dims".to_string(), Attribute::Ints(dims));
    attrs
}

fn source_node(op: &str, tensor: &HostTensor) -> Node {
    Node::new(
        op,
        Vec::new(),
        vec![tensor.name.clone()],
        dims_attribute(tensor),
    )
}

/// Assemble the canonical graph for lowering.
///
/// `input_table` and `model` are not mutated; `output_names` must be
/// non-empty or assembly fails with a structural error.
pub fn assemble(
    input_table: &HashMap<String, HostTensor>,
    model: &ModelGraph,
    output_names: &[String],
) -> PlanResult<Graph> {
    if output_names.is_empty() {
        return Err(PlanForgeError::EmptyOutputTable);
    }

    let mut nodes = model.nodes.clone();

    // Deterministic synthesis order: inputs sorted by name, then parameters
    // in their original declaration order.
    let mut input_names: Vec<_> = input_table.keys().collect();
    input_names.sort();
    for name in input_names {
        nodes.push(source_node(PLACEHOLDER_OP, &input_table[name]));
    }
    for (_, tensor) in &model.parameters {
        nodes.push(source_node(CONST_OP, tensor));
    }

    Ok(Graph::new(nodes))
}
