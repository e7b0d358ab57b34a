//! Graph lowering seam
//!
//! The lowering service translates operator nodes into a device network
//! representation and owns the mapping from tensor names to the binding
//! names a compiled plan exposes. Binding-table construction must route
//! every lookup through the mangling hooks rather than using raw tensor
//! names.

use std::collections::HashMap;

use crate::backend::{DeviceResult, LoweredNetwork};
use crate::graph::Graph;
use crate::tensor::HostTensor;

pub trait Lowering: Send + Sync {
    /// Translate the assembled graph into an opaque network, resolving
    /// parameter values from `parameter_table`. `output_names` arrive
    /// lexicographically sorted.
    fn create_network(
        &self,
        graph: &Graph,
        parameter_table: &HashMap<String, HostTensor>,
        output_names: &[String],
    ) -> DeviceResult<Box<dyn LoweredNetwork>>;

    /// Binding name under which the plan exposes an input tensor
    fn input_binding_name(&self, name: &str) -> String;

    /// Binding name under which the plan exposes an output tensor
    fn output_binding_name(&self, name: &str) -> String;
}
