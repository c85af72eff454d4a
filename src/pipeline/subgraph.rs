//! Ancestor-closure subgraph extraction.

use crate::errors::{PipelineError, Result};
use rustc_hash::FxHashSet;

use super::Pipeline;

impl Pipeline {
    /// Build a new, independent pipeline containing exactly the nodes in
    /// the ancestor closure of `outputs`.
    ///
    /// Virtual inputs feeding the closure remain virtual inputs of the
    /// subgraph; the global validation flag, per-node hooks, metadata,
    /// and descriptions are copied. Callables are shared by reference,
    /// so executing the subgraph observes the same user state as the
    /// original.
    ///
    /// For any input set `I`, `extract_subgraph(O)?.execute(&O, I)`
    /// produces the same values as `execute(&O, I)` on the original.
    pub fn extract_subgraph(&self, outputs: &[&str]) -> Result<Pipeline> {
        for &name in outputs {
            if !self.nodes.contains_key(name) {
                return Err(PipelineError::UnknownOutput {
                    name: name.to_string(),
                });
            }
        }

        let mut required: FxHashSet<String> = FxHashSet::default();
        for &output in outputs {
            required.insert(output.to_string());
            for ancestor in self.dag.ancestors(output) {
                if self.nodes.contains_key(&ancestor) {
                    required.insert(ancestor);
                }
            }
        }

        // Re-adding in topological order keeps every dependency edge
        // resolvable and re-creates the virtual inputs on the fly.
        let mut subgraph = Pipeline::with_validation(self.validate);
        for name in self.dag.topo_order() {
            if let Some(node) = self.nodes.get(&name) {
                if required.contains(&name) {
                    subgraph.add_node(node.to_spec())?;
                }
            }
        }
        Ok(subgraph)
    }
}
