//! Pipeline container, graph management, and execution.
//!
//! The [`Pipeline`] owns a set of named [`Node`]s and the induced DAG.
//! Dependency names that are not registered nodes are *virtual inputs*:
//! placeholders whose values must be supplied at execution time.
//!
//! ## Submodules
//!
//! - `build` — `add_node` / `remove_node` mutations
//! - `execute` — minimal-subgraph execution with bypasses
//! - `subgraph` — ancestor-closure extraction
//! - `viz` — DOT export, Graphviz rendering, and text summaries
//!
//! ## Quick start
//!
//! ```
//! use dagpipe::{Inputs, NodeSpec, Pipeline};
//! use serde_json::json;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .add_node(NodeSpec::new("a", |_| Ok(json!(1))))?
//!     .add_node(
//!         NodeSpec::new("b", |i| Ok(json!(i["a"].as_i64().unwrap_or(0) + 1)))
//!             .dependencies(["a"]),
//!     )?;
//!
//! let results = pipeline.execute(&["b"], Inputs::default())?;
//! assert_eq!(results["b"], json!(2));
//! # Ok::<(), dagpipe::PipelineError>(())
//! ```

mod build;
mod execute;
mod subgraph;
mod viz;

pub use viz::DotOptions;

use crate::errors::{PipelineError, Result};
use crate::graph::DependencyDag;
use crate::node::Node;
use crate::types::Metadata;
use rustc_hash::{FxHashMap, FxHashSet};

/// A DAG of named computation steps.
///
/// Construction is imperative (`add_node` / `remove_node`), execution is
/// on demand: [`execute`](Pipeline::execute) computes only the ancestors
/// of the requested outputs, honoring bypass values supplied by the
/// caller. Execution takes `&self`, so read-only use from several
/// threads (including concurrent executions) is safe; mutation requires
/// `&mut self`.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) validate: bool,
    pub(crate) dag: DependencyDag,
    pub(crate) nodes: FxHashMap<String, Node>,
    pub(crate) virtual_inputs: FxHashSet<String>,
}

impl Pipeline {
    /// Create an empty pipeline with hooks enabled.
    pub fn new() -> Self {
        Self::with_validation(true)
    }

    /// Create an empty pipeline, choosing whether pre/post hooks run.
    pub fn with_validation(validate: bool) -> Self {
        Self {
            validate,
            dag: DependencyDag::default(),
            nodes: FxHashMap::default(),
            virtual_inputs: FxHashSet::default(),
        }
    }

    /// Globally enable or disable pre/post hooks.
    pub fn set_validation(&mut self, enabled: bool) {
        self.validate = enabled;
    }

    /// Whether the global hook gate is open.
    pub fn validation_enabled(&self) -> bool {
        self.validate
    }

    /// Number of registered nodes (virtual inputs not counted).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the pipeline has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `name` is a registered node.
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Look up a node by name.
    pub fn get_node(&self, name: &str) -> Result<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| PipelineError::NodeNotFound {
                name: name.to_string(),
            })
    }

    /// All node names in topological order, ties broken by insertion
    /// order. Virtual inputs are not listed.
    pub fn list_nodes(&self) -> Vec<String> {
        self.dag
            .topo_order()
            .into_iter()
            .filter(|name| self.nodes.contains_key(name))
            .collect()
    }

    /// Whether `name` is a virtual input (referenced as a dependency but
    /// not registered as a node).
    pub fn is_virtual_input(&self, name: &str) -> bool {
        self.virtual_inputs.contains(name)
    }

    /// All virtual input names, sorted.
    pub fn get_virtual_inputs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.virtual_inputs.iter().cloned().collect();
        names.sort();
        names
    }

    /// Virtual inputs required to compute `outputs`, sorted.
    ///
    /// An empty `outputs` slice means all leaf nodes. Names in `bypasses`
    /// are treated as supplied at execution time, so their upstream
    /// requirements drop out; entries that are not node names are
    /// ignored, mirroring how `execute` classifies its inputs.
    pub fn get_required_inputs(&self, outputs: &[&str], bypasses: &[&str]) -> Result<Vec<String>> {
        let outputs = self.resolve_outputs(outputs)?;
        let bypassed: FxHashSet<String> = bypasses
            .iter()
            .filter(|name| self.nodes.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        let (_, required_virtuals) = self.required_set(&outputs, &bypassed);
        let mut names: Vec<String> = required_virtuals.into_iter().collect();
        names.sort();
        Ok(names)
    }

    /// Names of nodes whose metadata contains every key/value pair of
    /// `query`, in topological order. An empty query matches every node.
    pub fn get_nodes_by_metadata(&self, query: &Metadata) -> Vec<String> {
        self.list_nodes()
            .into_iter()
            .filter(|name| {
                let metadata = &self.nodes[name].metadata;
                query
                    .iter()
                    .all(|(key, value)| metadata.get(key) == Some(value))
            })
            .collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
