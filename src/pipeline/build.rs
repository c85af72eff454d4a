//! Graph mutations: adding and removing nodes.
//!
//! Every failure check runs against the pre-mutation graph, so a failed
//! operation leaves the pipeline untouched without rollback bookkeeping.
//! The cycle test exploits the edge direction: committing `add_node`
//! only ever adds edges *into* the new node (from its dependencies) and
//! *out of* it (to its derived outputs), so a cycle exists iff the new
//! node or one of its derived outputs already reaches one of the
//! declared dependencies.

use crate::errors::{PipelineError, Result};
use crate::node::{Extract, Node, NodeSpec};
use crate::types::{Inputs, NodeFn, Value};
use rustc_hash::FxHashSet;
use std::sync::Arc;

impl super::Pipeline {
    /// Add a computation node described by `spec`.
    ///
    /// Dependencies that are not registered nodes become virtual inputs.
    /// If `spec` names an existing virtual input, the virtual input is
    /// *promoted*: its consumers keep their edges and the node record is
    /// installed. If `spec` names an existing node, the node is replaced,
    /// provided nothing depends on it.
    ///
    /// Derived outputs declared on the spec are registered as one child
    /// node each, depending solely on the source node, carrying no hooks
    /// and no metadata.
    ///
    /// # Errors
    ///
    /// - `invalid_argument` — empty name, duplicate dependency, or a
    ///   derived-output name collision;
    /// - `conflict` — replacing a node that has dependents;
    /// - `cycle` — the edit would make the graph cyclic.
    ///
    /// Returns `&mut self` for chained construction.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<&mut Self> {
        if spec.name.trim().is_empty() {
            return Err(PipelineError::EmptyNodeName);
        }

        let mut seen = FxHashSet::default();
        for dep in &spec.dependencies {
            if !seen.insert(dep.as_str()) {
                return Err(PipelineError::DuplicateDependency {
                    node: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        if self.nodes.contains_key(&spec.name) {
            let dependents = self.dag.dependents_of(&spec.name);
            if !dependents.is_empty() {
                return Err(PipelineError::ReplaceWithDependents {
                    name: spec.name.clone(),
                    dependents,
                });
            }
        }

        let mut derived_seen = FxHashSet::default();
        for (id, _) in &spec.outputs {
            if id.trim().is_empty() {
                return Err(PipelineError::EmptyNodeName);
            }
            if *id == spec.name || self.nodes.contains_key(id) {
                return Err(PipelineError::OutputCollision { name: id.clone() });
            }
            if !derived_seen.insert(id.as_str()) {
                return Err(PipelineError::DuplicateOutput { name: id.clone() });
            }
        }

        // Cycle pre-checks. `reaches` is reflexive for existing vertices,
        // so a self-dependency needs its own comparison.
        for dep in &spec.dependencies {
            if *dep == spec.name || self.dag.reaches(&spec.name, dep) {
                return Err(PipelineError::CycleDetected {
                    name: spec.name.clone(),
                });
            }
        }
        for (id, _) in &spec.outputs {
            for dep in &spec.dependencies {
                if id == dep || self.dag.reaches(id, dep) {
                    return Err(PipelineError::CycleDetected { name: id.clone() });
                }
            }
        }

        // All checks passed; commit.
        let (node, outputs) = spec.build();
        let name = node.name.clone();

        if self.nodes.contains_key(&name) {
            self.detach_incoming(&name);
        }
        self.virtual_inputs.remove(&name);

        self.dag.insert(&name);
        for dep in &node.dependencies {
            self.dag.insert(dep);
            if !self.nodes.contains_key(dep) {
                self.virtual_inputs.insert(dep.clone());
            }
            self.dag.add_edge(dep, &name);
        }
        self.nodes.insert(name.clone(), node);

        for (id, extract) in outputs {
            self.virtual_inputs.remove(&id);
            self.dag.insert(&id);
            self.dag.add_edge(&name, &id);
            let derived = Node {
                name: id.clone(),
                func: extractor_fn(name.clone(), extract),
                dependencies: vec![name.clone()],
                description: None,
                pre_hooks: Vec::new(),
                post_hooks: Vec::new(),
                validate: true,
                metadata: Default::default(),
            };
            self.nodes.insert(id, derived);
        }

        Ok(self)
    }

    /// Remove the node named `name`.
    ///
    /// Fails with `conflict` when other nodes depend on it. Dependencies
    /// that were virtual inputs and lose their last consumer disappear
    /// from the graph; node dependencies simply become leaves.
    pub fn remove_node(&mut self, name: &str) -> Result<&mut Self> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| PipelineError::NodeNotFound {
                name: name.to_string(),
            })?;

        let dependents = self.dag.dependents_of(name);
        if !dependents.is_empty() {
            return Err(PipelineError::RemoveWithDependents {
                name: name.to_string(),
                dependents,
            });
        }

        let deps = node.dependencies.clone();
        self.dag.remove(name);
        self.nodes.remove(name);
        self.prune_orphaned_virtuals(&deps);
        Ok(self)
    }

    /// Detach a node being replaced: drop its incoming edges and prune
    /// virtual inputs that fed only this node. Downstream edges (none,
    /// by the replacement precondition) and the vertex itself stay.
    fn detach_incoming(&mut self, name: &str) {
        let deps = match self.nodes.get(name) {
            Some(node) => node.dependencies.clone(),
            None => return,
        };
        self.dag.remove_incoming_edges(name);
        self.prune_orphaned_virtuals(&deps);
    }

    fn prune_orphaned_virtuals(&mut self, deps: &[String]) {
        for dep in deps {
            if self.virtual_inputs.contains(dep) && self.dag.out_degree(dep) == 0 {
                self.dag.remove(dep);
                self.virtual_inputs.remove(dep);
            }
        }
    }
}

/// Wrap a derived-output declaration into a node function that reads the
/// source node's cached mapping.
fn extractor_fn(source: String, extract: Extract) -> NodeFn {
    match extract {
        Extract::Key(key) => Arc::new(move |inputs: &Inputs| {
            let mapping = source_mapping(&source, inputs)?;
            match mapping.get(&key) {
                Some(value) => Ok(value.clone()),
                None => Err(format!("key '{key}' not found in output of '{source}'").into()),
            }
        }),
        Extract::With(f) => Arc::new(move |inputs: &Inputs| {
            let mapping = source_mapping(&source, inputs)?;
            f(mapping)
        }),
    }
}

fn source_mapping<'a>(
    source: &str,
    inputs: &'a Inputs,
) -> std::result::Result<&'a serde_json::Map<String, Value>, crate::errors::UserError> {
    let Some(value) = inputs.get(source) else {
        return Err(format!("source value '{source}' was not gathered").into());
    };
    let Some(mapping) = value.as_object() else {
        return Err(format!("node '{source}' did not return a JSON object").into());
    };
    Ok(mapping)
}
