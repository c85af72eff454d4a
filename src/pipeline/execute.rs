//! Pipeline execution: output resolution, input classification, minimal
//! required-set computation, and the topological evaluation sweep.
//!
//! The per-execution cache is a local value owned by [`Pipeline::execute`];
//! it is seeded with bypass and virtual-input values, filled as nodes
//! evaluate, and dropped when the call returns or fails. Nothing is
//! memoized across executions, so node functions may close over mutable
//! state without staleness hazards.

use crate::errors::{Phase, PipelineError, Result};
use crate::types::{Inputs, Value};
use rustc_hash::{FxHashMap, FxHashSet};

use super::Pipeline;

impl Pipeline {
    /// Execute the pipeline and return the requested output values.
    ///
    /// An empty `outputs` slice selects every leaf node. `inputs` entries
    /// are classified by key: node names become *bypasses* (the node is
    /// not executed and its exclusive upstream contributes nothing),
    /// virtual-input names supply the required external values, and
    /// anything else is rejected.
    ///
    /// Only nodes in the dependency closure of the requested outputs are
    /// evaluated, in a deterministic topological order with
    /// insertion-order tie-breaking. Each node's function is called at
    /// most once per execution.
    ///
    /// # Errors
    ///
    /// - `invalid_argument` — unknown output or input key;
    /// - `missing_input` — a required virtual input has no value;
    /// - `unreachable_output` — an output has no root among the provided
    ///   inputs, bypasses, and dependency-free nodes;
    /// - `user_raised` — a node function or hook failed; the error names
    ///   the node and the phase.
    pub fn execute(&self, outputs: &[&str], inputs: Inputs) -> Result<FxHashMap<String, Value>> {
        let outputs = self.resolve_outputs(outputs)?;

        let mut bypasses = Inputs::default();
        let mut virtual_values = Inputs::default();
        for (key, value) in inputs {
            if self.nodes.contains_key(&key) {
                bypasses.insert(key, value);
            } else if self.virtual_inputs.contains(&key) {
                virtual_values.insert(key, value);
            } else {
                return Err(PipelineError::UnknownInput { name: key });
            }
        }

        let bypassed: FxHashSet<String> = bypasses.keys().cloned().collect();
        let (required_nodes, required_virtuals) = self.required_set(&outputs, &bypassed);

        let mut missing: Vec<String> = required_virtuals
            .iter()
            .filter(|name| !virtual_values.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(PipelineError::MissingInputs { missing });
        }

        self.check_reachability(&outputs, &virtual_values, &bypassed)?;

        let mut cache: FxHashMap<String, Value> = FxHashMap::default();
        cache.extend(bypasses);
        cache.extend(virtual_values);

        for name in self.dag.topo_order() {
            if required_nodes.contains(&name) && !cache.contains_key(&name) {
                self.eval_node(&name, &mut cache)?;
            }
        }

        let mut results = FxHashMap::default();
        for name in &outputs {
            if let Some(value) = cache.get(name) {
                results.insert(name.clone(), value.clone());
            }
        }
        Ok(results)
    }

    /// Validate the requested outputs, defaulting to all leaves when the
    /// slice is empty. Duplicates collapse, order is preserved.
    pub(crate) fn resolve_outputs(&self, outputs: &[&str]) -> Result<Vec<String>> {
        if outputs.is_empty() {
            return Ok(self
                .dag
                .leaves()
                .into_iter()
                .filter(|name| self.nodes.contains_key(name))
                .collect());
        }
        let mut resolved = Vec::with_capacity(outputs.len());
        let mut seen = FxHashSet::default();
        for &name in outputs {
            if !self.nodes.contains_key(name) {
                return Err(PipelineError::UnknownOutput {
                    name: name.to_string(),
                });
            }
            if seen.insert(name) {
                resolved.push(name.to_string());
            }
        }
        Ok(resolved)
    }

    /// Reverse reachability from `outputs`, stopping at bypassed names.
    /// Returns the nodes to evaluate and the virtual inputs whose values
    /// are required.
    pub(crate) fn required_set(
        &self,
        outputs: &[String],
        bypassed: &FxHashSet<String>,
    ) -> (FxHashSet<String>, FxHashSet<String>) {
        let mut nodes = FxHashSet::default();
        let mut virtuals = FxHashSet::default();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut stack: Vec<String> = Vec::new();

        for output in outputs {
            if bypassed.contains(output) {
                continue;
            }
            if visited.insert(output.clone()) {
                nodes.insert(output.clone());
                stack.push(output.clone());
            }
        }

        while let Some(name) = stack.pop() {
            for dep in self.dag.dependencies_of(&name) {
                if !visited.insert(dep.clone()) {
                    continue;
                }
                if bypassed.contains(&dep) {
                    continue;
                }
                if self.virtual_inputs.contains(&dep) {
                    virtuals.insert(dep);
                    continue;
                }
                nodes.insert(dep.clone());
                stack.push(dep);
            }
        }

        (nodes, virtuals)
    }

    /// Every output needs a root (a dependency-free node, a bypass, or a
    /// valued virtual input) somewhere in its ancestor closure.
    fn check_reachability(
        &self,
        outputs: &[String],
        virtual_values: &Inputs,
        bypassed: &FxHashSet<String>,
    ) -> Result<()> {
        for output in outputs {
            let mut closure = self.dag.ancestors(output);
            closure.insert(output.clone());

            let has_root = closure.iter().any(|name| {
                virtual_values.contains_key(name)
                    || bypassed.contains(name)
                    || self
                        .nodes
                        .get(name)
                        .is_some_and(|node| node.dependencies.is_empty())
            });

            if !has_root {
                let mut missing: Vec<String> = closure
                    .iter()
                    .filter(|name| {
                        self.virtual_inputs.contains(*name)
                            && !virtual_values.contains_key(*name)
                    })
                    .cloned()
                    .collect();
                missing.sort();
                return Err(PipelineError::UnreachableOutput {
                    output: output.clone(),
                    missing,
                });
            }
        }
        Ok(())
    }

    /// Evaluate one node into the cache, recursively resolving uncached
    /// dependencies. The topological sweep makes the recursion a no-op in
    /// the common case; it remains as a safety net for subgraph
    /// boundaries where the precomputed order may omit a node.
    fn eval_node(&self, name: &str, cache: &mut FxHashMap<String, Value>) -> Result<()> {
        if cache.contains_key(name) {
            return Ok(());
        }

        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| PipelineError::MissingInputs {
                missing: vec![name.to_string()],
            })?;

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("pipeline_node", node = %name).entered();

        let mut gathered = Inputs::default();
        for dep in &node.dependencies {
            if !cache.contains_key(dep) {
                self.eval_node(dep, cache)?;
            }
            if let Some(value) = cache.get(dep) {
                gathered.insert(dep.clone(), value.clone());
            }
        }

        let hooks_enabled = self.validate && node.validate;

        if hooks_enabled {
            for hook in &node.pre_hooks {
                hook(&mut gathered)
                    .map_err(|err| PipelineError::node_failed(name, Phase::Pre, err))?;
            }
        }

        let mut value =
            (node.func)(&gathered).map_err(|err| PipelineError::node_failed(name, Phase::Func, err))?;

        if hooks_enabled {
            for hook in &node.post_hooks {
                hook(&mut value)
                    .map_err(|err| PipelineError::node_failed(name, Phase::Post, err))?;
            }
        }

        cache.insert(name.to_string(), value);
        Ok(())
    }
}
