//! Node record and the [`NodeSpec`] builder.
//!
//! A [`Node`] is a single computation step owned by a
//! [`Pipeline`](crate::Pipeline). Nodes are never constructed directly;
//! a [`NodeSpec`] collects the name, function, and optional attributes,
//! and [`Pipeline::add_node`](crate::Pipeline::add_node) consumes it.
//!
//! # Multi-output nodes
//!
//! A node whose function returns a JSON object can declare *derived
//! outputs*: one extra node per entry, each extracting a piece of the
//! source's returned mapping. Three declaration forms exist and may be
//! mixed on one spec:
//!
//! ```
//! use dagpipe::NodeSpec;
//! use serde_json::json;
//!
//! let spec = NodeSpec::new("_stats", |_| Ok(json!({"mean": 2.0, "sd": 0.5})))
//!     .outputs(["mean"])                 // node "mean" extracts key "mean"
//!     .output_key("std", "sd")           // node "std" extracts key "sd"
//!     .output_with("cv", |d| {           // node "cv" computes from the mapping
//!         let mean = d["mean"].as_f64().unwrap_or(1.0);
//!         let sd = d["sd"].as_f64().unwrap_or(0.0);
//!         Ok(json!(sd / mean))
//!     });
//! ```

use crate::errors::UserError;
use crate::types::{ExtractFn, Inputs, Metadata, NodeFn, PostFn, PreFn, Value};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Node
// ============================================================================

/// A computation step registered in a pipeline.
///
/// Holds the opaque function, the ordered dependency list, the pre/post
/// hook lists, the per-node validation toggle, free-form metadata, and an
/// optional human description.
#[derive(Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) func: NodeFn,
    pub(crate) dependencies: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) pre_hooks: Vec<PreFn>,
    pub(crate) post_hooks: Vec<PostFn>,
    pub(crate) validate: bool,
    pub(crate) metadata: Metadata,
}

impl Node {
    /// The node's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependency names in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Optional human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether pre/post hooks run for this node (subject to the
    /// pipeline-global flag).
    pub fn validate_enabled(&self) -> bool {
        self.validate
    }

    /// Free-form metadata tags.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of pre-hooks.
    pub fn pre_hook_count(&self) -> usize {
        self.pre_hooks.len()
    }

    /// Number of post-hooks.
    pub fn post_hook_count(&self) -> usize {
        self.post_hooks.len()
    }

    /// Rebuild a spec sharing this node's callables by reference.
    /// Used by subgraph extraction.
    pub(crate) fn to_spec(&self) -> NodeSpec {
        NodeSpec {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
            dependencies: self.dependencies.clone(),
            description: self.description.clone(),
            pre_hooks: self.pre_hooks.clone(),
            post_hooks: self.post_hooks.clone(),
            validate: self.validate,
            metadata: self.metadata.clone(),
            outputs: Vec::new(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("description", &self.description)
            .field("pre_hooks", &self.pre_hooks.len())
            .field("post_hooks", &self.post_hooks.len())
            .field("validate", &self.validate)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Derived-output declarations
// ============================================================================

/// How one derived node obtains its value from the source's mapping.
#[derive(Clone)]
pub(crate) enum Extract {
    /// Extract the like-named or renamed key.
    Key(String),
    /// Apply a user extractor to the whole mapping.
    With(ExtractFn),
}

// ============================================================================
// NodeSpec — fluent node construction
// ============================================================================

/// Builder for a node: name and function are mandatory, everything else
/// is fluent.
///
/// ```
/// use dagpipe::{NodeSpec, Pipeline};
/// use serde_json::json;
///
/// let mut pipeline = Pipeline::new();
/// pipeline.add_node(
///     NodeSpec::new("brf", |inputs| Ok(inputs["radiance"].clone()))
///         .dependencies(["radiance"])
///         .description("Bidirectional reflectance factor")
///         .metadata("final", true),
/// )?;
/// # Ok::<(), dagpipe::PipelineError>(())
/// ```
pub struct NodeSpec {
    pub(crate) name: String,
    pub(crate) func: NodeFn,
    pub(crate) dependencies: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) pre_hooks: Vec<PreFn>,
    pub(crate) post_hooks: Vec<PostFn>,
    pub(crate) validate: bool,
    pub(crate) metadata: Metadata,
    pub(crate) outputs: Vec<(String, Extract)>,
}

impl NodeSpec {
    /// Start a spec from a name and a computation function.
    ///
    /// The function receives the gathered dependency values keyed by
    /// dependency name and may return any [`Value`].
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, UserError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            dependencies: Vec::new(),
            description: None,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            validate: true,
            metadata: Metadata::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare the dependency names, in order. Unknown names become
    /// virtual inputs when the spec is added.
    pub fn dependencies<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a human-readable description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Append a pre-hook, run over the gathered inputs before the node
    /// function. Hooks run in declaration order.
    pub fn pre_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Inputs) -> Result<(), UserError> + Send + Sync + 'static,
    {
        self.pre_hooks.push(Arc::new(hook));
        self
    }

    /// Append a post-hook, run over the output after the node function.
    pub fn post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Value) -> Result<(), UserError> + Send + Sync + 'static,
    {
        self.post_hooks.push(Arc::new(hook));
        self
    }

    /// Enable or disable this node's hooks (default: enabled).
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Attach one metadata tag.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Declare derived outputs by key: each name becomes a derived node
    /// extracting the like-named key from the source's returned object.
    pub fn outputs<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.outputs.push((name.clone(), Extract::Key(name)));
        }
        self
    }

    /// Declare one derived output extracting `key` from the source's
    /// returned object into a node named `id`.
    pub fn output_key(mut self, id: impl Into<String>, key: impl Into<String>) -> Self {
        self.outputs.push((id.into(), Extract::Key(key.into())));
        self
    }

    /// Declare one derived output computed by applying `extract` to the
    /// source's returned object.
    pub fn output_with<F>(mut self, id: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&serde_json::Map<String, Value>) -> Result<Value, UserError>
            + Send
            + Sync
            + 'static,
    {
        self.outputs
            .push((id.into(), Extract::With(Arc::new(extract))));
        self
    }

    /// Split the spec into the node record and its derived-output
    /// declarations.
    pub(crate) fn build(self) -> (Node, Vec<(String, Extract)>) {
        (
            Node {
                name: self.name,
                func: self.func,
                dependencies: self.dependencies,
                description: self.description,
                pre_hooks: self.pre_hooks,
                post_hooks: self.post_hooks,
                validate: self.validate,
                metadata: self.metadata,
            },
            self.outputs,
        )
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}
