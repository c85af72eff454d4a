//! # dagpipe
//!
//! A lightweight DAG-based computational pipeline engine.
//!
//! Programs build a graph of named computation steps, inject external
//! values for unbound dependencies, skip steps by supplying precomputed
//! values, and execute the minimal subgraph needed for the outputs they
//! ask for.
//!
//! ## Features
//!
//! - **Virtual inputs**: dependencies that are not nodes become
//!   placeholders whose values are supplied at execution time
//! - **Bypasses**: provide a value under a node's name to skip the node
//!   and everything only it needed
//! - **Validation hooks**: per-node pre/post callables with a per-node
//!   and a global on/off switch
//! - **Multi-output nodes**: a node returning a JSON object can fan out
//!   into one derived node per field
//! - **Introspection**: topological listings, required-input queries,
//!   subgraph extraction, and Graphviz export
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
//!     )?
//!     .add_node(
//!         NodeSpec::new("c", |i| Ok(json!(i["b"].as_i64().unwrap_or(0) * 2)))
//!             .dependencies(["b"]),
//!     )?;
//!
//! // Only the ancestors of the requested output run.
//! let results = pipeline.execute(&["c"], Inputs::default())?;
//! assert_eq!(results["c"], json!(4));
//!
//! // Bypassing "b" skips both "b" and "a".
//! let inputs = Inputs::from_iter([("b".to_string(), json!(100))]);
//! let results = pipeline.execute(&["c"], inputs)?;
//! assert_eq!(results["c"], json!(200));
//! # Ok::<(), dagpipe::PipelineError>(())
//! ```

pub mod errors;
pub mod node;
pub mod pipeline;
pub mod types;

mod graph;

// Re-export commonly used types
pub use errors::{ErrorCode, Phase, PipelineError, Result, UserError};
pub use node::{Node, NodeSpec};
pub use pipeline::{DotOptions, Pipeline};
pub use types::{Inputs, Metadata, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
