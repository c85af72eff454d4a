//! Core types for dagpipe
//!
//! The engine moves dynamically typed values between nodes, so the value
//! currency is [`serde_json::Value`] and all user callables are shared,
//! type-erased closures. The aliases here spell out the three callable
//! shapes the engine knows about:
//!
//! | Alias | Receives | Returns |
//! |-------|----------|---------|
//! | [`NodeFn`] | `&Inputs` (gathered dependency values) | `Result<Value, UserError>` |
//! | [`PreFn`] | `&mut Inputs` (may mutate before the call) | `Result<(), UserError>` |
//! | [`PostFn`] | `&mut Value` (may mutate the output) | `Result<(), UserError>` |
//!
//! Callables are stored behind [`Arc`] so subgraph extraction can share
//! them by reference instead of cloning user state.

use crate::errors::UserError;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dynamic value passed between nodes.
pub use serde_json::Value;

/// Free-form metadata tags attached to a node.
pub type Metadata = serde_json::Map<String, Value>;

/// Gathered inputs of a node, keyed by dependency name.
///
/// Also the type of the `inputs` argument to
/// [`Pipeline::execute`](crate::Pipeline::execute), where keys name
/// virtual inputs or bypassed nodes.
pub type Inputs = FxHashMap<String, Value>;

/// A node's computation function.
pub type NodeFn = Arc<dyn Fn(&Inputs) -> Result<Value, UserError> + Send + Sync>;

/// A validation/inspection hook running before a node, over its inputs.
pub type PreFn = Arc<dyn Fn(&mut Inputs) -> Result<(), UserError> + Send + Sync>;

/// A validation/inspection hook running after a node, over its output.
pub type PostFn = Arc<dyn Fn(&mut Value) -> Result<(), UserError> + Send + Sync>;

/// An extractor applied to a multi-output node's returned mapping to
/// produce one derived value.
pub type ExtractFn =
    Arc<dyn Fn(&serde_json::Map<String, Value>) -> Result<Value, UserError> + Send + Sync>;
