//! Error types for dagpipe
//!
//! This module defines the error types used throughout the library.
//! Every [`PipelineError`] variant maps to a stable [`ErrorCode`] so
//! embedders can match on categories without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type produced by user-supplied node functions and hooks.
///
/// Anything convertible into a boxed error works, including plain strings:
///
/// ```
/// use dagpipe::UserError;
///
/// let err: UserError = "value must be non-negative".into();
/// assert!(err.to_string().contains("non-negative"));
/// ```
pub type UserError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ─── Error codes ────────────────────────────────────────────────────────────

/// Stable error category for programmatic matching.
///
/// Serialized in snake_case, e.g. `"missing_input"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed name, duplicate dependency, unknown output/input key,
    /// or a collision in derived-output expansion.
    InvalidArgument,
    /// Replacing or removing a node that other nodes depend on.
    Conflict,
    /// A graph edit would create a cycle.
    Cycle,
    /// A required virtual input was not supplied at execution time.
    MissingInput,
    /// A requested output cannot be produced from the supplied inputs.
    UnreachableOutput,
    /// A node function or hook failed; the engine wraps and re-raises.
    UserRaised,
    /// Graphviz invocation or output I/O failed.
    Render,
}

impl ErrorCode {
    /// The snake_case name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Cycle => "cycle",
            Self::MissingInput => "missing_input",
            Self::UnreachableOutput => "unreachable_output",
            Self::UserRaised => "user_raised",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Execution phase ────────────────────────────────────────────────────────

/// The phase of node evaluation in which a user callable failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// A pre-hook, running over the gathered inputs mapping.
    Pre,
    /// The node function itself.
    Func,
    /// A post-hook, running over the node's output value.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pre => "pre",
            Self::Func => "func",
            Self::Post => "post",
        })
    }
}

// ─── Main error type ────────────────────────────────────────────────────────

/// Main error type for dagpipe
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Node names must contain at least one non-whitespace character
    #[error("node name must not be empty or whitespace")]
    EmptyNodeName,

    /// A dependency name was listed more than once
    #[error("node '{node}' declares dependency '{dependency}' more than once")]
    DuplicateDependency { node: String, dependency: String },

    /// A derived output name was declared more than once on one node
    #[error("derived output '{name}' is declared more than once")]
    DuplicateOutput { name: String },

    /// A derived output name collides with an existing node or its source
    #[error("derived output '{name}' collides with an existing node")]
    OutputCollision { name: String },

    /// Lookup of a node that does not exist
    #[error("node '{name}' not found")]
    NodeNotFound { name: String },

    /// A requested output is not a registered node
    #[error("output '{name}' is not a node in the pipeline")]
    UnknownOutput { name: String },

    /// An execution input key matches neither a node nor a virtual input
    #[error("input key '{name}' is neither a node nor a virtual input")]
    UnknownInput { name: String },

    /// Re-adding a node that downstream nodes still depend on
    #[error("cannot replace node '{name}': nodes {dependents:?} depend on it")]
    ReplaceWithDependents {
        name: String,
        dependents: Vec<String>,
    },

    /// Removing a node that downstream nodes still depend on
    #[error("cannot remove node '{name}': nodes {dependents:?} depend on it")]
    RemoveWithDependents {
        name: String,
        dependents: Vec<String>,
    },

    /// The requested edit would make the graph cyclic
    #[error("adding node '{name}' would create a cycle")]
    CycleDetected { name: String },

    /// Required virtual inputs were not provided at execution time
    #[error("missing required virtual inputs: {missing:?}")]
    MissingInputs { missing: Vec<String> },

    /// An output has no root among the provided inputs and bypasses
    #[error(
        "output '{output}' is not reachable from the provided inputs; \
         virtual inputs without values: {missing:?}"
    )]
    UnreachableOutput {
        output: String,
        missing: Vec<String>,
    },

    /// A user-supplied function or hook failed during execution
    #[error("node '{node}' failed in {phase} phase: {source}")]
    NodeFailed {
        node: String,
        phase: Phase,
        #[source]
        source: UserError,
    },

    /// Graphviz rendering or file output failed
    #[error("graph rendering failed: {message}")]
    Render { message: String },
}

impl PipelineError {
    /// The stable [`ErrorCode`] for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyNodeName
            | Self::DuplicateDependency { .. }
            | Self::DuplicateOutput { .. }
            | Self::OutputCollision { .. }
            | Self::NodeNotFound { .. }
            | Self::UnknownOutput { .. }
            | Self::UnknownInput { .. } => ErrorCode::InvalidArgument,
            Self::ReplaceWithDependents { .. } | Self::RemoveWithDependents { .. } => {
                ErrorCode::Conflict
            }
            Self::CycleDetected { .. } => ErrorCode::Cycle,
            Self::MissingInputs { .. } => ErrorCode::MissingInput,
            Self::UnreachableOutput { .. } => ErrorCode::UnreachableOutput,
            Self::NodeFailed { .. } => ErrorCode::UserRaised,
            Self::Render { .. } => ErrorCode::Render,
        }
    }

    /// Wrap a user callable failure with node and phase context.
    pub(crate) fn node_failed(node: impl Into<String>, phase: Phase, source: UserError) -> Self {
        Self::NodeFailed {
            node: node.into(),
            phase,
            source,
        }
    }

    /// Check if this error originated in user code rather than the engine.
    pub fn is_user_raised(&self) -> bool {
        matches!(self, Self::NodeFailed { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Render {
            message: err.to_string(),
        }
    }
}
