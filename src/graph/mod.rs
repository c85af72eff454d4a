//! Graph storage for pipelines.

mod dag;

pub(crate) use dag::DependencyDag;
