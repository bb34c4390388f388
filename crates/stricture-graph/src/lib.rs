//! Import dependency graph over analysed modules.
//!
//! Nodes are module paths tagged with their layer and module boundary (or
//! `unassigned`). Edges carry the import's location, whether it is dynamic,
//! and, when the imported symbols are re-exported, the module that actually
//! defines them. Imports that point outside the analysed tree are `External`
//! and never participate in checks; relative imports to missing files are
//! `Unresolved` and surface as diagnostics instead of violations.

mod cycles;
mod graph;
pub mod resolve;

pub use cycles::{Cycle, strongly_connected};
pub use graph::{
    DependencyGraph, Edge, EdgeTarget, GraphBuilder, GraphNode, ImportKind, ReexportHop,
    UNASSIGNED, build,
};
pub use resolve::{Resolution, Resolver};
