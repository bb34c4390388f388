//! # Stricture Facts
//!
//! Walks function bodies in a [`ModuleIr`](stricture_kernel::ModuleIr) and
//! produces the per-construct [`Fact`](stricture_kernel::Fact)s the rules read.
//!
//! Extraction is pure per module: no manifest, no other modules, no shared
//! state, so callers can run it on a worker pool. Guards are matched by
//! dominance on each function's own control-flow graph; a check performed by
//! a caller is invisible to its callee.
//!
//! ## Architecture
//!
//! ```text
//! FunctionDecl.body ─▶ Cfg ─▶ Dominators
//!                       │         │
//!                       └──┬──────┘
//!              calls (status, error path, pagination, idempotency)
//!              values (null guard, enum coverage, assertion, range/format)
//!                          │
//!                       Vec<Fact>
//! ```

mod calls;
pub mod cfg;
pub mod dominators;
mod extract;
pub mod registry;
mod values;

pub use cfg::{Cfg, CfgNode, ENTRY, EXIT};
pub use dominators::Dominators;
pub use extract::{Extractor, extract};
pub use registry::{CallKind, FallibleEntry, FallibleRegistry};
