//! # Stricture Kernel
//!
//! Shared vocabulary of the conformance checker: the language-neutral IR that
//! front ends produce, the facts extracted from it, and the violations and
//! diagnostics that come out the other end.
//!
//! This crate is **language-agnostic**: nothing here knows what TypeScript,
//! Python or Go look like. Front ends lower source into [`ModuleIr`]; every
//! later stage reads only IR.
//!
//! ## Architecture
//!
//! ```text
//! source file ─(front end)─▶ ModuleIr        ← imports, functions, nodes
//!                               │
//!                   ┌───────────┴───────────┐
//!            DependencyGraph              FactSet   ← per-module facts
//!                   └───────────┬───────────┘
//!                          rules + Manifest
//!                               │
//!                    Violation / Diagnostic
//! ```

pub mod error;
pub mod fact;
pub mod ir;
pub mod location;
pub mod violation;

pub use error::{ParseError, RuleEvaluationError};
pub use fact::{
    AssertionDepthFact, EnumCoverageFact, ErrorPathFact, Fact, FactSet, IdempotencyFact,
    ModuleSummary, NullGuardFact, PaginationFact, RangeFormatFact, StatusCheckFact,
};
pub use ir::{
    Assertion, AssertionKind, CallExpr, Conditional, Directive, DirectiveKind, Effect, EffectKind,
    ExitStmt, FieldBinding, FunctionDecl, Guard, GuardKind, Import, Literal, LoopStmt, ModuleIr,
    Node, NodeKind, Parameter, PropertyAccess, SwitchCase, SwitchStmt, TryCatch,
};
pub use location::{LineRange, SourceLocation};
pub use violation::{Diagnostic, DiagnosticKind, Severity, Violation};
