//! # Stricture Rules
//!
//! The rule catalogue and its evaluator. A rule is a pure function of
//! ([`FactSet`](stricture_kernel::FactSet), [`DependencyGraph`](stricture_graph::DependencyGraph),
//! [`Manifest`](stricture_manifest::Manifest)) returning violations; rules
//! never see each other's output and run in any order.
//!
//! ## Architecture
//!
//! ```text
//! RuleRegistry (sorted by id)
//!      │ plan(manifest): drop "off" rules, resolve severities
//!      ▼
//! Evaluator ── rayon ──▶ Rule::check(&RuleContext) per rule
//!      │                    │ Ok(violations)  │ Err / panic
//!      ▼                    ▼                 ▼
//! Evaluation { violations (severity applied), diagnostics }
//! ```
//!
//! Rule ids follow `CATEGORY-kebab-name`: `CTR-*` for contract conformance,
//! `TQ-*` for test quality, `ARCH-*` for import structure.

pub mod error;
pub mod evaluator;
pub mod registry;
pub mod rule;
pub mod rules;

pub use error::ConfigError;
pub use evaluator::{Evaluation, Evaluator};
pub use registry::{RuleRegistry, resolve_severity};
pub use rule::{Category, Rule, RuleContext, RuleMeta};
