//! Rule trait, rule metadata and the shared read-only inputs.

use serde::Serialize;
use std::fmt;
use stricture_graph::DependencyGraph;
use stricture_kernel::{Fact, FactSet, RuleEvaluationError, Severity, SourceLocation, Violation};
use stricture_manifest::Manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// API contract conformance.
    Ctr,
    /// Test quality.
    Tq,
    /// Architecture.
    Arch,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ctr => "ctr",
            Category::Tq => "tq",
            Category::Arch => "arch",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMeta {
    pub id: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub why: &'static str,
    pub default_severity: Severity,
    pub suggested_fix: &'static str,
}

impl RuleMeta {
    /// Violation at `location` with the default severity and fix attached.
    /// The evaluator replaces the severity with the resolved one.
    pub fn violation(&self, location: &SourceLocation, message: impl Into<String>) -> Violation {
        Violation::new(self.id, self.default_severity, location, message).with_fix(self.suggested_fix)
    }

    pub fn failure(&self, message: impl Into<String>) -> RuleEvaluationError {
        RuleEvaluationError {
            rule_id: self.id.to_string(),
            message: message.into(),
        }
    }
}

/// Immutable inputs shared by every rule in one run.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub facts: &'a FactSet,
    pub graph: &'a DependencyGraph,
    pub manifest: &'a Manifest,
}

impl<'a> RuleContext<'a> {
    pub fn new(facts: &'a FactSet, graph: &'a DependencyGraph, manifest: &'a Manifest) -> Self {
        Self {
            facts,
            graph,
            manifest,
        }
    }

    /// Facts from production (non-test) modules.
    pub fn source_facts(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        let facts = self.facts;
        facts
            .modules()
            .filter(|module| !module.is_test)
            .flat_map(move |module| facts.module_facts(&module.path).iter())
    }

    /// Facts from test modules.
    pub fn test_facts(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        let facts = self.facts;
        facts
            .modules()
            .filter(|module| module.is_test)
            .flat_map(move |module| facts.module_facts(&module.path).iter())
    }
}

/// A named check. Implementations are pure over the [`RuleContext`].
pub trait Rule: Send + Sync {
    fn meta(&self) -> &'static RuleMeta;

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError>;
}
