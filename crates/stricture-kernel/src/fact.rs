//! Facts: per-construct observations derived from one module's IR.
//!
//! Facts are manifest-agnostic. They record what the code does (which codes a
//! status check compares, which base a null guard tests, which labels a switch
//! covers) and leave the comparison against declared contracts to the rules.
//! A fact that cannot be tied to a manifest field is skipped by its rule.

use crate::ir::{AssertionKind, Literal, ModuleIr};
use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A fallible call whose result may be used before its status is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheckFact {
    pub location: SourceLocation,
    pub function: String,
    pub callee: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Every use of the bound result is dominated by a status check.
    pub checked_before_use: bool,
    /// First use that no status check dominates.
    #[serde(default)]
    pub first_unchecked_use: Option<SourceLocation>,
    /// Codes compared explicitly anywhere in the function.
    #[serde(default)]
    pub handled_codes: BTreeSet<u16>,
    /// An else branch or switch default follows a status comparison.
    #[serde(default)]
    pub catch_all: bool,
}

/// A fallible call and whether anything protects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPathFact {
    pub location: SourceLocation,
    pub function: String,
    pub callee: String,
    pub protected: bool,
}

/// A dereference through a field that may be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullGuardFact {
    pub location: SourceLocation,
    pub function: String,
    /// Dereferenced expression, e.g. `order.shipping`.
    pub base: String,
    /// Field named by the last segment of `base`.
    pub field: String,
    #[serde(default)]
    pub owner_type: Option<String>,
    pub optional_chain: bool,
    /// A null or truthiness check on `base` dominates the access.
    pub guarded: bool,
}

/// Labels covered by a switch or an equality if/else-if chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumCoverageFact {
    pub location: SourceLocation,
    pub function: String,
    pub discriminant: String,
    pub field: String,
    #[serde(default)]
    pub owner_type: Option<String>,
    pub covered: BTreeSet<String>,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionDepthFact {
    pub location: SourceLocation,
    pub function: String,
    pub subject: String,
    #[serde(default)]
    pub subject_type: Option<String>,
    pub kind: AssertionKind,
    pub asserted_fields: BTreeSet<String>,
}

/// A value bound to a named field, and the validation that precedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFormatFact {
    pub location: SourceLocation,
    pub function: String,
    pub symbol: String,
    pub field: String,
    #[serde(default)]
    pub owner_type: Option<String>,
    #[serde(default)]
    pub literal: Option<Literal>,
    pub range_checked: bool,
    pub format_checked: bool,
}

/// An endpoint call and the fields read around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationFact {
    pub location: SourceLocation,
    pub function: String,
    pub callee: String,
    pub target: String,
    #[serde(default)]
    pub method: Option<String>,
    pub in_loop: bool,
    /// Field names consulted by the enclosing loop (or the whole function
    /// when the call is not looped).
    pub consulted: BTreeSet<String>,
}

/// A write and the read that may have raced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyFact {
    pub location: SourceLocation,
    pub function: String,
    pub resource: String,
    pub callee: String,
    /// A read of the same resource dominating the write.
    #[serde(default)]
    pub read_location: Option<SourceLocation>,
    /// Version check, atomic operation or conditional write in place.
    pub guarded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum Fact {
    StatusCheck(StatusCheckFact),
    ErrorPath(ErrorPathFact),
    NullGuard(NullGuardFact),
    EnumCoverage(EnumCoverageFact),
    AssertionDepth(AssertionDepthFact),
    RangeFormat(RangeFormatFact),
    Pagination(PaginationFact),
    Idempotency(IdempotencyFact),
}

impl Fact {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Fact::StatusCheck(f) => &f.location,
            Fact::ErrorPath(f) => &f.location,
            Fact::NullGuard(f) => &f.location,
            Fact::EnumCoverage(f) => &f.location,
            Fact::AssertionDepth(f) => &f.location,
            Fact::RangeFormat(f) => &f.location,
            Fact::Pagination(f) => &f.location,
            Fact::Idempotency(f) => &f.location,
        }
    }

    pub fn as_status_check(&self) -> Option<&StatusCheckFact> {
        match self {
            Fact::StatusCheck(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_error_path(&self) -> Option<&ErrorPathFact> {
        match self {
            Fact::ErrorPath(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_null_guard(&self) -> Option<&NullGuardFact> {
        match self {
            Fact::NullGuard(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum_coverage(&self) -> Option<&EnumCoverageFact> {
        match self {
            Fact::EnumCoverage(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_assertion_depth(&self) -> Option<&AssertionDepthFact> {
        match self {
            Fact::AssertionDepth(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_range_format(&self) -> Option<&RangeFormatFact> {
        match self {
            Fact::RangeFormat(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_pagination(&self) -> Option<&PaginationFact> {
        match self {
            Fact::Pagination(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_idempotency(&self) -> Option<&IdempotencyFact> {
        match self {
            Fact::Idempotency(f) => Some(f),
            _ => None,
        }
    }
}

/// Module metadata the rules need alongside facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub path: String,
    pub language: String,
    pub line_count: u32,
    pub code_lines: u32,
    pub is_test: bool,
}

impl From<&ModuleIr> for ModuleSummary {
    fn from(module: &ModuleIr) -> Self {
        Self {
            path: module.path.clone(),
            language: module.language.clone(),
            line_count: module.line_count,
            code_lines: module.code_lines,
            is_test: module.is_test,
        }
    }
}

/// All facts of one analysis run, keyed by module path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    modules: BTreeMap<String, ModuleSummary>,
    facts: BTreeMap<String, Vec<Fact>>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module. Replaces anything previously stored under its path.
    pub fn insert(&mut self, summary: ModuleSummary, facts: Vec<Fact>) {
        self.facts.insert(summary.path.clone(), facts);
        self.modules.insert(summary.path.clone(), summary);
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleSummary> {
        self.modules.values()
    }

    pub fn module(&self, path: &str) -> Option<&ModuleSummary> {
        self.modules.get(path)
    }

    pub fn module_facts(&self, path: &str) -> &[Fact] {
        self.facts.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values().flatten()
    }

    /// Typed view: `facts.select(Fact::as_null_guard)`.
    pub fn select<'a, T: 'a>(
        &'a self,
        pick: fn(&'a Fact) -> Option<&'a T>,
    ) -> impl Iterator<Item = &'a T> + 'a {
        self.iter().filter_map(pick)
    }

    pub fn len(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_fact(path: &str, line: u32, guarded: bool) -> Fact {
        Fact::NullGuard(NullGuardFact {
            location: SourceLocation::new(path, line, 1),
            function: "render".into(),
            base: "order.shipping".into(),
            field: "shipping".into(),
            owner_type: Some("Order".into()),
            optional_chain: false,
            guarded,
        })
    }

    #[test]
    fn select_filters_by_kind_in_path_order() {
        let mut set = FactSet::new();
        set.insert(
            ModuleSummary {
                path: "src/b.ts".into(),
                ..ModuleSummary::default()
            },
            vec![guard_fact("src/b.ts", 9, true)],
        );
        set.insert(
            ModuleSummary {
                path: "src/a.ts".into(),
                ..ModuleSummary::default()
            },
            vec![
                guard_fact("src/a.ts", 3, false),
                Fact::ErrorPath(ErrorPathFact {
                    location: SourceLocation::new("src/a.ts", 5, 1),
                    function: "load".into(),
                    callee: "fs.readFile".into(),
                    protected: true,
                }),
            ],
        );

        let files: Vec<_> = set
            .select(Fact::as_null_guard)
            .map(|f| f.location.file.as_str())
            .collect();
        assert_eq!(files, vec!["src/a.ts", "src/b.ts"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.select(Fact::as_error_path).count(), 1);
        assert!(set.module_facts("src/missing.ts").is_empty());
    }

    #[test]
    fn fact_json_is_tagged() {
        let json = serde_json::to_value(guard_fact("src/a.ts", 3, false)).expect("fact serializes");
        assert_eq!(json["fact"], "null_guard");
        assert_eq!(json["base"], "order.shipping");
    }
}
