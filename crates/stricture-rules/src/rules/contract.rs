//! CTR rules: source code against the manifest's API contracts.
//!
//! Every rule here reads facts from production modules only and stays silent
//! when the manifest declares no contracts. Facts whose field or endpoint
//! cannot be resolved against the manifest are skipped.

use super::{in_file, join};
use crate::rule::{Category, Rule, RuleContext, RuleMeta};
use std::collections::BTreeSet;
use stricture_kernel::ir::expr;
use stricture_kernel::{
    EnumCoverageFact, Fact, LineRange, Literal, RangeFormatFact, RuleEvaluationError, Severity,
    Violation,
};
use stricture_manifest::Field;

fn has_contracts(ctx: &RuleContext<'_>) -> bool {
    !ctx.manifest.contracts.is_empty()
}

pub struct StatusCodeHandling;

const STATUS_CODE_HANDLING: RuleMeta = RuleMeta {
    id: "CTR-status-code-handling",
    category: Category::Ctr,
    description: "Check the response status before using the body, and handle every declared status",
    why: "Reading an error body as success data corrupts state silently.",
    default_severity: Severity::Error,
    suggested_fix: "Branch on the response status before reading the body and handle each status the endpoint declares.",
};

impl Rule for StatusCodeHandling {
    fn meta(&self) -> &'static RuleMeta {
        &STATUS_CODE_HANDLING
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for fact in ctx.source_facts().filter_map(Fact::as_status_check) {
            if !fact.checked_before_use {
                let end = fact
                    .first_unchecked_use
                    .as_ref()
                    .map_or(fact.location.line, |used| used.line);
                out.push(
                    STATUS_CODE_HANDLING
                        .violation(
                            &fact.location,
                            format!(
                                "Response from {} is used before its status code is checked",
                                fact.callee
                            ),
                        )
                        .with_lines(LineRange::new(fact.location.line, end)),
                );
                continue;
            }
            if fact.catch_all {
                continue;
            }
            let Some(target) = fact.target.as_deref() else {
                continue;
            };
            let Some((_, endpoint)) = ctx.manifest.endpoint_for(target, fact.method.as_deref())
            else {
                continue;
            };
            let missing: Vec<u16> = endpoint
                .status_codes
                .iter()
                .copied()
                .filter(|code| !(200..300).contains(code) && !fact.handled_codes.contains(code))
                .collect();
            if missing.is_empty() {
                continue;
            }
            out.push(STATUS_CODE_HANDLING.violation(
                &fact.location,
                format!(
                    "Server can return status {} but client only handles {}, missing: {}",
                    join(endpoint.status_codes.iter().map(u16::to_string)),
                    if fact.handled_codes.is_empty() {
                        "none".to_string()
                    } else {
                        join(fact.handled_codes.iter().map(u16::to_string))
                    },
                    join(missing.iter().map(u16::to_string)),
                ),
            ));
        }
        Ok(out)
    }
}

pub struct ErrorHandling;

const ERROR_HANDLING: RuleMeta = RuleMeta {
    id: "CTR-error-handling",
    category: Category::Ctr,
    description: "Wrap fallible calls in error handling",
    why: "An unhandled network or I/O failure crashes the caller or leaks a half-finished operation.",
    default_severity: Severity::Error,
    suggested_fix: "Wrap the call in try/catch (or check the returned error) and handle the failure path.",
};

impl Rule for ErrorHandling {
    fn meta(&self) -> &'static RuleMeta {
        &ERROR_HANDLING
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        Ok(ctx
            .source_facts()
            .filter_map(Fact::as_error_path)
            .filter(|fact| !fact.protected)
            .map(|fact| {
                ERROR_HANDLING.violation(
                    &fact.location,
                    format!(
                        "Call to {} can fail but has no error handling in {}",
                        fact.callee, fact.function
                    ),
                )
            })
            .collect())
    }
}

pub struct NullSafety;

const NULL_SAFETY: RuleMeta = RuleMeta {
    id: "CTR-null-safety",
    category: Category::Ctr,
    description: "Guard nullable contract fields before dereferencing them",
    why: "The contract says the field may be null; dereferencing it unguarded throws at runtime.",
    default_severity: Severity::Error,
    suggested_fix: "Use optional chaining or check the field for null before accessing its members.",
};

impl Rule for NullSafety {
    fn meta(&self) -> &'static RuleMeta {
        &NULL_SAFETY
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for fact in ctx.source_facts().filter_map(Fact::as_null_guard) {
            if fact.guarded {
                continue;
            }
            let Some(field) = ctx
                .manifest
                .resolve_field(fact.owner_type.as_deref(), &fact.field)
            else {
                continue;
            };
            if field.nullable {
                out.push(NULL_SAFETY.violation(
                    &fact.location,
                    format!(
                        "Field '{}' is nullable but '{}' is dereferenced without a null check",
                        field.name, fact.base
                    ),
                ));
            }
        }
        Ok(out)
    }
}

pub struct StrictnessParity;

const STRICTNESS_PARITY: RuleMeta = RuleMeta {
    id: "CTR-strictness-parity",
    category: Category::Ctr,
    description: "Match the contract's enum, range and format constraints in code",
    why: "Code that is looser than the contract accepts or emits values the other side rejects.",
    default_severity: Severity::Error,
    suggested_fix: "Handle every declared enum value (or add a default branch) and validate ranged or formatted values before use.",
};

impl Rule for StrictnessParity {
    fn meta(&self) -> &'static RuleMeta {
        &STRICTNESS_PARITY
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for fact in ctx.source_facts() {
            let found = match fact {
                Fact::EnumCoverage(coverage) => enum_gap(ctx, coverage),
                Fact::RangeFormat(binding) => unchecked_binding(ctx, binding),
                _ => None,
            };
            out.extend(found);
        }
        Ok(out)
    }
}

fn enum_gap(ctx: &RuleContext<'_>, fact: &EnumCoverageFact) -> Option<Violation> {
    if fact.has_default {
        return None;
    }
    let field = ctx
        .manifest
        .resolve_field(fact.owner_type.as_deref(), &fact.field)
        .filter(|field| field.is_enum())?;
    let covered: BTreeSet<String> = fact.covered.iter().map(|l| expr::label_key(l)).collect();
    let missing: Vec<&str> = field
        .enum_values
        .iter()
        .filter(|value| !covered.contains(&expr::label_key(value)))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(STRICTNESS_PARITY.violation(
        &fact.location,
        format!(
            "Enum field '{}' has {} values but '{}' handles only {}, missing: {}",
            field.name,
            field.enum_values.len(),
            fact.discriminant,
            fact.covered.len(),
            join(&missing)
        ),
    ))
}

fn unchecked_binding(ctx: &RuleContext<'_>, fact: &RangeFormatFact) -> Option<Violation> {
    let field = ctx
        .manifest
        .resolve_field(fact.owner_type.as_deref(), &fact.field)?;
    let message = match &fact.literal {
        Some(literal) => literal_mismatch(field, literal)?,
        None => binding_gap(field, fact)?,
    };
    Some(STRICTNESS_PARITY.violation(&fact.location, message))
}

fn literal_mismatch(field: &Field, literal: &Literal) -> Option<String> {
    match literal {
        Literal::Number(value) => field
            .range
            .filter(|range| !range.contains(*value))
            .map(|range| {
                format!(
                    "Literal {value} for field '{}' is outside declared range {range}",
                    field.name
                )
            }),
        Literal::Text(text) => {
            if field.is_enum() && !field.enum_values.iter().any(|v| v == text) {
                return Some(format!(
                    "Literal '{text}' for field '{}' is not one of: {}",
                    field.name,
                    join(&field.enum_values)
                ));
            }
            field
                .format
                .as_ref()
                .filter(|format| !format.matches(text))
                .map(|format| {
                    format!(
                        "Literal '{text}' for field '{}' does not match format {}",
                        field.name,
                        format.name()
                    )
                })
        }
        Literal::Bool(_) => None,
    }
}

fn binding_gap(field: &Field, fact: &RangeFormatFact) -> Option<String> {
    if let Some(range) = field.range
        && !fact.range_checked
    {
        return Some(format!(
            "Value '{}' flows into field '{}' without checking declared range {range}",
            fact.symbol, field.name
        ));
    }
    if let Some(format) = &field.format
        && !fact.format_checked
    {
        return Some(format!(
            "Value '{}' flows into field '{}' without validating format {}",
            fact.symbol,
            field.name,
            format.name()
        ));
    }
    None
}

pub struct Pagination;

const PAGINATION: RuleMeta = RuleMeta {
    id: "CTR-pagination",
    category: Category::Ctr,
    description: "Consult the endpoint's has-more signal when fetching paginated results",
    why: "Ignoring the has-more field silently drops every page after the first.",
    default_severity: Severity::Error,
    suggested_fix: "Loop until the contract's has-more field reports no further pages.",
};

impl Rule for Pagination {
    fn meta(&self) -> &'static RuleMeta {
        &PAGINATION
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for fact in ctx.source_facts().filter_map(Fact::as_pagination) {
            let Some((_, endpoint)) = ctx
                .manifest
                .endpoint_for(&fact.target, fact.method.as_deref())
            else {
                continue;
            };
            let Some(pagination) = &endpoint.pagination else {
                continue;
            };
            let wanted = expr::label_key(&pagination.has_more_field);
            if fact.consulted.iter().any(|seen| expr::label_key(seen) == wanted) {
                continue;
            }
            let context = if fact.in_loop { "in a loop" } else { "once" };
            out.push(PAGINATION.violation(
                &fact.location,
                format!(
                    "Paginated endpoint {} {} is called {context} without consulting '{}'",
                    endpoint.method, endpoint.path, pagination.has_more_field
                ),
            ));
        }
        Ok(out)
    }
}

pub struct Idempotency;

const IDEMPOTENCY: RuleMeta = RuleMeta {
    id: "CTR-idempotency",
    category: Category::Ctr,
    description: "Guard read-modify-write sequences against concurrent updates",
    why: "Two requests that read the same value and write it back lose one of the updates.",
    default_severity: Severity::Error,
    suggested_fix: "Use an atomic update, a version check, or a conditional write (If-Match) instead of read then write.",
};

impl Rule for Idempotency {
    fn meta(&self) -> &'static RuleMeta {
        &IDEMPOTENCY
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        if !has_contracts(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for fact in ctx.source_facts().filter_map(Fact::as_idempotency) {
            let Some(read) = &fact.read_location else {
                continue;
            };
            if fact.guarded {
                continue;
            }
            let location = in_file(&fact.location, &read.file);
            out.push(
                IDEMPOTENCY
                    .violation(
                        &location,
                        format!(
                            "Write to '{}' via {} follows an unguarded read at line {} (read-modify-write race)",
                            fact.resource, fact.callee, read.line
                        ),
                    )
                    .with_lines(LineRange::new(read.line, fact.location.line)),
            );
        }
        Ok(out)
    }
}
