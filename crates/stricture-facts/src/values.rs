//! Value facts: null guards, enum coverage, assertion depth, range and format.

use crate::calls::is_status_expr;
use crate::extract::FunctionScope;
use std::collections::BTreeSet;
use stricture_kernel::ir::expr;
use stricture_kernel::{
    AssertionDepthFact, AssertionKind, Conditional, EnumCoverageFact, Fact, FieldBinding,
    GuardKind, Node, NodeKind, NullGuardFact, PropertyAccess, RangeFormatFact, SwitchStmt,
};

pub(crate) fn collect(scope: &FunctionScope<'_>, out: &mut Vec<Fact>) {
    let mut chained: BTreeSet<*const Node> = BTreeSet::new();
    for (id, node) in scope.cfg.statements() {
        match &node.kind {
            NodeKind::PropertyAccess(access) => {
                if let Some(fact) = null_guard(scope, id, node, access) {
                    out.push(Fact::NullGuard(fact));
                }
            }
            NodeKind::Switch(sw) => {
                if let Some(fact) = switch_coverage(scope, node, sw) {
                    out.push(Fact::EnumCoverage(fact));
                }
            }
            NodeKind::Conditional(cond) => {
                if !chained.contains(&std::ptr::from_ref(node))
                    && let Some(fact) = chain_coverage(scope, node, cond, &mut chained)
                {
                    out.push(Fact::EnumCoverage(fact));
                }
            }
            NodeKind::Assertion(assertion) => {
                out.push(Fact::AssertionDepth(AssertionDepthFact {
                    location: scope.location(node),
                    function: scope.function.to_string(),
                    subject: expr::normalize(&assertion.subject),
                    subject_type: assertion.subject_type.clone(),
                    kind: assertion.kind,
                    asserted_fields: assertion.asserted_fields.iter().cloned().collect(),
                }));
            }
            NodeKind::FieldBinding(binding) => {
                out.push(Fact::RangeFormat(range_format(scope, id, node, binding)));
            }
            _ => {}
        }
    }
}

fn null_guard(
    scope: &FunctionScope<'_>,
    id: usize,
    node: &Node,
    access: &PropertyAccess,
) -> Option<NullGuardFact> {
    let base = expr::normalize(&access.base);
    // A bare local only names a manifest field when the front end typed it.
    if base.is_empty() || (!base.contains('.') && access.owner_type.is_none()) {
        return None;
    }
    let guarded = access.optional_chain
        || scope.dominated_by(id, |_, guard_node| guards_non_null(guard_node, &base));
    Some(NullGuardFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        field: expr::last_segment(&base),
        base,
        owner_type: access.owner_type.clone(),
        optional_chain: access.optional_chain,
        guarded,
    })
}

/// `node` establishes that `base` is not null on the paths it dominates.
fn guards_non_null(node: &Node, base: &str) -> bool {
    // A truthy test of a deeper path implies the base is present.
    let covers = |subject: &str| !subject.is_empty() && expr::mentions(subject, base);
    match &node.kind {
        NodeKind::Conditional(cond) => {
            matches!(
                cond.guard.kind,
                GuardKind::NullCheck | GuardKind::Truthy | GuardKind::Equality
            ) && covers(&cond.guard.subject)
        }
        NodeKind::Loop(lp) => lp.condition.as_ref().is_some_and(|guard| {
            matches!(guard.kind, GuardKind::NullCheck | GuardKind::Truthy) && covers(&guard.subject)
        }),
        NodeKind::Assertion(assertion) => {
            assertion.kind == AssertionKind::ExistenceOnly && expr::same(&assertion.subject, base)
        }
        _ => false,
    }
}

fn switch_coverage(scope: &FunctionScope<'_>, node: &Node, sw: &SwitchStmt) -> Option<EnumCoverageFact> {
    let discriminant = expr::normalize(&sw.discriminant);
    if discriminant.is_empty() {
        return None;
    }
    let covered: BTreeSet<String> = sw.covered_labels().map(expr::label).collect();
    let numeric = covered.iter().all(|label| label.parse::<u16>().is_ok());
    if numeric && is_status_expr(&discriminant) {
        return None;
    }
    Some(EnumCoverageFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        field: expr::last_segment(&discriminant),
        discriminant,
        owner_type: sw.owner_type.clone(),
        covered,
        has_default: sw.default.is_some(),
    })
}

/// `if (x == a) .. else if (x == b) ..` on one subject, reported at its head.
fn chain_coverage(
    scope: &FunctionScope<'_>,
    node: &Node,
    head: &Conditional,
    chained: &mut BTreeSet<*const Node>,
) -> Option<EnumCoverageFact> {
    if head.guard.kind != GuardKind::Equality || head.guard.values.is_empty() {
        return None;
    }
    let subject = expr::normalize(&head.guard.subject);
    let mut covered: BTreeSet<String> = BTreeSet::new();
    let mut links = 0usize;
    let mut has_default = false;
    let mut cursor = head;
    loop {
        links += 1;
        covered.extend(cursor.guard.values.iter().map(|v| expr::label(v)));
        let Some(else_branch) = &cursor.else_branch else {
            break;
        };
        match else_branch.as_slice() {
            [next] => match &next.kind {
                NodeKind::Conditional(inner)
                    if inner.guard.kind == GuardKind::Equality
                        && expr::same(&inner.guard.subject, &subject) =>
                {
                    chained.insert(std::ptr::from_ref(next));
                    cursor = inner;
                }
                _ => {
                    has_default = true;
                    break;
                }
            },
            [] => break,
            _ => {
                has_default = true;
                break;
            }
        }
    }
    if links < 2 {
        return None;
    }
    Some(EnumCoverageFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        field: expr::last_segment(&subject),
        discriminant: subject,
        owner_type: None,
        covered,
        has_default,
    })
}

fn range_format(
    scope: &FunctionScope<'_>,
    id: usize,
    node: &Node,
    binding: &FieldBinding,
) -> RangeFormatFact {
    let symbol = expr::normalize(&binding.symbol);
    let related =
        |other: &str| !other.is_empty() && (expr::mentions(other, &symbol) || expr::mentions(&symbol, other));
    let validated = |_: usize, other: &Node| match &other.kind {
        NodeKind::Call(call) => {
            scope.registry.is_validator(&call.callee)
                && (call.arguments.iter().any(|arg| related(arg))
                    || call.receiver_symbol().is_some_and(|r| related(r)))
        }
        _ => false,
    };
    let checked = |kind: GuardKind| {
        scope.dominated_by(id, |guard_id, other| {
            validated(guard_id, other)
                || FunctionScope::guard_of(other)
                    .is_some_and(|guard| guard.kind == kind && related(&guard.subject))
        })
    };
    let range_checked = checked(GuardKind::RangeCheck);
    let format_checked = checked(GuardKind::FormatCheck);
    RangeFormatFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        symbol,
        field: binding.field.clone(),
        owner_type: binding.owner_type.clone(),
        literal: binding.literal.clone(),
        range_checked,
        format_checked,
    }
}
