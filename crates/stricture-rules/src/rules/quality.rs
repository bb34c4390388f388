//! TQ rules: test quality.

use crate::rule::{Category, Rule, RuleContext, RuleMeta};
use std::collections::BTreeSet;
use stricture_kernel::ir::expr;
use stricture_kernel::{
    AssertionDepthFact, AssertionKind, Fact, RuleEvaluationError, Severity, Violation,
};

pub struct NoShallowAssertions;

const NO_SHALLOW_ASSERTIONS: RuleMeta = RuleMeta {
    id: "TQ-no-shallow-assertions",
    category: Category::Tq,
    description: "Assert on values, not just existence or type",
    why: "An assertion that only checks a value exists passes for every wrong value too.",
    default_severity: Severity::Error,
    suggested_fix: "Compare the value itself, or assert each required field of the returned object.",
};

impl Rule for NoShallowAssertions {
    fn meta(&self) -> &'static RuleMeta {
        &NO_SHALLOW_ASSERTIONS
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let min_fraction = ctx.manifest.assertions.min_field_fraction;
        Ok(ctx
            .facts
            .iter()
            .filter_map(Fact::as_assertion_depth)
            .filter_map(|fact| shallow(ctx, fact, min_fraction))
            .collect())
    }
}

fn shallow(ctx: &RuleContext<'_>, fact: &AssertionDepthFact, min_fraction: f64) -> Option<Violation> {
    let message = match fact.kind {
        AssertionKind::ExistenceOnly => format!(
            "Shallow assertion on '{}' only checks existence, assert its value instead",
            fact.subject
        ),
        AssertionKind::TypeofOnly => format!(
            "Shallow assertion on '{}' only checks its type, assert its value instead",
            fact.subject
        ),
        AssertionKind::ValueEquality if fact.asserted_fields.is_empty() => return None,
        AssertionKind::ValueEquality | AssertionKind::Structural => {
            let shape = ctx.manifest.shape(fact.subject_type.as_deref()?)?;
            let required: Vec<&str> = shape.required_fields().map(|f| f.name.as_str()).collect();
            if required.is_empty() {
                return None;
            }
            let asserted: BTreeSet<String> =
                fact.asserted_fields.iter().map(|f| expr::label_key(f)).collect();
            let hit = required
                .iter()
                .filter(|name| asserted.contains(&expr::label_key(name)))
                .count();
            let fraction = hit as f64 / required.len() as f64;
            if fraction + f64::EPSILON >= min_fraction {
                return None;
            }
            format!(
                "Assertion on '{}' checks {hit} of {} required {} fields (minimum {:.0}%)",
                fact.subject,
                required.len(),
                shape.name.as_deref().unwrap_or("response"),
                min_fraction * 100.0
            )
        }
    };
    Some(NO_SHALLOW_ASSERTIONS.violation(&fact.location, message))
}
