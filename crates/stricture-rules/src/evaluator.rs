//! Runs every planned rule against one immutable [`RuleContext`].
//!
//! Rules execute on the rayon pool and send their results to a single
//! collector over a channel. A rule that errors or panics becomes a
//! `rule-evaluation` diagnostic; the other rules' output is kept.

use crate::error::ConfigError;
use crate::registry::RuleRegistry;
use crate::rule::{Rule, RuleContext};
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use stricture_kernel::{Diagnostic, RuleEvaluationError, Severity, Violation};
use tracing::{debug, error};

/// Unordered rule output plus per-rule failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub violations: Vec<Violation>,
    pub diagnostics: Vec<Diagnostic>,
}

enum Outcome {
    Passed(Vec<Violation>),
    Failed(RuleEvaluationError),
}

pub struct Evaluator<'r> {
    registry: &'r RuleRegistry,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Evaluation, ConfigError> {
        let plan = self.registry.plan(ctx.manifest)?;
        debug!(rules = plan.len(), "evaluating rules");

        let (tx, rx) = mpsc::channel::<Outcome>();
        plan.par_iter().for_each_with(tx, |tx, (rule, severity)| {
            let outcome = run(*rule, *severity, ctx);
            if tx.send(outcome).is_err() {
                error!("rule result collector closed early");
            }
        });

        let mut evaluation = Evaluation {
            diagnostics: self.registry.unknown_rule_options(ctx.manifest),
            ..Evaluation::default()
        };
        for outcome in rx {
            match outcome {
                Outcome::Passed(violations) => evaluation.violations.extend(violations),
                Outcome::Failed(err) => {
                    error!(rule = %err.rule_id, message = %err.message, "rule evaluation failed");
                    evaluation.diagnostics.push(err.to_diagnostic());
                }
            }
        }
        evaluation.diagnostics.sort();
        Ok(evaluation)
    }
}

fn run(rule: &dyn Rule, severity: Severity, ctx: &RuleContext<'_>) -> Outcome {
    let meta = rule.meta();
    match catch_unwind(AssertUnwindSafe(|| rule.check(ctx))) {
        Ok(Ok(mut violations)) => {
            for violation in &mut violations {
                violation.severity = severity;
            }
            debug!(rule = meta.id, found = violations.len(), "rule finished");
            Outcome::Passed(violations)
        }
        Ok(Err(err)) => Outcome::Failed(err),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Outcome::Failed(meta.failure(format!("rule panicked: {message}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Category, RuleMeta};
    use stricture_graph::DependencyGraph;
    use stricture_kernel::{DiagnosticKind, FactSet, SourceLocation};
    use stricture_manifest::Manifest;

    struct Exploding;

    const EXPLODING: RuleMeta = RuleMeta {
        id: "ARCH-zz-exploding",
        category: Category::Arch,
        description: "always panics",
        why: "exercises isolation",
        default_severity: Severity::Error,
        suggested_fix: "none",
    };

    impl Rule for Exploding {
        fn meta(&self) -> &'static RuleMeta {
            &EXPLODING
        }

        fn check(&self, _: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
            panic!("boom");
        }
    }

    struct Constant;

    const CONSTANT: RuleMeta = RuleMeta {
        id: "ARCH-zz-constant",
        category: Category::Arch,
        description: "one finding",
        why: "exercises severity",
        default_severity: Severity::Error,
        suggested_fix: "none",
    };

    impl Rule for Constant {
        fn meta(&self) -> &'static RuleMeta {
            &CONSTANT
        }

        fn check(&self, _: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
            Ok(vec![CONSTANT.violation(&SourceLocation::new("a.ts", 1, 1), "found")])
        }
    }

    #[test]
    fn panicking_rule_is_isolated() {
        let mut registry = RuleRegistry::empty();
        registry.register(Box::new(Exploding)).expect("register");
        registry.register(Box::new(Constant)).expect("register");
        let manifest = Manifest::from_yaml_str("strictness: { mode: lenient }", "m.yml")
            .expect("manifest");
        let facts = FactSet::new();
        let graph = DependencyGraph::default();
        let ctx = RuleContext::new(&facts, &graph, &manifest);

        let evaluation = Evaluator::new(&registry).evaluate(&ctx).expect("evaluates");
        assert_eq!(evaluation.violations.len(), 1);
        assert_eq!(evaluation.violations[0].severity, Severity::Warning);
        assert_eq!(evaluation.diagnostics.len(), 1);
        assert_eq!(evaluation.diagnostics[0].kind, DiagnosticKind::RuleEvaluation);
        assert_eq!(
            evaluation.diagnostics[0].rule_id.as_deref(),
            Some("ARCH-zz-exploding")
        );
        assert!(evaluation.diagnostics[0].message.contains("boom"));
    }
}
