//! Inline suppression directives compiled per file.
//!
//! ```text
//! // stricture-disable-file CTR-pagination -- legacy client
//! // stricture-disable ARCH-module-boundary
//! ...
//! // stricture-enable ARCH-module-boundary
//! // stricture-disable-next-line
//! ```
//!
//! Front ends capture these as [`Directive`]s; an empty rule list means
//! every rule. A violation is suppressed when its first line is covered.

use std::collections::BTreeSet;
use stricture_kernel::{Directive, DirectiveKind, Violation};

/// Rules a directive applies to. With `all`, `ids` lists exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleSet {
    all: bool,
    ids: BTreeSet<String>,
}

impl RuleSet {
    fn from_directive(directive: &Directive) -> Self {
        Self {
            all: directive.rules.is_empty(),
            ids: directive.rules.iter().cloned().collect(),
        }
    }

    fn covers(&self, rule_id: &str) -> bool {
        self.all != self.ids.contains(rule_id)
    }

    fn without(&self, rules: &[String]) -> Self {
        let mut next = self.clone();
        for rule in rules {
            if next.all {
                next.ids.insert(rule.clone());
            } else {
                next.ids.remove(rule);
            }
        }
        next
    }

    fn is_empty(&self) -> bool {
        !self.all && self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    rules: RuleSet,
    start: u32,
    /// Inclusive; `None` runs to the end of the file.
    end: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionPolicy {
    spans: Vec<Span>,
}

impl SuppressionPolicy {
    pub fn from_directives(directives: &[Directive]) -> Self {
        let mut ordered: Vec<&Directive> = directives.iter().collect();
        ordered.sort_by_key(|d| d.line);

        let mut spans = Vec::new();
        let mut open: Vec<(RuleSet, u32)> = Vec::new();
        for directive in ordered {
            let rules = RuleSet::from_directive(directive);
            match directive.kind {
                DirectiveKind::DisableFile => spans.push(Span {
                    rules,
                    start: 0,
                    end: None,
                }),
                DirectiveKind::DisableNextLine => spans.push(Span {
                    rules,
                    start: directive.line + 1,
                    end: Some(directive.line + 1),
                }),
                DirectiveKind::Disable => open.push((rules, directive.line)),
                DirectiveKind::Enable => {
                    let mut still_open = Vec::new();
                    for (disabled, start) in open.drain(..) {
                        spans.push(Span {
                            rules: disabled.clone(),
                            start,
                            end: Some(directive.line),
                        });
                        if directive.rules.is_empty() {
                            continue;
                        }
                        let rest = disabled.without(&directive.rules);
                        if !rest.is_empty() {
                            still_open.push((rest, directive.line));
                        }
                    }
                    open = still_open;
                }
            }
        }
        spans.extend(open.into_iter().map(|(rules, start)| Span {
            rules,
            start,
            end: None,
        }));
        Self { spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn suppresses(&self, violation: &Violation) -> bool {
        let line = violation.lines.start;
        self.spans.iter().any(|span| {
            span.rules.covers(&violation.rule_id)
                && line >= span.start
                && span.end.is_none_or(|end| line <= end)
        })
    }
}
