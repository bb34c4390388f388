//! Violation reporter: deduplication, ordering and the run summary.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use stricture_kernel::{Diagnostic, LineRange, Severity, Violation};

/// Collects violations from any number of producers and hands them back in
/// one deterministic order.
#[derive(Debug, Default)]
pub struct Reporter {
    seen: HashSet<(String, String, LineRange)>,
    violations: Vec<Violation>,
    duplicates: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first violation per (rule id, file, line range).
    pub fn push(&mut self, violation: Violation) {
        let (rule, file, lines) = violation.key();
        if self.seen.insert((rule.to_string(), file.to_string(), lines)) {
            self.violations.push(violation);
        } else {
            self.duplicates += 1;
        }
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        for violation in violations {
            self.push(violation);
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Sorted by (file, line, rule id); stable, so equal keys keep arrival order.
    pub fn finish(self) -> Vec<Violation> {
        let mut violations = self.violations;
        violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        violations
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files_analyzed: usize,
    pub files_with_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub suppressed: usize,
    /// No diagnostic degraded coverage: zero violations means conformance.
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub violations: Vec<Violation>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: Summary,
}

impl AnalysisReport {
    pub fn new(
        violations: Vec<Violation>,
        mut diagnostics: Vec<Diagnostic>,
        files_analyzed: usize,
        suppressed: usize,
    ) -> Self {
        diagnostics.sort();
        diagnostics.dedup();
        let count = |severity| violations.iter().filter(|v| v.severity == severity).count();
        let files: BTreeSet<&str> = violations.iter().map(|v| v.file.as_str()).collect();
        let summary = Summary {
            files_analyzed,
            files_with_issues: files.len(),
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            suppressed,
            complete: !diagnostics.iter().any(|d| d.kind.degrades_coverage()),
        };
        Self {
            violations,
            diagnostics,
            summary,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stricture_kernel::{DiagnosticKind, SourceLocation};

    fn violation(file: &str, line: u32, rule: &str) -> Violation {
        Violation::new(rule, Severity::Error, &SourceLocation::new(file, line, 1), rule)
    }

    #[test]
    fn duplicates_collapse_but_distinct_rules_stay() {
        let mut reporter = Reporter::new();
        reporter.extend([
            violation("src/routes/a.ts", 3, "ARCH-layer-violation"),
            violation("src/routes/a.ts", 3, "ARCH-dependency-direction"),
            violation("src/routes/a.ts", 3, "ARCH-layer-violation"),
        ]);
        assert_eq!(reporter.duplicates(), 1);
        let rules: Vec<String> = reporter.finish().into_iter().map(|v| v.rule_id).collect();
        assert_eq!(rules, ["ARCH-dependency-direction", "ARCH-layer-violation"]);
    }

    #[test]
    fn order_is_file_then_line_then_rule() {
        let mut reporter = Reporter::new();
        reporter.extend([
            violation("src/b.ts", 1, "CTR-null-safety"),
            violation("src/a.ts", 20, "CTR-error-handling"),
            violation("src/a.ts", 4, "CTR-status-code-handling"),
            violation("src/a.ts", 4, "CTR-error-handling"),
        ]);
        let rendered: Vec<String> = reporter
            .finish()
            .iter()
            .map(|v| format!("{}:{} {}", v.file, v.lines, v.rule_id))
            .collect();
        insta::assert_snapshot!(rendered.join("\n"), @r"
        src/a.ts:4 CTR-error-handling
        src/a.ts:4 CTR-status-code-handling
        src/a.ts:20 CTR-error-handling
        src/b.ts:1 CTR-null-safety
        ");
    }

    #[test]
    fn summary_counts_and_completeness() {
        let mut warning = violation("src/a.ts", 1, "TQ-no-shallow-assertions");
        warning.severity = Severity::Warning;
        let report = AnalysisReport::new(
            vec![violation("src/a.ts", 2, "CTR-null-safety"), warning],
            vec![Diagnostic::new(DiagnosticKind::Parse, "src/c.ts.ir.json", "bad")],
            3,
            1,
        );
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.files_with_issues, 1);
        assert!(!report.summary.complete);
        assert!(report.has_errors());
    }

    #[test]
    fn config_warnings_keep_the_run_complete() {
        let report = AnalysisReport::new(
            Vec::new(),
            vec![Diagnostic::new(DiagnosticKind::Config, "", "unknown rule").for_rule("CTR-x")],
            2,
            0,
        );
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.summary.complete);
    }
}
