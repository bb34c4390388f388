//! Violations and diagnostics.

use crate::location::{LineRange, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule failure at a concrete place in the analysed tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub file: String,
    pub lines: LineRange,
    #[serde(default)]
    pub column: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl Violation {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        location: &SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file: location.file.clone(),
            lines: location.lines(),
            column: location.column,
            message: message.into(),
            suggested_fix: None,
        }
    }

    pub fn with_lines(mut self, lines: LineRange) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Deduplication identity.
    pub fn key(&self) -> (&str, &str, LineRange) {
        (self.rule_id.as_str(), self.file.as_str(), self.lines)
    }

    /// Reporting order: file, first line, rule id.
    pub fn sort_key(&self) -> (&str, u32, &str, u32) {
        (
            self.file.as_str(),
            self.lines.start,
            self.rule_id.as_str(),
            self.lines.end,
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} [{}] {}",
            self.file, self.lines, self.severity, self.rule_id, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Parse,
    UnresolvedImport,
    RuleEvaluation,
    Io,
    /// Manifest configuration the registry cannot honour. Warning level:
    /// analysis still covers every file.
    Config,
}

impl DiagnosticKind {
    /// Whether this kind leaves part of the input unanalysed.
    pub fn degrades_coverage(self) -> bool {
        !matches!(self, Self::Config)
    }
}

/// Something that made the analysis incomplete. Never a rule finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line: 0,
            message: message.into(),
            rule_id: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn for_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::UnresolvedImport => "unresolved-import",
            DiagnosticKind::RuleEvaluation => "rule-evaluation",
            DiagnosticKind::Io => "io",
            DiagnosticKind::Config => "config",
        };
        write!(f, "{kind}")?;
        if let Some(rule_id) = &self.rule_id {
            write!(f, " [{rule_id}]")?;
        }
        if !self.file.is_empty() {
            write!(f, " {}", self.file)?;
            if self.line > 0 {
                write!(f, ":{}", self.line)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}
