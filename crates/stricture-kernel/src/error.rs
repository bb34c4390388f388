//! Errors shared across the workspace.

use crate::violation::{Diagnostic, DiagnosticKind};

/// A front end could not lower a file into IR.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not valid for this front end.
    #[error("malformed {path}: {message}")]
    Malformed { path: String, message: String },

    /// IR names a path different from the file it was read from.
    #[error("IR in {path} declares module path '{declared}'")]
    PathMismatch { path: String, declared: String },
}

impl ParseError {
    pub fn path(&self) -> &str {
        match self {
            ParseError::Io { path, .. }
            | ParseError::Malformed { path, .. }
            | ParseError::PathMismatch { path, .. } => path,
        }
    }

    /// Per-file failures degrade to a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let kind = match self {
            ParseError::Io { .. } => DiagnosticKind::Io,
            _ => DiagnosticKind::Parse,
        };
        Diagnostic::new(kind, self.path(), self.to_string())
    }
}

/// A single rule failed while evaluating.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rule {rule_id} failed: {message}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub message: String,
}

impl RuleEvaluationError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::RuleEvaluation, "", self.message.clone())
            .for_rule(self.rule_id.clone())
    }
}
