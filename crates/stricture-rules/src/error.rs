//! Registry configuration errors.

/// The manifest and the registry disagree. Raised before any rule runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("manifest references unknown rule id(s): {}", ids.join(", "))]
    UnknownRules { ids: Vec<String> },

    #[error("rule {id} is registered twice")]
    DuplicateRule { id: String },
}
