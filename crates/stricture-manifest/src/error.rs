use thiserror::Error;

/// A manifest that cannot be trusted. Fatal: analysis never starts.
#[derive(Debug, Error)]
pub enum ManifestSchemaError {
    #[error("failed to read manifest: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml at {path}: {source}")]
    ParseYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid json at {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally decodable but semantically inconsistent.
    #[error("{at}: {message}")]
    Invalid { at: String, message: String },
}

impl ManifestSchemaError {
    pub fn invalid(at: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            at: at.into(),
            message: message.into(),
        }
    }
}
