//! Errors that abort an analysis run.

use stricture_manifest::ManifestSchemaError;
use stricture_rules::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Manifest(#[from] ManifestSchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A source root does not exist or cannot be listed.
    #[error("cannot read source root {path}: {source}")]
    Root {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
