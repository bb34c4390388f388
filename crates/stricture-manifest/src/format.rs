//! Thin decoding adapters. Schema rules live in [`crate::load`].

use crate::error::ManifestSchemaError;
use crate::load::load;
use crate::model::Manifest;
use crate::raw::RawManifest;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// `.json` is JSON; everything else is read as YAML (a JSON superset).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl Manifest {
    pub fn from_yaml_str(text: &str, label: &str) -> Result<Self, ManifestSchemaError> {
        let raw: RawManifest = if text.trim().is_empty() {
            RawManifest::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ManifestSchemaError::ParseYaml {
                path: label.to_string(),
                source,
            })?
        };
        load(raw)
    }

    pub fn from_json_str(text: &str, label: &str) -> Result<Self, ManifestSchemaError> {
        let raw: RawManifest =
            serde_json::from_str(text).map_err(|source| ManifestSchemaError::ParseJson {
                path: label.to_string(),
                source,
            })?;
        load(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestSchemaError> {
        let label = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ManifestSchemaError::ReadFile {
            path: label.clone(),
            source,
        })?;
        match ManifestFormat::from_path(path) {
            ManifestFormat::Json => Self::from_json_str(&text, &label),
            ManifestFormat::Yaml => Self::from_yaml_str(&text, &label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ManifestFormat::from_path(Path::new("a/stricture.json")), ManifestFormat::Json);
        assert_eq!(ManifestFormat::from_path(Path::new("a/stricture.yml")), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_path(Path::new("manifest")), ManifestFormat::Yaml);
    }

    #[test]
    fn json_and_yaml_decode_to_the_same_model() {
        let yaml = Manifest::from_yaml_str(
            "contracts:\n  - id: shop\n    endpoints:\n      - { path: /orders, status_codes: [200, 404] }\n",
            "m.yml",
        )
        .expect("yaml loads");
        let json = Manifest::from_json_str(
            r#"{"contracts":[{"id":"shop","endpoints":[{"path":"/orders","status_codes":[200,404]}]}]}"#,
            "m.json",
        )
        .expect("json loads");
        let codes = |m: &Manifest| m.contracts[0].endpoints[0].status_codes.clone();
        assert_eq!(codes(&yaml), codes(&json));
        assert_eq!(yaml.contracts[0].endpoints[0].method, "GET");
    }

    #[test]
    fn empty_document_is_an_empty_manifest() {
        let manifest = Manifest::from_yaml_str("  \n", "empty.yml").expect("empty loads");
        assert!(manifest.contracts.is_empty());
        assert!(manifest.architecture.layers.is_empty());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Manifest::from_path(Path::new("/nonexistent/stricture.yml"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ManifestSchemaError::ReadFile { .. }));
    }
}
