//! Document shape as written on disk, before validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawManifest {
    pub manifest_version: Option<String>,
    pub strictness: RawStrictness,
    pub contracts: Vec<RawContract>,
    /// Rule id → options; decoded per rule so errors name the rule.
    pub rules: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStrictness {
    pub mode: Option<String>,
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawContract {
    pub id: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub types: BTreeMap<String, RawShape>,
    #[serde(default)]
    pub endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEndpoint {
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status_codes: Vec<u16>,
    #[serde(default)]
    pub pagination: Option<RawPagination>,
    #[serde(default)]
    pub request: Option<RawShape>,
    #[serde(default)]
    pub response: Option<RawShape>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPagination {
    #[serde(default)]
    pub style: Option<String>,
    pub has_more_field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawShape {
    pub name: Option<String>,
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
    #[serde(default)]
    pub range: Option<RawRange>,
    #[serde(default)]
    pub format: Option<String>,
    /// Regex for `format: pattern`.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDependencyDirection {
    pub layers: Vec<RawLayer>,
    pub allowed: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLayer {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLayerViolation {
    pub forbidden: Vec<RawBypass>,
    pub forbidden_imports: Vec<RawForbiddenImports>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBypass {
    pub from: String,
    #[serde(default)]
    pub bypass: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawForbiddenImports {
    pub layer: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawModuleBoundary {
    pub modules: Vec<RawBoundary>,
    pub reexport_attribution: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBoundary {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
    pub entry: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMaxFileLines {
    pub max: Option<i64>,
    pub include: Vec<String>,
    pub overrides: Vec<RawLineOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLineOverride {
    pub glob: String,
    pub max: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawShallowAssertions {
    pub min_field_fraction: Option<f64>,
}
