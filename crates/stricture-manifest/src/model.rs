//! Validated manifest model. Built only by [`crate::load`].

use globset::GlobSet;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;
use stricture_kernel::Severity;

pub const DEFAULT_MIN_FIELD_FRACTION: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Manifest {
    pub version: String,
    pub strictness: Strictness,
    pub contracts: Vec<Contract>,
    pub architecture: ArchitectureConfig,
    pub assertions: AssertionOptions,
    /// `rules.<id>.severity` entries.
    pub rule_severities: BTreeMap<String, SeveritySetting>,
    /// Rule ids named by `strictness.overrides`; each must be registered.
    pub referenced_rules: BTreeSet<String>,
    /// Keys of the `rules:` section. Unknown ones only warn.
    pub configured_rules: BTreeSet<String>,
}

impl Manifest {
    /// Effective setting requested for `rule_id`, if the manifest names one.
    pub fn severity_override(&self, rule_id: &str) -> Option<SeveritySetting> {
        self.strictness
            .overrides
            .get(rule_id)
            .or_else(|| self.rule_severities.get(rule_id))
            .copied()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&Contract, &Endpoint)> {
        self.contracts
            .iter()
            .flat_map(|contract| contract.endpoints.iter().map(move |ep| (contract, ep)))
    }

    /// Endpoint whose path template matches a concrete call target.
    pub fn endpoint_for(&self, target: &str, method: Option<&str>) -> Option<(&Contract, &Endpoint)> {
        let mut matches = self
            .endpoints()
            .filter(|(_, ep)| ep.matches_path(target))
            .filter(|(_, ep)| {
                method.is_none_or(|m| ep.method.eq_ignore_ascii_case(m))
            });
        let first = matches.next()?;
        Some(first)
    }

    /// Resolve a field by owning type name, or by bare name when exactly one
    /// shape in the manifest declares it.
    pub fn resolve_field(&self, owner_type: Option<&str>, field: &str) -> Option<&Field> {
        if let Some(owner) = owner_type {
            return self
                .shape(owner)
                .and_then(|shape| shape.field(field));
        }
        let mut found: Option<&Field> = None;
        for shape in self.shapes() {
            if let Some(candidate) = shape.field(field) {
                match found {
                    None => found = Some(candidate),
                    Some(existing) if existing == candidate => {}
                    Some(_) => return None,
                }
            }
        }
        found
    }

    /// Named shape: a contract `types` entry or a named request/response.
    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.shapes().find(|shape| shape.name.as_deref() == Some(name))
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.contracts.iter().flat_map(|contract| {
            contract.types.values().chain(
                contract
                    .endpoints
                    .iter()
                    .flat_map(|ep| ep.request.iter().chain(ep.response.iter())),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictnessMode {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeveritySetting {
    Error,
    Warning,
    Off,
}

impl SeveritySetting {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Error => Some(Severity::Error),
            Self::Warning => Some(Severity::Warning),
            Self::Off => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Strictness {
    pub mode: StrictnessMode,
    pub overrides: BTreeMap<String, SeveritySetting>,
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub id: String,
    pub protocol: String,
    pub auth: Option<String>,
    pub types: BTreeMap<String, Shape>,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: String,
    pub status_codes: BTreeSet<u16>,
    pub pagination: Option<Pagination>,
    pub request: Option<Shape>,
    pub response: Option<Shape>,
}

impl Endpoint {
    /// `/orders/{id}` matches `/orders/42` and `/orders/${id}`; query strings
    /// and a base URL prefix on the target are ignored.
    pub fn matches_path(&self, target: &str) -> bool {
        let target = target.split(['?', '#']).next().unwrap_or_default();
        let template: Vec<&str> = self.path.trim_matches('/').split('/').collect();
        let actual: Vec<&str> = target.trim_end_matches('/').split('/').collect();
        if actual.len() < template.len() {
            return false;
        }
        let actual = &actual[actual.len() - template.len()..];
        template
            .iter()
            .zip(actual)
            .all(|(want, got)| is_placeholder(want) || want == got)
    }
}

fn is_placeholder(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with("${") && segment.ends_with('}'))
        || segment.starts_with(':')
        || (segment.starts_with('<') && segment.ends_with('>'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub style: String,
    pub has_more_field: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub name: Option<String>,
    pub fields: Vec<Field>,
}

impl Shape {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.required)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Enum,
    Unknown,
}

impl Primitive {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "string" => Self::String,
            "integer" | "int" => Self::Integer,
            "number" | "float" | "decimal" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "enum" => Self::Enum,
            "unknown" | "any" => Self::Unknown,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// One of the owning contract's `types`.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]"),
            (Some(min), None) => write!(f, ">= {min}"),
            (None, Some(max)) => write!(f, "<= {max}"),
            (None, None) => f.write_str("any"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StringFormat {
    Email,
    Uuid,
    Uri,
    Date,
    DateTime,
    Pattern(Regex),
}

impl StringFormat {
    pub fn name(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Uri => "uri",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Pattern(_) => "pattern",
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Email => email_re().is_match(value),
            Self::Uuid => uuid_re().is_match(value),
            Self::Uri => uri_re().is_match(value),
            Self::Date => date_re().is_match(value),
            Self::DateTime => date_time_re().is_match(value),
            Self::Pattern(re) => re.is_match(value),
        }
    }
}

impl PartialEq for StringFormat {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => self.name() == other.name(),
        }
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex must compile")
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("uuid regex must compile")
    })
}

fn uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$").expect("uri regex must compile")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex must compile"))
}

fn date_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:?\d{2})?$")
            .expect("date-time regex must compile")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub required: bool,
    /// Non-empty exactly when `field_type` is `enum`.
    pub enum_values: Vec<String>,
    pub range: Option<NumericRange>,
    pub format: Option<StringFormat>,
}

impl Field {
    pub fn is_enum(&self) -> bool {
        !self.enum_values.is_empty()
    }
}

/// Compiled glob list that remembers its source patterns.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pub patterns: Vec<String>,
    set: GlobSet,
}

impl PathMatcher {
    pub(crate) fn new(patterns: Vec<String>, set: GlobSet) -> Self {
        Self { patterns, set }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    /// Position in the top-down order; 0 is the top.
    pub rank: usize,
    pub paths: PathMatcher,
}

#[derive(Debug, Clone)]
pub struct Bypass {
    pub from: String,
    pub bypass: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct ForbiddenImports {
    pub layer: String,
    pub patterns: PathMatcher,
}

#[derive(Debug, Clone)]
pub struct ModuleBoundary {
    pub name: String,
    pub paths: PathMatcher,
    pub entry: String,
}

impl ModuleBoundary {
    pub fn contains(&self, path: &str) -> bool {
        self.paths.is_match(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReexportAttribution {
    /// One finding at the re-export that first lets the boundary leak.
    #[default]
    LeakSite,
    /// One finding per re-export hop outside the boundary.
    EveryHop,
}

#[derive(Debug, Clone)]
pub struct LineOverride {
    pub glob: PathMatcher,
    pub max: u32,
}

#[derive(Debug, Clone)]
pub struct LineLimits {
    pub max: u32,
    /// Empty means every file.
    pub include: PathMatcher,
    pub overrides: Vec<LineOverride>,
}

impl LineLimits {
    /// First matching override wins; `None` when the file is not covered.
    pub fn limit_for(&self, path: &str) -> Option<u32> {
        if let Some(found) = self.overrides.iter().find(|o| o.glob.is_match(path)) {
            return Some(found.max);
        }
        if self.include.is_empty() || self.include.is_match(path) {
            Some(self.max)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchitectureConfig {
    /// Sorted top-down.
    pub layers: Vec<Layer>,
    pub allowed: BTreeMap<String, BTreeSet<String>>,
    pub forbidden: Vec<Bypass>,
    pub forbidden_imports: Vec<ForbiddenImports>,
    pub boundaries: Vec<ModuleBoundary>,
    pub reexport_attribution: ReexportAttribution,
    pub line_limits: Option<LineLimits>,
}

impl ArchitectureConfig {
    /// First layer whose globs match `path`.
    pub fn layer_of(&self, path: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.paths.is_match(path))
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn boundary_of(&self, path: &str) -> Option<&ModuleBoundary> {
        self.boundaries.iter().find(|boundary| boundary.contains(path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssertionOptions {
    pub min_field_fraction: f64,
}

impl Default for AssertionOptions {
    fn default() -> Self {
        Self {
            min_field_fraction: DEFAULT_MIN_FIELD_FRACTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(path: &str) -> Endpoint {
        Endpoint {
            path: path.into(),
            method: "GET".into(),
            status_codes: BTreeSet::new(),
            pagination: None,
            request: None,
            response: None,
        }
    }

    #[test]
    fn path_templates_match_concrete_targets() {
        let ep = endpoint("/orders/{id}");
        assert!(ep.matches_path("/orders/42"));
        assert!(ep.matches_path("https://api.example.com/orders/${orderId}"));
        assert!(ep.matches_path("/orders/42?expand=items"));
        assert!(!ep.matches_path("/orders"));
        assert!(!ep.matches_path("/customers/42"));
        assert!(!endpoint("/orders").matches_path("/orders/{id}"));
    }

    #[test]
    fn builtin_formats_match() {
        assert!(StringFormat::Email.matches("a@b.io"));
        assert!(!StringFormat::Email.matches("not-an-email"));
        assert!(StringFormat::Uuid.matches("3f2504e0-4f89-11d3-9a0c-0305e82c3301"));
        assert!(StringFormat::DateTime.matches("2024-01-02T03:04:05Z"));
        assert!(!StringFormat::Date.matches("02/01/2024"));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = NumericRange {
            min: Some(0.0),
            max: Some(100.0),
        };
        assert!(range.contains(0.0));
        assert!(range.contains(100.0));
        assert!(!range.contains(-0.5));
        assert_eq!(range.to_string(), "[0, 100]");
    }
}
