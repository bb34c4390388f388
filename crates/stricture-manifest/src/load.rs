//! Schema validation: raw document → [`Manifest`].
//!
//! Every check here runs before analysis. A manifest that would make a rule
//! silently report nothing (an empty enum, an inverted range, an entry point
//! outside its own boundary) is rejected with a path-qualified message.

use crate::error::ManifestSchemaError;
use crate::model::{
    ArchitectureConfig, AssertionOptions, Bypass, Contract, Endpoint, Field, FieldType,
    ForbiddenImports, Layer, LineLimits, LineOverride, Manifest, ModuleBoundary, NumericRange,
    Pagination, PathMatcher, Primitive, ReexportAttribution, SeveritySetting, Shape, Strictness,
    StrictnessMode, StringFormat,
};
use crate::raw::{
    RawContract, RawDependencyDirection, RawEndpoint, RawField, RawLayerViolation, RawManifest,
    RawMaxFileLines, RawModuleBoundary, RawShallowAssertions, RawShape,
};
use globset::{Glob, GlobSetBuilder};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const RULE_DEPENDENCY_DIRECTION: &str = "ARCH-dependency-direction";
pub const RULE_LAYER_VIOLATION: &str = "ARCH-layer-violation";
pub const RULE_MODULE_BOUNDARY: &str = "ARCH-module-boundary";
pub const RULE_MAX_FILE_LINES: &str = "ARCH-max-file-lines";
pub const RULE_SHALLOW_ASSERTIONS: &str = "TQ-no-shallow-assertions";

type Result<T> = std::result::Result<T, ManifestSchemaError>;

/// Validate a decoded document.
pub fn load(raw: RawManifest) -> Result<Manifest> {
    let strictness = load_strictness(&raw)?;
    let contracts = raw
        .contracts
        .iter()
        .enumerate()
        .map(|(idx, contract)| load_contract(contract, &format!("contracts[{idx}]")))
        .collect::<Result<Vec<_>>>()?;
    let mut seen_ids = BTreeSet::new();
    for (idx, contract) in contracts.iter().enumerate() {
        if !seen_ids.insert(contract.id.as_str()) {
            return Err(ManifestSchemaError::invalid(
                format!("contracts[{idx}].id"),
                format!("duplicate contract id '{}'", contract.id),
            ));
        }
    }

    let mut rule_severities = BTreeMap::new();
    let mut rules = BTreeMap::new();
    for (rule_id, entry) in &raw.rules {
        let (severity, options) = split_rule_entry(rule_id, entry)?;
        if let Some(severity) = severity {
            rule_severities.insert(rule_id.clone(), severity);
        }
        rules.insert(rule_id.clone(), options);
    }

    let architecture = load_architecture(&rules)?;
    let assertions = match rule_options::<RawShallowAssertions>(&rules, RULE_SHALLOW_ASSERTIONS)? {
        Some(options) => {
            let fraction = options
                .min_field_fraction
                .unwrap_or(AssertionOptions::default().min_field_fraction);
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ManifestSchemaError::invalid(
                    format!("rules.{RULE_SHALLOW_ASSERTIONS}.min_field_fraction"),
                    format!("must be in (0, 1], got {fraction}"),
                ));
            }
            AssertionOptions {
                min_field_fraction: fraction,
            }
        }
        None => AssertionOptions::default(),
    };

    let referenced_rules = strictness.overrides.keys().cloned().collect();
    let configured_rules = raw.rules.keys().cloned().collect();

    Ok(Manifest {
        version: raw
            .manifest_version
            .clone()
            .unwrap_or_else(|| "1".to_string()),
        strictness,
        contracts,
        architecture,
        assertions,
        rule_severities,
        referenced_rules,
        configured_rules,
    })
}

fn parse_severity(raw: &str, at: &str) -> Result<SeveritySetting> {
    SeveritySetting::parse(raw).ok_or_else(|| {
        ManifestSchemaError::invalid(
            at,
            format!("unknown severity '{raw}' (expected error, warning or off)"),
        )
    })
}

fn load_strictness(raw: &RawManifest) -> Result<Strictness> {
    let mode = match raw.strictness.mode.as_deref().map(str::trim) {
        None | Some("strict") => StrictnessMode::Strict,
        Some("lenient") => StrictnessMode::Lenient,
        Some(other) => {
            return Err(ManifestSchemaError::invalid(
                "strictness.mode",
                format!("unknown mode '{other}' (expected strict or lenient)"),
            ));
        }
    };
    let mut overrides = BTreeMap::new();
    for (rule_id, severity) in &raw.strictness.overrides {
        let at = format!("strictness.overrides.{rule_id}");
        overrides.insert(rule_id.clone(), parse_severity(severity, &at)?);
    }
    Ok(Strictness { mode, overrides })
}

fn load_contract(raw: &RawContract, at: &str) -> Result<Contract> {
    let id = raw.id.trim();
    if id.is_empty() {
        return Err(ManifestSchemaError::invalid(
            format!("{at}.id"),
            "contract id must be a non-empty string",
        ));
    }
    let type_names: BTreeSet<&str> = raw.types.keys().map(String::as_str).collect();

    let mut types = BTreeMap::new();
    for (name, shape) in &raw.types {
        let mut shape = load_shape(shape, &format!("{at}.types.{name}"), &type_names)?;
        shape.name.get_or_insert_with(|| name.clone());
        types.insert(name.clone(), shape);
    }

    let endpoints = raw
        .endpoints
        .iter()
        .enumerate()
        .map(|(idx, ep)| load_endpoint(ep, &format!("{at}.endpoints[{idx}]"), &type_names))
        .collect::<Result<Vec<_>>>()?;

    Ok(Contract {
        id: id.to_string(),
        protocol: raw.protocol.clone().unwrap_or_else(|| "http".to_string()),
        auth: raw.auth.clone(),
        types,
        endpoints,
    })
}

fn load_endpoint(raw: &RawEndpoint, at: &str, type_names: &BTreeSet<&str>) -> Result<Endpoint> {
    if raw.path.trim().is_empty() {
        return Err(ManifestSchemaError::invalid(
            format!("{at}.path"),
            "endpoint path must be a non-empty string",
        ));
    }
    for code in &raw.status_codes {
        if !(100..=599).contains(code) {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.status_codes"),
                format!("{code} is not an HTTP status code"),
            ));
        }
    }
    let request = raw
        .request
        .as_ref()
        .map(|shape| load_shape(shape, &format!("{at}.request"), type_names))
        .transpose()?;
    let response = raw
        .response
        .as_ref()
        .map(|shape| load_shape(shape, &format!("{at}.response"), type_names))
        .transpose()?;
    let pagination = match &raw.pagination {
        Some(p) => {
            let field = p.has_more_field.trim();
            if field.is_empty() {
                return Err(ManifestSchemaError::invalid(
                    format!("{at}.pagination.has_more_field"),
                    "must be a non-empty field name",
                ));
            }
            Some(Pagination {
                style: p.style.clone().unwrap_or_else(|| "cursor".to_string()),
                has_more_field: field.to_string(),
            })
        }
        None => None,
    };

    Ok(Endpoint {
        path: raw.path.trim().to_string(),
        method: raw
            .method
            .as_deref()
            .unwrap_or("GET")
            .trim()
            .to_ascii_uppercase(),
        status_codes: raw.status_codes.iter().copied().collect(),
        pagination,
        request,
        response,
    })
}

fn load_shape(raw: &RawShape, at: &str, type_names: &BTreeSet<&str>) -> Result<Shape> {
    let mut seen = BTreeSet::new();
    let mut fields = Vec::with_capacity(raw.fields.len());
    for (idx, field) in raw.fields.iter().enumerate() {
        let field_at = format!("{at}.fields[{idx}]");
        let field = load_field(field, &field_at, type_names)?;
        if !seen.insert(field.name.clone()) {
            return Err(ManifestSchemaError::invalid(
                field_at,
                format!("duplicate field '{}'", field.name),
            ));
        }
        fields.push(field);
    }
    Ok(Shape {
        name: raw.name.clone(),
        fields,
    })
}

fn load_field(raw: &RawField, at: &str, type_names: &BTreeSet<&str>) -> Result<Field> {
    let name = raw.name.trim();
    if name.is_empty() {
        return Err(ManifestSchemaError::invalid(
            format!("{at}.name"),
            "field name must be a non-empty string",
        ));
    }
    let at = format!("{at}({name})");

    let declared = raw.field_type.as_deref().map(str::trim).unwrap_or("unknown");
    let field_type = match Primitive::parse(declared) {
        Some(primitive) => FieldType::Primitive(primitive),
        None if type_names.contains(declared) => FieldType::Named(declared.to_string()),
        None => {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.type"),
                format!("type '{declared}' does not resolve to a primitive or a declared type"),
            ));
        }
    };
    let is_enum = field_type == FieldType::Primitive(Primitive::Enum);

    let enum_values = match &raw.values {
        Some(values) => {
            if !is_enum {
                return Err(ManifestSchemaError::invalid(
                    format!("{at}.values"),
                    format!("enum values declared on non-enum type '{declared}'"),
                ));
            }
            let mut seen = BTreeSet::new();
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(ManifestSchemaError::invalid(
                            format!("{at}.values"),
                            format!("enum value {other} must be a scalar"),
                        ));
                    }
                };
                if !seen.insert(text.clone()) {
                    return Err(ManifestSchemaError::invalid(
                        format!("{at}.values"),
                        format!("duplicate enum value '{text}'"),
                    ));
                }
                out.push(text);
            }
            out
        }
        None => Vec::new(),
    };
    if is_enum && enum_values.is_empty() {
        return Err(ManifestSchemaError::invalid(
            format!("{at}.values"),
            "enum field must declare a non-empty value set",
        ));
    }

    let range = match &raw.range {
        Some(range) => {
            if let (Some(min), Some(max)) = (range.min, range.max)
                && min > max
            {
                return Err(ManifestSchemaError::invalid(
                    format!("{at}.range"),
                    format!("min {min} is greater than max {max}"),
                ));
            }
            Some(NumericRange {
                min: range.min,
                max: range.max,
            })
        }
        None => None,
    };

    let format = match raw.format.as_deref().map(str::trim) {
        None => None,
        Some("email") => Some(StringFormat::Email),
        Some("uuid") => Some(StringFormat::Uuid),
        Some("uri") | Some("url") => Some(StringFormat::Uri),
        Some("date") => Some(StringFormat::Date),
        Some("date-time") | Some("datetime") => Some(StringFormat::DateTime),
        Some("pattern") => {
            let pattern = raw.pattern.as_deref().ok_or_else(|| {
                ManifestSchemaError::invalid(
                    format!("{at}.pattern"),
                    "format 'pattern' requires a pattern",
                )
            })?;
            let regex = Regex::new(pattern).map_err(|source| {
                ManifestSchemaError::invalid(
                    format!("{at}.pattern"),
                    format!("invalid regex pattern {pattern:?}: {source}"),
                )
            })?;
            Some(StringFormat::Pattern(regex))
        }
        Some(other) => {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.format"),
                format!("unknown format '{other}'"),
            ));
        }
    };

    Ok(Field {
        name: name.to_string(),
        field_type,
        nullable: raw.nullable,
        required: raw.required.unwrap_or(true),
        enum_values,
        range,
        format,
    })
}

/// A `rules.<id>` entry is one of:
///
/// - `warn`: a bare severity
/// - `{ severity: warn, max: 10 }`: options, optionally carrying a severity
/// - `[warn, { max: 10 }]`: severity followed by options
fn split_rule_entry(rule_id: &str, entry: &Value) -> Result<(Option<SeveritySetting>, Value)> {
    let at = format!("rules.{rule_id}");
    match entry {
        Value::Null => Ok((None, Value::Null)),
        Value::String(_) => Ok((Some(severity_value(entry, &at)?), Value::Null)),
        Value::Object(options) => {
            let severity = options
                .get("severity")
                .map(|value| severity_value(value, &format!("{at}.severity")))
                .transpose()?;
            Ok((severity, entry.clone()))
        }
        Value::Array(items) => match items.as_slice() {
            [severity] => Ok((Some(severity_value(severity, &format!("{at}[0]"))?), Value::Null)),
            [severity, options @ (Value::Object(_) | Value::Null)] => Ok((
                Some(severity_value(severity, &format!("{at}[0]"))?),
                options.clone(),
            )),
            _ => Err(ManifestSchemaError::invalid(
                &at,
                "expected [severity] or [severity, {options}]",
            )),
        },
        _ => Err(ManifestSchemaError::invalid(
            &at,
            "expected a severity, an options map or [severity, {options}]",
        )),
    }
}

fn severity_value(value: &Value, at: &str) -> Result<SeveritySetting> {
    let text = value
        .as_str()
        .ok_or_else(|| ManifestSchemaError::invalid(at, "severity must be a string"))?;
    parse_severity(text, at)
}

fn rule_options<T: DeserializeOwned>(
    rules: &BTreeMap<String, Value>,
    rule_id: &str,
) -> Result<Option<T>> {
    let Some(value) = rules.get(rule_id) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|source| ManifestSchemaError::invalid(format!("rules.{rule_id}"), source.to_string()))
}

pub(crate) fn compile_globs(patterns: &[String], at: &str) -> Result<PathMatcher> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| {
            ManifestSchemaError::invalid(at, format!("invalid glob {pattern:?}: {source}"))
        })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|source| ManifestSchemaError::invalid(at, source.to_string()))?;
    Ok(PathMatcher::new(patterns.to_vec(), set))
}

fn load_architecture(rules: &BTreeMap<String, Value>) -> Result<ArchitectureConfig> {
    let mut config = ArchitectureConfig::default();

    if let Some(direction) = rule_options::<RawDependencyDirection>(rules, RULE_DEPENDENCY_DIRECTION)? {
        let at = format!("rules.{RULE_DEPENDENCY_DIRECTION}");
        config.layers = load_layers(&direction, &at)?;
        for (from, targets) in &direction.allowed {
            require_layer(&config, from, &format!("{at}.allowed"))?;
            let mut set = BTreeSet::new();
            for target in targets {
                require_layer(&config, target, &format!("{at}.allowed.{from}"))?;
                set.insert(target.clone());
            }
            config.allowed.insert(from.clone(), set);
        }
    }

    if let Some(layering) = rule_options::<RawLayerViolation>(rules, RULE_LAYER_VIOLATION)? {
        let at = format!("rules.{RULE_LAYER_VIOLATION}");
        for (idx, entry) in layering.forbidden.iter().enumerate() {
            let entry_at = format!("{at}.forbidden[{idx}]");
            require_layer(&config, &entry.from, &entry_at)?;
            for skipped in &entry.bypass {
                require_layer(&config, skipped, &entry_at)?;
            }
            config.forbidden.push(Bypass {
                from: entry.from.clone(),
                bypass: entry.bypass.iter().cloned().collect(),
            });
        }
        for (idx, entry) in layering.forbidden_imports.iter().enumerate() {
            let entry_at = format!("{at}.forbidden_imports[{idx}]");
            require_layer(&config, &entry.layer, &entry_at)?;
            config.forbidden_imports.push(ForbiddenImports {
                layer: entry.layer.clone(),
                patterns: compile_globs(&entry.patterns, &entry_at)?,
            });
        }
    }

    if let Some(boundaries) = rule_options::<RawModuleBoundary>(rules, RULE_MODULE_BOUNDARY)? {
        let at = format!("rules.{RULE_MODULE_BOUNDARY}");
        let mut names = BTreeSet::new();
        for (idx, module) in boundaries.modules.iter().enumerate() {
            let module_at = format!("{at}.modules[{idx}]({})", module.name);
            if !names.insert(module.name.clone()) {
                return Err(ManifestSchemaError::invalid(
                    module_at,
                    "duplicate module boundary name",
                ));
            }
            if module.paths.is_empty() {
                return Err(ManifestSchemaError::invalid(
                    format!("{module_at}.paths"),
                    "module boundary must declare at least one glob",
                ));
            }
            let paths = compile_globs(&module.paths, &format!("{module_at}.paths"))?;
            let entry = module.entry.trim().trim_start_matches("./").to_string();
            if !paths.is_match(&entry) {
                return Err(ManifestSchemaError::invalid(
                    format!("{module_at}.entry"),
                    format!("entry point '{entry}' is not inside the boundary's own globs"),
                ));
            }
            config.boundaries.push(ModuleBoundary {
                name: module.name.clone(),
                paths,
                entry,
            });
        }
        config.reexport_attribution = match boundaries.reexport_attribution.as_deref() {
            None | Some("leak-site") => ReexportAttribution::LeakSite,
            Some("every-hop") => ReexportAttribution::EveryHop,
            Some(other) => {
                return Err(ManifestSchemaError::invalid(
                    format!("{at}.reexport_attribution"),
                    format!("unknown policy '{other}' (expected leak-site or every-hop)"),
                ));
            }
        };
    }

    if let Some(limits) = rule_options::<RawMaxFileLines>(rules, RULE_MAX_FILE_LINES)? {
        let at = format!("rules.{RULE_MAX_FILE_LINES}");
        let max = positive_max(limits.max, &format!("{at}.max"))?;
        let include = compile_globs(&limits.include, &format!("{at}.include"))?;
        let mut overrides = Vec::with_capacity(limits.overrides.len());
        for (idx, entry) in limits.overrides.iter().enumerate() {
            let entry_at = format!("{at}.overrides[{idx}]");
            overrides.push(LineOverride {
                glob: compile_globs(std::slice::from_ref(&entry.glob), &entry_at)?,
                max: positive_max(Some(entry.max), &format!("{entry_at}.max"))?,
            });
        }
        config.line_limits = Some(LineLimits {
            max,
            include,
            overrides,
        });
    }

    Ok(config)
}

fn positive_max(raw: Option<i64>, at: &str) -> Result<u32> {
    let Some(value) = raw else {
        return Err(ManifestSchemaError::invalid(at, "line maximum is required"));
    };
    if value <= 0 {
        return Err(ManifestSchemaError::invalid(
            at,
            format!("line maximum must be positive, got {value}"),
        ));
    }
    u32::try_from(value)
        .map_err(|_| ManifestSchemaError::invalid(at, format!("line maximum {value} is too large")))
}

fn load_layers(raw: &RawDependencyDirection, at: &str) -> Result<Vec<Layer>> {
    let mut names = BTreeSet::new();
    for (idx, layer) in raw.layers.iter().enumerate() {
        if layer.name.trim().is_empty() {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.layers[{idx}].name"),
                "layer name must be a non-empty string",
            ));
        }
        if !names.insert(layer.name.as_str()) {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.layers[{idx}]"),
                format!("duplicate layer '{}'", layer.name),
            ));
        }
    }

    let with_priority = raw.layers.iter().filter(|l| l.priority.is_some()).count();
    let mut order: Vec<usize> = (0..raw.layers.len()).collect();
    if with_priority > 0 {
        if with_priority != raw.layers.len() {
            return Err(ManifestSchemaError::invalid(
                format!("{at}.layers"),
                "layers are not a total order: either every layer has a priority or none does",
            ));
        }
        let mut seen = BTreeMap::new();
        for layer in &raw.layers {
            let priority = layer.priority.unwrap_or_default();
            if let Some(previous) = seen.insert(priority, layer.name.as_str()) {
                return Err(ManifestSchemaError::invalid(
                    format!("{at}.layers"),
                    format!(
                        "layers are not a total order: '{previous}' and '{}' share priority {priority}",
                        layer.name
                    ),
                ));
            }
        }
        order.sort_by_key(|&idx| raw.layers[idx].priority.unwrap_or_default());
    }

    order
        .into_iter()
        .enumerate()
        .map(|(rank, idx)| {
            let layer = &raw.layers[idx];
            Ok(Layer {
                name: layer.name.clone(),
                rank,
                paths: compile_globs(&layer.paths, &format!("{at}.layers[{idx}].paths"))?,
            })
        })
        .collect()
}

fn require_layer(config: &ArchitectureConfig, name: &str, at: &str) -> Result<()> {
    if config.layer(name).is_none() {
        return Err(ManifestSchemaError::invalid(
            at,
            format!("unknown layer '{name}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manifest;

    fn load_yaml(yaml: &str) -> Result<Manifest> {
        Manifest::from_yaml_str(yaml, "inline.yml")
    }

    fn invalid_at(err: ManifestSchemaError) -> (String, String) {
        match err {
            ManifestSchemaError::Invalid { at, message } => (at, message),
            other => panic!("expected schema error, got {other}"),
        }
    }

    #[test]
    fn rejects_inverted_range() {
        let err = load_yaml(
            r#"
contracts:
  - id: shop
    endpoints:
      - path: /orders
        response:
          fields:
            - { name: total, type: number, range: { min: 10, max: 1 } }
"#,
        )
        .expect_err("inverted range must fail");
        let (at, message) = invalid_at(err);
        assert_eq!(at, "contracts[0].endpoints[0].response.fields[0](total).range");
        assert!(message.contains("greater than"));
    }

    #[test]
    fn rejects_empty_enum_and_enum_values_on_string() {
        let err = load_yaml(
            r#"
contracts:
  - id: shop
    endpoints:
      - path: /orders
        response:
          fields:
            - { name: status, type: enum, values: [] }
"#,
        )
        .expect_err("empty enum must fail");
        assert!(invalid_at(err).1.contains("non-empty value set"));

        let err = load_yaml(
            r#"
contracts:
  - id: shop
    endpoints:
      - path: /orders
        response:
          fields:
            - { name: status, type: string, values: [a] }
"#,
        )
        .expect_err("values on string must fail");
        assert!(invalid_at(err).1.contains("non-enum"));
    }

    #[test]
    fn rejects_unresolvable_field_type() {
        let err = load_yaml(
            r#"
contracts:
  - id: shop
    types:
      Address: { fields: [ { name: city, type: string } ] }
    endpoints:
      - path: /orders
        response:
          fields:
            - { name: shipping, type: Adress }
"#,
        )
        .expect_err("typo in type name must fail");
        assert!(invalid_at(err).1.contains("'Adress'"));
    }

    #[test]
    fn rejects_duplicate_layer_priority() {
        let err = load_yaml(
            r#"
rules:
  ARCH-dependency-direction:
    layers:
      - { name: route, paths: ["src/routes/**"], priority: 1 }
      - { name: service, paths: ["src/services/**"], priority: 1 }
"#,
        )
        .expect_err("duplicate priority must fail");
        assert!(invalid_at(err).1.contains("total order"));
    }

    #[test]
    fn priorities_define_layer_order() {
        let manifest = load_yaml(
            r#"
rules:
  ARCH-dependency-direction:
    layers:
      - { name: repository, paths: ["src/repositories/**"], priority: 3 }
      - { name: route, paths: ["src/routes/**"], priority: 1 }
      - { name: service, paths: ["src/services/**"], priority: 2 }
"#,
        )
        .expect("manifest loads");
        let names: Vec<_> = manifest
            .architecture
            .layers
            .iter()
            .map(|l| (l.name.as_str(), l.rank))
            .collect();
        assert_eq!(names, vec![("route", 0), ("service", 1), ("repository", 2)]);
        assert_eq!(
            manifest
                .architecture
                .layer_of("src/services/order.ts")
                .map(|l| l.name.as_str()),
            Some("service")
        );
    }

    #[test]
    fn rejects_entry_outside_boundary() {
        let err = load_yaml(
            r#"
rules:
  ARCH-module-boundary:
    modules:
      - { name: payments, paths: ["src/payments/**"], entry: src/index.ts }
"#,
        )
        .expect_err("entry outside globs must fail");
        let (at, _) = invalid_at(err);
        assert_eq!(at, "rules.ARCH-module-boundary.modules[0](payments).entry");
    }

    #[test]
    fn rejects_unknown_layer_references_and_bad_severity() {
        let err = load_yaml(
            r#"
rules:
  ARCH-dependency-direction:
    layers: [ { name: route, paths: ["src/routes/**"] } ]
  ARCH-layer-violation:
    forbidden: [ { from: route, bypass: [servce] } ]
"#,
        )
        .expect_err("unknown layer must fail");
        assert!(invalid_at(err).1.contains("unknown layer 'servce'"));

        let err = load_yaml("strictness: { overrides: { CTR-pagination: loud } }")
            .expect_err("bad severity must fail");
        assert_eq!(invalid_at(err).0, "strictness.overrides.CTR-pagination");
    }

    #[test]
    fn line_limits_take_first_matching_override() {
        let manifest = load_yaml(
            r#"
rules:
  ARCH-max-file-lines:
    max: 800
    include: ["src/**"]
    overrides:
      - { glob: "src/generated/**", max: 5000 }
"#,
        )
        .expect("manifest loads");
        let limits = manifest
            .architecture
            .line_limits
            .as_ref()
            .expect("limits configured");
        assert_eq!(limits.limit_for("src/app.ts"), Some(800));
        assert_eq!(limits.limit_for("src/generated/api.ts"), Some(5000));
        assert_eq!(limits.limit_for("scripts/tool.ts"), None);

        let err = load_yaml("rules: { ARCH-max-file-lines: { max: 0 } }")
            .expect_err("zero max must fail");
        assert!(invalid_at(err).1.contains("positive"));
    }

    #[test]
    fn severity_sources_are_recorded() {
        let manifest = load_yaml(
            r#"
strictness:
  mode: lenient
  overrides: { CTR-idempotency: off }
rules:
  ARCH-max-file-lines: { max: 10, severity: warn }
"#,
        )
        .expect("manifest loads");
        assert_eq!(manifest.strictness.mode, StrictnessMode::Lenient);
        assert_eq!(
            manifest.severity_override("CTR-idempotency"),
            Some(SeveritySetting::Off)
        );
        assert_eq!(
            manifest.severity_override("ARCH-max-file-lines"),
            Some(SeveritySetting::Warning)
        );
        assert!(manifest.referenced_rules.contains("CTR-idempotency"));
        assert!(!manifest.referenced_rules.contains("ARCH-max-file-lines"));
        assert!(manifest.configured_rules.contains("ARCH-max-file-lines"));
    }
}
