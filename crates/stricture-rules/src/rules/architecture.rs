//! ARCH rules: import structure against the manifest's architecture section.

use super::{in_file, join};
use crate::rule::{Category, Rule, RuleContext, RuleMeta};
use stricture_graph::Edge;
use stricture_kernel::{RuleEvaluationError, Severity, SourceLocation, Violation};
use stricture_manifest::{Layer, ModuleBoundary, ReexportAttribution};

/// Internal edges whose importer is production code.
fn source_edges<'a>(ctx: &RuleContext<'a>) -> impl Iterator<Item = (&'a Edge, &'a str)> + 'a {
    let facts = ctx.facts;
    ctx.graph
        .internal_edges()
        .filter(move |(edge, _)| facts.module(&edge.from).is_none_or(|m| !m.is_test))
}

fn edge_location(edge: &Edge) -> SourceLocation {
    in_file(&edge.location, &edge.from)
}

/// Layers of both ends when both are tagged.
fn layers<'a>(ctx: &RuleContext<'a>, edge: &Edge, target: &str) -> Option<(&'a Layer, &'a Layer)> {
    let config = &ctx.manifest.architecture;
    let from = ctx.graph.node(&edge.from)?.layer.as_deref()?;
    let to = ctx.graph.node(target)?.layer.as_deref()?;
    Some((config.layer(from)?, config.layer(to)?))
}

pub struct NoCircularDeps;

const NO_CIRCULAR_DEPS: RuleMeta = RuleMeta {
    id: "ARCH-no-circular-deps",
    category: Category::Arch,
    description: "Keep the import graph acyclic",
    why: "Cycles make modules impossible to test, load or reason about in isolation.",
    default_severity: Severity::Error,
    suggested_fix: "Extract the shared piece into a module both sides can import, or invert one dependency.",
};

impl Rule for NoCircularDeps {
    fn meta(&self) -> &'static RuleMeta {
        &NO_CIRCULAR_DEPS
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let mut out = Vec::new();
        for cycle in ctx.graph.cycles() {
            let [first, second, ..] = cycle.path.as_slice() else {
                return Err(NO_CIRCULAR_DEPS.failure(format!(
                    "cycle over {} has no closing path",
                    join(&cycle.members)
                )));
            };
            let location = ctx
                .graph
                .edge_between(first, second)
                .map(edge_location)
                .unwrap_or_else(|| SourceLocation::new(first.as_str(), 1, 0));
            out.push(NO_CIRCULAR_DEPS.violation(
                &location,
                format!("Circular dependency detected: {}", cycle.path.join(" -> ")),
            ));
        }
        Ok(out)
    }
}

pub struct DependencyDirection;

const DEPENDENCY_DIRECTION: RuleMeta = RuleMeta {
    id: "ARCH-dependency-direction",
    category: Category::Arch,
    description: "Import only downward through the configured layers",
    why: "Upward imports couple stable lower layers to volatile upper ones.",
    default_severity: Severity::Error,
    suggested_fix: "Move the shared code down a layer or pass it in from above instead of importing upward.",
};

impl Rule for DependencyDirection {
    fn meta(&self) -> &'static RuleMeta {
        &DEPENDENCY_DIRECTION
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let config = &ctx.manifest.architecture;
        let order = config
            .layers
            .iter()
            .map(|layer| layer.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        let mut out = Vec::new();
        for (edge, target) in source_edges(ctx) {
            let Some((from, to)) = layers(ctx, edge, target) else {
                continue;
            };
            if from.name == to.name {
                continue;
            }
            let message = if to.rank < from.rank {
                format!(
                    "Import from {} to {} violates dependency flow, allowed direction: {order}",
                    from.name, to.name
                )
            } else if let Some(allowed) = config.allowed.get(&from.name)
                && !allowed.contains(&to.name)
            {
                format!(
                    "Layer {} may only import {}, not {} ({target})",
                    from.name,
                    join(allowed),
                    to.name
                )
            } else {
                continue;
            };
            out.push(DEPENDENCY_DIRECTION.violation(&edge_location(edge), message));
        }
        Ok(out)
    }
}

pub struct LayerViolation;

const LAYER_VIOLATION: RuleMeta = RuleMeta {
    id: "ARCH-layer-violation",
    category: Category::Arch,
    description: "Do not skip layers or import what a layer is forbidden to use",
    why: "Bypassing a layer skips the rules that layer enforces.",
    default_severity: Severity::Error,
    suggested_fix: "Go through the intermediate layer, or move the forbidden import behind the layer that owns it.",
};

impl Rule for LayerViolation {
    fn meta(&self) -> &'static RuleMeta {
        &LAYER_VIOLATION
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let config = &ctx.manifest.architecture;
        let mut out = Vec::new();

        for (edge, target) in source_edges(ctx) {
            let Some((from, to)) = layers(ctx, edge, target) else {
                continue;
            };
            if to.rank <= from.rank + 1 {
                continue;
            }
            let skipped: Vec<&str> = config
                .layers
                .iter()
                .filter(|layer| layer.rank > from.rank && layer.rank < to.rank)
                .map(|layer| layer.name.as_str())
                .collect();
            let bypassed: Vec<&str> = config
                .forbidden
                .iter()
                .filter(|rule| rule.from == from.name)
                .flat_map(|rule| skipped.iter().copied().filter(move |s| rule.bypass.contains(*s)))
                .collect();
            if let Some(first) = bypassed.first() {
                out.push(LAYER_VIOLATION.violation(
                    &edge_location(edge),
                    format!(
                        "Import from {} to {} bypasses the {first} layer ({target})",
                        from.name, to.name
                    ),
                ));
            }
        }

        for edge in ctx.graph.edges() {
            if ctx.facts.module(&edge.from).is_some_and(|m| m.is_test) {
                continue;
            }
            let Some(layer) = ctx.graph.node(&edge.from).and_then(|n| n.layer.as_deref()) else {
                continue;
            };
            let hit = config
                .forbidden_imports
                .iter()
                .find(|rule| rule.layer == layer && rule.patterns.is_match(&edge.specifier));
            if let Some(rule) = hit {
                out.push(LAYER_VIOLATION.violation(
                    &edge_location(edge),
                    format!(
                        "Layer {layer} imports '{}', which matches its forbidden list ({})",
                        edge.specifier,
                        join(&rule.patterns.patterns)
                    ),
                ));
            }
        }
        Ok(out)
    }
}

pub struct ModuleBoundaryRule;

const MODULE_BOUNDARY: RuleMeta = RuleMeta {
    id: "ARCH-module-boundary",
    category: Category::Arch,
    description: "Reach a module only through its declared entry point",
    why: "Importing a module's internals couples callers to details the module is free to change.",
    default_severity: Severity::Error,
    suggested_fix: "Import from the module's entry point and export what callers need from there.",
};

impl Rule for ModuleBoundaryRule {
    fn meta(&self) -> &'static RuleMeta {
        &MODULE_BOUNDARY
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let config = &ctx.manifest.architecture;
        let mut out = Vec::new();
        for (edge, target) in source_edges(ctx) {
            if let Some(boundary) = config.boundary_of(target)
                && target != boundary.entry
                && !boundary.contains(&edge.from)
            {
                out.push(MODULE_BOUNDARY.violation(
                    &edge_location(edge),
                    format!(
                        "Access to {} module must go through {}, not direct import of {target}",
                        boundary.name, boundary.entry
                    ),
                ));
                continue;
            }
            if config.reexport_attribution == ReexportAttribution::EveryHop
                && let Some(boundary) = leaked_through(ctx, edge, target)
            {
                let origin = edge.origin.as_deref().unwrap_or(target);
                out.push(MODULE_BOUNDARY.violation(
                    &edge_location(edge),
                    format!(
                        "Re-export passes {origin} out of the {} module without going through {}",
                        boundary.name, boundary.entry
                    ),
                ));
            }
        }
        Ok(out)
    }
}

/// Boundary whose internals this re-export edge forwards from outside,
/// when the chain never passes the boundary's entry point.
fn leaked_through<'a>(ctx: &RuleContext<'a>, edge: &Edge, target: &str) -> Option<&'a ModuleBoundary> {
    if !edge.is_reexport {
        return None;
    }
    let origin = edge.origin.as_deref()?;
    let boundary = ctx.manifest.architecture.boundary_of(origin)?;
    if origin == boundary.entry || boundary.contains(&edge.from) || boundary.contains(target) {
        return None;
    }
    if edge.chain().contains(&boundary.entry.as_str()) {
        return None;
    }
    Some(boundary)
}

pub struct MaxFileLines;

const MAX_FILE_LINES: RuleMeta = RuleMeta {
    id: "ARCH-max-file-lines",
    category: Category::Arch,
    description: "Keep file size within configured limits",
    why: "Oversized files hide responsibilities and increase review risk.",
    default_severity: Severity::Error,
    suggested_fix: "Split this file into smaller focused units below the configured maximum.",
};

impl Rule for MaxFileLines {
    fn meta(&self) -> &'static RuleMeta {
        &MAX_FILE_LINES
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Violation>, RuleEvaluationError> {
        let Some(limits) = &ctx.manifest.architecture.line_limits else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for module in ctx.facts.modules() {
            let Some(max) = limits.limit_for(&module.path) else {
                continue;
            };
            let lines = if module.code_lines > 0 {
                module.code_lines
            } else {
                module.line_count
            };
            if lines > max {
                out.push(MAX_FILE_LINES.violation(
                    &SourceLocation::new(module.path.as_str(), 1, 0),
                    format!("File exceeds line limit: {lines} lines, maximum is {max}."),
                ));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stricture_graph::build;
    use stricture_kernel::{FactSet, Import, ModuleIr, ModuleSummary};
    use stricture_manifest::Manifest;

    const LAYERED: &str = r#"
rules:
  ARCH-dependency-direction:
    layers:
      - { name: route, paths: ["src/routes/**"] }
      - { name: service, paths: ["src/services/**"] }
      - { name: repository, paths: ["src/repositories/**"] }
      - { name: model, paths: ["src/models/**"] }
  ARCH-layer-violation:
    forbidden:
      - { from: route, bypass: [service] }
    forbidden_imports:
      - { layer: service, patterns: ["knex", "pg*"] }
  ARCH-module-boundary:
    modules:
      - { name: payments, paths: ["src/payments/**"], entry: src/payments/index.ts }
  ARCH-max-file-lines:
    max: 800
    include: ["src/**"]
"#;

    fn module(path: &str, imports: &[&str]) -> ModuleIr {
        let mut module = ModuleIr::new(path, "typescript");
        for (i, source) in imports.iter().enumerate() {
            module.imports.push(Import {
                source: source.to_string(),
                location: SourceLocation::new(path, i as u32 + 1, 1),
                ..Import::default()
            });
        }
        module
    }

    fn run(rule: &dyn Rule, modules: &[ModuleIr]) -> Vec<Violation> {
        let manifest = Manifest::from_yaml_str(LAYERED, "m.yml").expect("manifest");
        let graph = build(modules, &manifest.architecture);
        let mut facts = FactSet::new();
        for m in modules {
            facts.insert(ModuleSummary::from(m), Vec::new());
        }
        rule.check(&RuleContext::new(&facts, &graph, &manifest))
            .expect("rule runs")
    }

    #[test]
    fn route_skipping_service_layer_is_a_bypass() {
        let modules = [
            module("src/routes/orders.ts", &["../repositories/order"]),
            module("src/repositories/order.ts", &[]),
        ];
        let layer = run(&LayerViolation, &modules);
        assert_eq!(layer.len(), 1);
        assert!(layer[0].message.contains("bypasses the service layer"));
        assert!(run(&DependencyDirection, &modules).is_empty());
    }

    #[test]
    fn upward_import_violates_direction() {
        let modules = [
            module("src/repositories/order.ts", &["../services/pricing"]),
            module("src/services/pricing.ts", &[]),
        ];
        let found = run(&DependencyDirection, &modules);
        insta::assert_snapshot!(
            found[0].to_string(),
            @"src/repositories/order.ts:1 error [ARCH-dependency-direction] Import from repository to service violates dependency flow, allowed direction: route -> service -> repository -> model"
        );
    }

    #[test]
    fn forbidden_package_import_in_service() {
        let modules = [module("src/services/orders.ts", &["pg-promise", "lodash"])];
        let found = run(&LayerViolation, &modules);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("'pg-promise'"));
    }

    #[test]
    fn boundary_internals_only_through_entry() {
        let modules = [
            module(
                "src/services/checkout.ts",
                &["../payments/internal/stripe", "../payments"],
            ),
            module("src/payments/index.ts", &["./internal/stripe"]),
            module("src/payments/internal/stripe.ts", &[]),
        ];
        let found = run(&ModuleBoundaryRule, &modules);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "src/services/checkout.ts");
        assert_eq!(found[0].lines.start, 1);
    }

    #[test]
    fn mutual_services_form_one_cycle() {
        let modules = [
            module("src/services/order.ts", &["./user"]),
            module("src/services/user.ts", &["./order"]),
        ];
        let found = run(&NoCircularDeps, &modules);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].message,
            "Circular dependency detected: src/services/order.ts -> src/services/user.ts -> src/services/order.ts"
        );
    }

    #[test]
    fn long_file_reports_counts() {
        let mut big = module("src/services/huge.ts", &[]);
        big.line_count = 990;
        big.code_lines = 847;
        let found = run(&MaxFileLines, &[big]);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.ends_with("847 lines, maximum is 800."));
    }
}
