use stricture_facts::extract;
use stricture_graph::build;
use stricture_kernel::{
    CallExpr, DiagnosticKind, FactSet, FunctionDecl, Import, ModuleIr, ModuleSummary, Node, NodeKind,
    PropertyAccess, SourceLocation,
};
use stricture_manifest::Manifest;
use stricture_rules::{Evaluator, RuleContext, RuleRegistry};

const MANIFEST: &str = r#"
contracts:
  - id: shop
    endpoints:
      - path: /orders/{id}
        method: GET
        status_codes: [200, 404]
        response:
          name: Order
          fields:
            - { name: id, type: string }
            - { name: shipping, type: object, nullable: true }
rules:
  ARCH-dependency-direction:
    layers:
      - { name: api, paths: ["src/api/**"] }
      - { name: service, paths: ["src/service/**"] }
      - { name: repository, paths: ["src/repository/**"] }
"#;

fn at(file: &str, line: u32, kind: NodeKind) -> Node {
    Node::new(SourceLocation::new(file, line, 1), kind)
}

fn module(path: &str, imports: &[&str]) -> ModuleIr {
    let mut module = ModuleIr::new(path, "typescript");
    module.line_count = 40;
    for (i, source) in imports.iter().enumerate() {
        module.imports.push(Import {
            source: source.to_string(),
            location: SourceLocation::new(path, i as u32 + 1, 1),
            ..Import::default()
        });
    }
    module
}

/// api -> service -> repository -> api, plus an unguarded client in the
/// service layer.
fn scenario() -> Vec<ModuleIr> {
    let file = "src/service/orders.ts";
    let mut service = module(file, &["../repository/orders"]);
    let mut fetch = CallExpr::new("fetch");
    fetch.target = Some("/orders/{id}".into());
    fetch.method = Some("GET".into());
    fetch.binds = vec!["order".into()];
    service.functions.push(FunctionDecl {
        name: "shippingCity".into(),
        body: vec![
            at(file, 10, NodeKind::Call(fetch)),
            at(
                file,
                11,
                NodeKind::PropertyAccess(PropertyAccess {
                    base: "order.shipping".into(),
                    property: "city".into(),
                    owner_type: Some("Order".into()),
                    ..PropertyAccess::default()
                }),
            ),
        ],
        location: SourceLocation::new(file, 9, 1),
        ..FunctionDecl::default()
    });

    vec![
        module("src/api/orders.ts", &["../service/orders"]),
        service,
        module("src/repository/orders.ts", &["../api/orders"]),
    ]
}

fn facts(modules: &[ModuleIr]) -> FactSet {
    let mut set = FactSet::new();
    for m in modules {
        set.insert(ModuleSummary::from(m), extract(m));
    }
    set
}

fn rendered(registry: &RuleRegistry, manifest: &Manifest, modules: &[ModuleIr]) -> Vec<String> {
    let facts = facts(modules);
    let graph = build(modules, &manifest.architecture);
    let ctx = RuleContext::new(&facts, &graph, manifest);
    let evaluation = Evaluator::new(registry).evaluate(&ctx).expect("plan");
    assert!(
        evaluation.diagnostics.iter().all(|d| !d.kind.degrades_coverage()),
        "{:?}",
        evaluation.diagnostics
    );
    let mut lines: Vec<String> = evaluation.violations.iter().map(ToString::to_string).collect();
    lines.sort();
    lines
}

#[test]
fn three_layer_cycle_reports_once_with_full_path() {
    let manifest = Manifest::from_yaml_str(MANIFEST, "m.yml").expect("manifest");
    let lines = rendered(&RuleRegistry::builtin(), &manifest, &scenario());
    let cycles: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("[ARCH-no-circular-deps]"))
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].ends_with(
        "Circular dependency detected: src/api/orders.ts -> src/service/orders.ts -> src/repository/orders.ts -> src/api/orders.ts"
    ));
    assert!(lines.iter().any(|line| line.starts_with(
        "src/repository/orders.ts:1 error [ARCH-dependency-direction] Import from repository to api"
    )));
}

#[test]
fn contract_findings_come_from_the_same_run() {
    let manifest = Manifest::from_yaml_str(MANIFEST, "m.yml").expect("manifest");
    let lines = rendered(&RuleRegistry::builtin(), &manifest, &scenario());
    for rule in ["CTR-null-safety", "CTR-error-handling", "CTR-status-code-handling"] {
        assert!(
            lines.iter().any(|line| line.contains(&format!("[{rule}]"))),
            "{rule} missing from {lines:#?}"
        );
    }
}

#[test]
fn removing_a_rule_removes_exactly_its_output() {
    let manifest = Manifest::from_yaml_str(MANIFEST, "m.yml").expect("manifest");
    let modules = scenario();
    let full = rendered(&RuleRegistry::builtin(), &manifest, &modules);

    for meta in RuleRegistry::builtin().metadata() {
        let without = rendered(&RuleRegistry::builtin().without(meta.id), &manifest, &modules);
        let tag = format!("[{}]", meta.id);
        let expected: Vec<String> = full.iter().filter(|l| !l.contains(&tag)).cloned().collect();
        assert_eq!(without, expected, "removing {}", meta.id);
    }
}

#[test]
fn options_of_a_removed_rule_become_a_config_warning() {
    let manifest = Manifest::from_yaml_str(MANIFEST, "m.yml").expect("manifest");
    let modules = scenario();
    let facts = facts(&modules);
    let graph = build(&modules, &manifest.architecture);
    let ctx = RuleContext::new(&facts, &graph, &manifest);
    let registry = RuleRegistry::builtin().without("ARCH-dependency-direction");

    let evaluation = Evaluator::new(&registry).evaluate(&ctx).expect("plan");
    assert_eq!(evaluation.diagnostics.len(), 1);
    assert_eq!(evaluation.diagnostics[0].kind, DiagnosticKind::Config);
    assert_eq!(
        evaluation.diagnostics[0].rule_id.as_deref(),
        Some("ARCH-dependency-direction")
    );
    assert!(evaluation.violations.iter().any(|v| v.rule_id == "ARCH-no-circular-deps"));
}

#[test]
fn lenient_mode_downgrades_and_off_drops() {
    let text = format!(
        "{MANIFEST}\nstrictness:\n  mode: lenient\n  overrides:\n    ARCH-no-circular-deps: off\n"
    );
    let manifest = Manifest::from_yaml_str(&text, "m.yml").expect("manifest");
    let lines = rendered(&RuleRegistry::builtin(), &manifest, &scenario());
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|line| line.contains(" warning [")));
    assert!(!lines.iter().any(|line| line.contains("ARCH-no-circular-deps")));
}
