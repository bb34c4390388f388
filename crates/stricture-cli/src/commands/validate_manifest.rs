use crate::support::{fail, load_manifest_or_exit, print_json_or_exit};
use serde_json::json;
use std::path::PathBuf;
use stricture_manifest::StrictnessMode;
use stricture_rules::RuleRegistry;

pub fn run(manifest_path: PathBuf, json_output: bool) {
    let manifest = load_manifest_or_exit(&manifest_path);
    let registry = RuleRegistry::builtin();
    if let Err(err) = registry.check_manifest(&manifest) {
        fail(err);
    }
    let warnings: Vec<String> = registry
        .unknown_rule_options(&manifest)
        .iter()
        .map(|d| d.message.clone())
        .collect();

    let endpoints = manifest.endpoints().count();
    let layers: Vec<&str> = manifest
        .architecture
        .layers
        .iter()
        .map(|layer| layer.name.as_str())
        .collect();

    if json_output {
        let payload = json!({
            "manifest": manifest_path.display().to_string(),
            "valid": true,
            "contracts": manifest.contracts.len(),
            "endpoints": endpoints,
            "layers": layers,
            "boundaries": manifest.architecture.boundaries.len(),
            "strictness": match manifest.strictness.mode {
                StrictnessMode::Strict => "strict",
                StrictnessMode::Lenient => "lenient",
            },
            "warnings": warnings,
        });
        print_json_or_exit(&payload, "manifest summary");
        return;
    }

    println!("stricture validate-manifest");
    println!("  Manifest: {}", manifest_path.display());
    println!("  Contracts: {}", manifest.contracts.len());
    println!("  Endpoints: {endpoints}");
    if layers.is_empty() {
        println!("  Layers: -");
    } else {
        println!("  Layers: {}", layers.join(" -> "));
    }
    println!("  Module boundaries: {}", manifest.architecture.boundaries.len());
    for warning in &warnings {
        println!("  Warning: {warning}");
    }
}
