use crate::support::print_json_or_exit;
use stricture_rules::RuleRegistry;

pub fn run(json_output: bool) {
    let metadata = RuleRegistry::builtin().metadata();

    if json_output {
        print_json_or_exit(&metadata, "rules");
        return;
    }

    println!("stricture rules ({})", metadata.len());
    for meta in &metadata {
        println!(
            "  {:<28} {:<7} {}",
            meta.id,
            meta.default_severity.as_str(),
            meta.description
        );
    }
}
