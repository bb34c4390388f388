use crate::cli::FormatArg;
use crate::support::{EXIT_VIOLATIONS, fail, parse_alias_or_exit, print_json_or_exit};
use std::path::PathBuf;
use stricture_engine::{AnalysisReport, AnalyzeOptions, Analyzer};

pub struct Args {
    pub roots: Vec<PathBuf>,
    pub manifest: PathBuf,
    pub format: FormatArg,
    pub threads: Option<usize>,
    pub no_cache: bool,
    pub aliases: Vec<String>,
}

pub fn run(args: Args) {
    let options = AnalyzeOptions {
        threads: args.threads,
        cache_ir: !args.no_cache,
        aliases: args.aliases.iter().map(|raw| parse_alias_or_exit(raw)).collect(),
        ..AnalyzeOptions::default()
    };
    let report = Analyzer::new(options)
        .analyze(&args.manifest, &args.roots)
        .unwrap_or_else(|err| fail(err));

    match args.format {
        FormatArg::Json => print_json_or_exit(&report, "report"),
        FormatArg::Text => print_text(&report),
    }
    if report.has_errors() {
        std::process::exit(EXIT_VIOLATIONS);
    }
}

fn print_text(report: &AnalysisReport) {
    for diagnostic in &report.diagnostics {
        println!("diagnostic: {diagnostic}");
    }
    for violation in &report.violations {
        println!("{violation}");
        if let Some(fix) = &violation.suggested_fix {
            println!("  fix: {fix}");
        }
    }

    let summary = &report.summary;
    println!(
        "stricture: {} file(s), {} error(s), {} warning(s), {} suppressed",
        summary.files_analyzed, summary.errors, summary.warnings, summary.suppressed
    );
    if !summary.complete {
        println!(
            "  analysis incomplete: {} diagnostic(s); missing findings are possible",
            report.diagnostics.len()
        );
    }
}
