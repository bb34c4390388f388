//! The `analyze` pipeline.
//!
//! ```text
//! roots ─walk─▶ files ─(rayon, one task per file)─▶ front end ─▶ ModuleIr ─▶ facts
//!                                    │ ParseError → diagnostic, zero facts
//!                                    ▼
//!                          collector (mpsc, single writer)
//!                                    │
//!            DependencyGraph ◀───────┴───────▶ FactSet
//!                     └──────▶ Evaluator (rules in parallel) ◀── Manifest
//!                                    │
//!                      suppression ─▶ Reporter ─▶ AnalysisReport
//! ```
//!
//! A manifest or registry error aborts before any file is read. Everything
//! after that degrades to diagnostics.

use crate::cache::{IrCache, content_key};
use crate::error::AnalyzeError;
use crate::frontend::{FrontEnd, FrontEndRegistry};
use crate::report::{AnalysisReport, Reporter};
use crate::suppress::SuppressionPolicy;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use stricture_facts::{Extractor, FallibleRegistry};
use stricture_graph::GraphBuilder;
use stricture_kernel::{
    Diagnostic, DiagnosticKind, Fact, FactSet, ModuleIr, ModuleSummary, ParseError,
};
use stricture_manifest::Manifest;
use stricture_rules::{Evaluator, RuleContext, RuleRegistry};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "vendor", "__pycache__"];

/// Engine tuning. The manifest stays the only behavioural configuration.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Worker threads; `None` uses one per core.
    pub threads: Option<usize>,
    /// Reuse parsed IR for files whose content has not changed.
    pub cache_ir: bool,
    pub fallible: FallibleRegistry,
    /// Import prefix rewrites (`@/` → `src/`).
    pub aliases: Vec<(String, String)>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            threads: None,
            cache_ir: true,
            fallible: FallibleRegistry::default(),
            aliases: Vec::new(),
        }
    }
}

/// A discovered file: where to read it and how to name it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SourceFile {
    /// Path relative to its root, `/`-separated.
    name: String,
    path: PathBuf,
}

enum FileOutcome {
    Parsed(Arc<ModuleIr>, Vec<Fact>),
    Failed(ParseError),
    Skipped,
}

pub struct Analyzer {
    options: AnalyzeOptions,
    front_ends: FrontEndRegistry,
    rules: RuleRegistry,
    cache: IrCache,
}

impl Analyzer {
    pub fn new(options: AnalyzeOptions) -> Self {
        Self {
            options,
            front_ends: FrontEndRegistry::default(),
            rules: RuleRegistry::builtin(),
            cache: IrCache::default(),
        }
    }

    pub fn with_front_end(mut self, front_end: Box<dyn FrontEnd>) -> Self {
        self.front_ends.register(front_end);
        self
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn cache(&self) -> &IrCache {
        &self.cache
    }

    /// Load and validate the manifest, then analyse every file under `roots`.
    pub fn analyze(
        &self,
        manifest_path: &Path,
        roots: &[PathBuf],
    ) -> Result<AnalysisReport, AnalyzeError> {
        let manifest = Manifest::from_path(manifest_path)?;
        self.rules.check_manifest(&manifest)?;
        info!(manifest = %manifest_path.display(), roots = roots.len(), "starting analysis");

        let mut diagnostics = Vec::new();
        let files = discover(roots, &mut diagnostics)?;
        debug!(files = files.len(), "discovered source files");

        self.pool()?.install(|| {
            let (modules, facts) = self.parse_all(&files, &mut diagnostics);
            self.evaluate(&manifest, &modules, facts, diagnostics)
        })
    }

    /// Analyse modules already lowered to IR.
    pub fn analyze_modules(
        &self,
        manifest: &Manifest,
        modules: Vec<ModuleIr>,
    ) -> Result<AnalysisReport, AnalyzeError> {
        self.rules.check_manifest(manifest)?;
        let mut modules: Vec<ModuleIr> = modules
            .into_iter()
            .map(ModuleIr::with_locations_filled)
            .collect();
        modules.sort_by(|a, b| a.path.cmp(&b.path));

        let mut diagnostics = Vec::new();
        let mut seen = BTreeSet::new();
        modules.retain(|module| {
            let fresh = seen.insert(module.path.clone());
            if !fresh {
                diagnostics.push(duplicate_module(&module.path));
            }
            fresh
        });

        self.pool()?.install(|| {
            let extractor = Extractor::new(&self.options.fallible);
            let extracted: Vec<Vec<Fact>> =
                modules.par_iter().map(|module| extractor.extract(module)).collect();
            let mut facts = FactSet::new();
            for (module, module_facts) in modules.iter().zip(extracted) {
                facts.insert(ModuleSummary::from(module), module_facts);
            }
            self.evaluate(manifest, &modules, facts, diagnostics)
        })
    }

    fn pool(&self) -> Result<rayon::ThreadPool, AnalyzeError> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.unwrap_or(0))
            .build()?)
    }

    /// Front end, IR and facts for every file; one rayon task per file.
    fn parse_all(
        &self,
        files: &[SourceFile],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (Vec<ModuleIr>, FactSet) {
        let (tx, rx) = mpsc::channel::<FileOutcome>();
        files.par_iter().for_each_with(tx, |tx, file| {
            let outcome = self.parse_file(file);
            if tx.send(outcome).is_err() {
                warn!(file = %file.name, "file result collector closed early");
            }
        });

        let mut parsed: Vec<(Arc<ModuleIr>, Vec<Fact>)> = Vec::new();
        for outcome in rx {
            match outcome {
                FileOutcome::Parsed(module, facts) => parsed.push((module, facts)),
                FileOutcome::Failed(err) => {
                    warn!(file = %err.path(), error = %err, "file skipped");
                    diagnostics.push(err.to_diagnostic());
                }
                FileOutcome::Skipped => {}
            }
        }
        parsed.sort_by(|a, b| a.0.path.cmp(&b.0.path));

        let mut modules = Vec::with_capacity(parsed.len());
        let mut facts = FactSet::new();
        let mut seen = BTreeSet::new();
        for (module, module_facts) in parsed {
            if !seen.insert(module.path.clone()) {
                diagnostics.push(duplicate_module(&module.path));
                continue;
            }
            facts.insert(ModuleSummary::from(module.as_ref()), module_facts);
            modules.push(Arc::unwrap_or_clone(module));
        }
        (modules, facts)
    }

    fn parse_file(&self, file: &SourceFile) -> FileOutcome {
        let Some((front_end, module_path)) = self.front_ends.resolve(&file.name) else {
            debug!(file = %file.name, "no front end, skipping");
            return FileOutcome::Skipped;
        };
        let source = match std::fs::read_to_string(&file.path) {
            Ok(source) => source,
            Err(source) => {
                return FileOutcome::Failed(ParseError::Io {
                    path: file.name.clone(),
                    source,
                });
            }
        };

        let key = content_key(front_end.language(), &module_path, &source);
        let cached = self.options.cache_ir.then(|| self.cache.get(&key)).flatten();
        let module = match cached {
            Some(module) => {
                debug!(file = %file.name, "ir cache hit");
                module
            }
            None => match front_end.parse(&file.name, &module_path, &source) {
                Ok(module) => {
                    let module = Arc::new(module);
                    if self.options.cache_ir {
                        self.cache.insert(key, Arc::clone(&module));
                    }
                    module
                }
                Err(err) => return FileOutcome::Failed(err),
            },
        };
        let facts = Extractor::new(&self.options.fallible).extract(&module);
        FileOutcome::Parsed(module, facts)
    }

    fn evaluate(
        &self,
        manifest: &Manifest,
        modules: &[ModuleIr],
        facts: FactSet,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<AnalysisReport, AnalyzeError> {
        let mut builder = GraphBuilder::new(&manifest.architecture);
        for (prefix, replacement) in &self.options.aliases {
            builder = builder.alias(prefix.clone(), replacement.clone());
        }
        let graph = builder.build(modules);
        diagnostics.extend(graph.diagnostics().iter().cloned());

        let ctx = RuleContext::new(&facts, &graph, manifest);
        let evaluation = Evaluator::new(&self.rules).evaluate(&ctx)?;
        diagnostics.extend(evaluation.diagnostics);

        let policies: BTreeMap<&str, SuppressionPolicy> = modules
            .iter()
            .filter(|module| !module.directives.is_empty())
            .map(|module| {
                (
                    module.path.as_str(),
                    SuppressionPolicy::from_directives(&module.directives),
                )
            })
            .collect();

        let mut reporter = Reporter::new();
        let mut suppressed = 0;
        for violation in evaluation.violations {
            if policies
                .get(violation.file.as_str())
                .is_some_and(|policy| policy.suppresses(&violation))
            {
                suppressed += 1;
                continue;
            }
            reporter.push(violation);
        }

        let report =
            AnalysisReport::new(reporter.finish(), diagnostics, modules.len(), suppressed);
        info!(
            files = report.summary.files_analyzed,
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            suppressed = report.summary.suppressed,
            diagnostics = report.diagnostics.len(),
            "analysis finished"
        );
        Ok(report)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzeOptions::default())
    }
}

/// Analyse with default options and the built-in rules.
pub fn analyze(manifest_path: &Path, roots: &[PathBuf]) -> Result<AnalysisReport, AnalyzeError> {
    Analyzer::default().analyze(manifest_path, roots)
}

fn duplicate_module(path: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::Parse,
        path,
        format!("module {path} is provided more than once; later copies ignored"),
    )
}

/// Every regular file under `roots`, sorted by name.
fn discover(roots: &[PathBuf], diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<SourceFile>, AnalyzeError> {
    let mut files = Vec::new();
    for root in roots {
        let meta = std::fs::metadata(root).map_err(|source| AnalyzeError::Root {
            path: root.display().to_string(),
            source,
        })?;
        if meta.is_file() {
            files.push(SourceFile {
                name: posix(root),
                path: root.clone(),
            });
            continue;
        }
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(posix).unwrap_or_default();
                    diagnostics.push(Diagnostic::new(DiagnosticKind::Io, path, err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(SourceFile {
                name: posix(rel),
                path: entry.path().to_path_buf(),
            });
        }
    }
    files.sort();
    Ok(files)
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn posix(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").unwrap_or(&text).to_string()
}
