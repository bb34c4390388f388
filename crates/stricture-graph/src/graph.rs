//! Dependency graph construction.
//!
//! Edge resolution is per module and runs in parallel; re-export following
//! needs every module's first-phase edges and runs as a second parallel pass
//! over a read-only index. The assembled graph is immutable.

use crate::resolve::{Resolution, Resolver};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use stricture_kernel::{Diagnostic, DiagnosticKind, Import, ModuleIr, SourceLocation};
use stricture_manifest::ArchitectureConfig;
use tracing::debug;

pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeTarget {
    Internal(String),
    External,
    Unresolved,
}

impl EdgeTarget {
    pub fn internal(&self) -> Option<&str> {
        match self {
            EdgeTarget::Internal(path) => Some(path),
            _ => None,
        }
    }
}

impl From<Resolution> for EdgeTarget {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Internal(path) => EdgeTarget::Internal(path),
            Resolution::External => EdgeTarget::External,
            Resolution::Unresolved => EdgeTarget::Unresolved,
        }
    }
}

/// A module a re-export chain passes through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReexportHop {
    pub module: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub specifier: String,
    /// The file the specifier names.
    pub target: EdgeTarget,
    /// Module that defines the imported symbols once re-exports are followed.
    /// Equals `target` when nothing is re-exported.
    pub origin: Option<String>,
    /// Re-exporting modules between `target` and `origin`, `target` first.
    pub via: Vec<ReexportHop>,
    pub location: SourceLocation,
    pub kind: ImportKind,
    pub is_type_only: bool,
    pub is_reexport: bool,
    pub symbols: Vec<String>,
}

impl Edge {
    pub fn target_path(&self) -> Option<&str> {
        self.target.internal()
    }

    /// Every module from the importer to the symbol's definition.
    pub fn chain(&self) -> Vec<&str> {
        let mut out = vec![self.from.as_str()];
        if let Some(target) = self.target_path() {
            out.push(target);
        }
        for hop in &self.via {
            if out.last() != Some(&hop.module.as_str()) {
                out.push(&hop.module);
            }
        }
        if let Some(origin) = &self.origin
            && out.last() != Some(&origin.as_str())
        {
            out.push(origin);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub path: String,
    pub layer: Option<String>,
    pub boundary: Option<String>,
}

impl GraphNode {
    pub fn layer_tag(&self) -> &str {
        self.layer.as_deref().unwrap_or(UNASSIGNED)
    }

    pub fn boundary_tag(&self) -> &str {
        self.boundary.as_deref().unwrap_or(UNASSIGNED)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<Edge>,
    diagnostics: Vec<Diagnostic>,
}

impl DependencyGraph {
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node(&self, path: &str) -> Option<&GraphNode> {
        self.nodes.get(path)
    }

    /// All edges, ordered by importer path then source position.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges whose target is an analysed module.
    pub fn internal_edges(&self) -> impl Iterator<Item = (&Edge, &str)> {
        self.edges
            .iter()
            .filter_map(|edge| edge.target_path().map(|target| (edge, target)))
    }

    pub fn edges_from<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == path)
    }

    /// First edge (in source order) from `from` to `to`.
    pub fn edge_between(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|edge| edge.from == from && edge.target_path() == Some(to))
    }

    /// Sorted, de-duplicated internal adjacency used by graph algorithms.
    pub fn adjacency(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut adj: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for node in self.nodes.keys() {
            adj.entry(node.as_str()).or_default();
        }
        for (edge, target) in self.internal_edges() {
            adj.entry(edge.from.as_str()).or_default().insert(target);
        }
        adj
    }

    /// Unresolved imports, one per import statement.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.nodes.values() {
            writeln!(
                f,
                "{} [layer={}, boundary={}]",
                node.path,
                node.layer_tag(),
                node.boundary_tag()
            )?;
            for edge in self.edges_from(&node.path) {
                let target = match &edge.target {
                    EdgeTarget::Internal(path) => path.as_str(),
                    EdgeTarget::External => "external",
                    EdgeTarget::Unresolved => "unresolved",
                };
                write!(f, "  -> {target}")?;
                if let Some(origin) = &edge.origin
                    && edge.target_path() != Some(origin.as_str())
                {
                    write!(f, " (origin {origin})")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

pub struct GraphBuilder<'a> {
    config: &'a ArchitectureConfig,
    aliases: Vec<(String, String)>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a ArchitectureConfig) -> Self {
        Self {
            config,
            aliases: Vec::new(),
        }
    }

    pub fn alias(mut self, prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.aliases.push((prefix.into(), replacement.into()));
        self
    }

    pub fn build(&self, modules: &[ModuleIr]) -> DependencyGraph {
        let mut resolver = Resolver::new(modules.iter().map(|m| m.path.as_str()));
        for (prefix, replacement) in &self.aliases {
            resolver = resolver.with_alias(prefix.clone(), replacement.clone());
        }

        let nodes: BTreeMap<String, GraphNode> = modules
            .iter()
            .map(|module| {
                let path = module.path.clone();
                let node = GraphNode {
                    layer: self.config.layer_of(&path).map(|l| l.name.clone()),
                    boundary: self.config.boundary_of(&path).map(|b| b.name.clone()),
                    path: path.clone(),
                };
                (path, node)
            })
            .collect();

        let first_pass: Vec<Vec<Edge>> = modules
            .par_iter()
            .map(|module| resolve_module(module, &resolver))
            .collect();

        let reexports = ReexportIndex::new(modules, &first_pass);
        let mut edges: Vec<Edge> = first_pass
            .into_par_iter()
            .flatten()
            .map(|mut edge| {
                reexports.follow(&mut edge);
                edge
            })
            .collect();
        edges.sort_by(|a, b| {
            a.from
                .cmp(&b.from)
                .then_with(|| a.location.cmp(&b.location))
                .then_with(|| a.specifier.cmp(&b.specifier))
        });

        let diagnostics: Vec<Diagnostic> = edges
            .iter()
            .filter(|edge| edge.target == EdgeTarget::Unresolved)
            .map(|edge| {
                Diagnostic::new(
                    DiagnosticKind::UnresolvedImport,
                    edge.from.clone(),
                    format!("cannot resolve import '{}'", edge.specifier),
                )
                .at_line(edge.location.line)
            })
            .collect();

        debug!(
            modules = nodes.len(),
            edges = edges.len(),
            unresolved = diagnostics.len(),
            "dependency graph built"
        );
        DependencyGraph {
            nodes,
            edges,
            diagnostics,
        }
    }
}

/// Build with no path aliases.
pub fn build(modules: &[ModuleIr], config: &ArchitectureConfig) -> DependencyGraph {
    GraphBuilder::new(config).build(modules)
}

fn resolve_module(module: &ModuleIr, resolver: &Resolver) -> Vec<Edge> {
    module
        .imports
        .iter()
        .map(|import| {
            let target = EdgeTarget::from(resolver.resolve(&module.path, &import.source));
            if target == EdgeTarget::Unresolved {
                debug!(module = %module.path, specifier = %import.source, "unresolved import");
            }
            edge_for(module, import, target)
        })
        .collect()
}

fn edge_for(module: &ModuleIr, import: &Import, target: EdgeTarget) -> Edge {
    let mut location = import.location.clone();
    if location.file.is_empty() {
        location.file = module.path.clone();
    }
    Edge {
        from: module.path.clone(),
        specifier: import.source.clone(),
        origin: target.internal().map(str::to_string),
        target,
        via: Vec::new(),
        location,
        kind: if import.is_dynamic {
            ImportKind::Dynamic
        } else {
            ImportKind::Static
        },
        is_type_only: import.is_type_only,
        is_reexport: import.is_reexport,
        symbols: import.symbols.clone(),
    }
}

/// Re-export statements by module, with their resolved targets.
struct ReexportIndex<'m> {
    by_module: BTreeMap<&'m str, Vec<(&'m Import, String)>>,
    declared: BTreeMap<&'m str, &'m ModuleIr>,
}

impl<'m> ReexportIndex<'m> {
    fn new(modules: &'m [ModuleIr], first_pass: &[Vec<Edge>]) -> Self {
        let mut by_module: BTreeMap<&str, Vec<(&Import, String)>> = BTreeMap::new();
        for (module, edges) in modules.iter().zip(first_pass) {
            for (import, edge) in module.imports.iter().zip(edges) {
                if import.is_reexport
                    && let Some(target) = edge.target_path()
                {
                    by_module
                        .entry(module.path.as_str())
                        .or_default()
                        .push((import, target.to_string()));
                }
            }
        }
        let declared = modules.iter().map(|m| (m.path.as_str(), m)).collect();
        Self {
            by_module,
            declared,
        }
    }

    /// Walk re-exports from the edge's target until the module that
    /// declares the imported symbols.
    fn follow(&self, edge: &mut Edge) {
        let Some(start) = edge.target_path().map(str::to_string) else {
            return;
        };
        let wanted: Vec<String> = edge
            .symbols
            .iter()
            .filter(|s| s.as_str() != "*" && s.as_str() != "default")
            .cloned()
            .collect();
        if wanted.is_empty() && !edge.is_reexport {
            return;
        }

        let mut current = start;
        let mut visited = BTreeSet::new();
        loop {
            if !visited.insert(current.clone()) {
                break;
            }
            if wanted
                .iter()
                .any(|symbol| self.declared.get(current.as_str()).is_some_and(|m| m.declares(symbol)))
            {
                break;
            }
            let Some(reexports) = self.by_module.get(current.as_str()) else {
                break;
            };
            let next = reexports.iter().find(|(import, _)| {
                if wanted.is_empty() {
                    reexports.len() == 1
                } else {
                    wanted.iter().any(|symbol| import.covers(symbol))
                }
            });
            let Some((import, target)) = next else {
                break;
            };
            edge.via.push(ReexportHop {
                module: current.clone(),
                location: import.location.clone(),
            });
            current = target.clone();
        }
        edge.origin = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str, imports: &[(&str, &[&str], bool)]) -> ModuleIr {
        let mut m = ModuleIr::new(path, "typescript");
        for (line, (source, symbols, reexport)) in imports.iter().enumerate() {
            m.imports.push(Import {
                source: (*source).into(),
                symbols: symbols.iter().map(|s| (*s).into()).collect(),
                is_reexport: *reexport,
                location: SourceLocation::new(path, line as u32 + 1, 1),
                ..Import::default()
            });
        }
        m
    }

    #[test]
    fn edges_classify_internal_external_and_unresolved() {
        let modules = vec![
            module(
                "src/a.ts",
                &[("./b", &["b"], false), ("lodash", &[], false), ("./gone", &[], false)],
            ),
            module("src/b.ts", &[]),
        ];
        let graph = build(&modules, &ArchitectureConfig::default());
        let targets: Vec<_> = graph.edges().iter().map(|e| e.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                EdgeTarget::Internal("src/b.ts".into()),
                EdgeTarget::External,
                EdgeTarget::Unresolved,
            ]
        );
        assert_eq!(graph.diagnostics().len(), 1);
        assert_eq!(graph.diagnostics()[0].line, 3);
        assert_eq!(graph.adjacency()["src/a.ts"].len(), 1);
    }

    #[test]
    fn reexports_are_followed_to_the_defining_module() {
        let mut defining = module("src/payments/stripe.ts", &[]);
        defining.declared_symbols.push("charge".into());
        let modules = vec![
            module("src/app.ts", &[("./api", &["charge"], false)]),
            module("src/api/index.ts", &[("./public", &["*"], true)]),
            module("src/api/public.ts", &[("../payments/stripe", &["charge"], true)]),
            defining,
        ];
        let graph = build(&modules, &ArchitectureConfig::default());
        let edge = graph
            .edge_between("src/app.ts", "src/api/index.ts")
            .expect("app imports api");
        assert_eq!(edge.origin.as_deref(), Some("src/payments/stripe.ts"));
        let hops: Vec<_> = edge.via.iter().map(|h| h.module.as_str()).collect();
        assert_eq!(hops, vec!["src/api/index.ts", "src/api/public.ts"]);
        assert_eq!(
            edge.chain(),
            vec![
                "src/app.ts",
                "src/api/index.ts",
                "src/api/public.ts",
                "src/payments/stripe.ts"
            ]
        );
    }

    #[test]
    fn reexport_cycles_terminate() {
        let modules = vec![
            module("src/a.ts", &[("./b", &["x"], true)]),
            module("src/b.ts", &[("./a", &["x"], true)]),
        ];
        let graph = build(&modules, &ArchitectureConfig::default());
        assert_eq!(graph.edges().len(), 2);
    }
}
