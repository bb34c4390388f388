//! Import specifier resolution against the set of analysed modules.

use std::collections::{BTreeMap, BTreeSet};

const INDEX_STEMS: &[&str] = &["index", "__init__", "mod"];

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resolution {
    /// An analysed module path.
    Internal(String),
    /// Outside the analysed tree (package, stdlib). Never flagged.
    External,
    /// Relative specifier naming a file that does not exist.
    Unresolved,
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    modules: BTreeSet<String>,
    /// Path without extension → module path. First in sort order wins.
    by_stem: BTreeMap<String, String>,
    /// Go package directory → first non-test file in it.
    go_packages: BTreeMap<String, String>,
    aliases: Vec<(String, String)>,
}

impl Resolver {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let modules: BTreeSet<String> = paths.into_iter().map(str::to_string).collect();
        let mut by_stem = BTreeMap::new();
        let mut go_packages = BTreeMap::new();
        for path in &modules {
            by_stem
                .entry(strip_extension(path).to_string())
                .or_insert_with(|| path.clone());
            if path.ends_with(".go") && !path.ends_with("_test.go") {
                go_packages
                    .entry(parent_dir(path).to_string())
                    .or_insert_with(|| path.clone());
            }
        }
        Self {
            modules,
            by_stem,
            go_packages,
            aliases: Vec::new(),
        }
    }

    /// Map a specifier prefix (`@/`) onto a root-relative one (`src/`).
    pub fn with_alias(mut self, prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.aliases.push((prefix.into(), replacement.into()));
        // Longest prefix first.
        self.aliases
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains(path)
    }

    pub fn resolve(&self, from: &str, specifier: &str) -> Resolution {
        let specifier = specifier.trim();
        if specifier.is_empty() {
            return Resolution::Unresolved;
        }

        if is_relative(specifier) {
            let candidate = if specifier.starts_with("./") || specifier.starts_with("../") {
                normalize(&join(parent_dir(from), specifier))
            } else {
                match python_relative(from, specifier) {
                    Some(candidate) => candidate,
                    None => return Resolution::Unresolved,
                }
            };
            return match self.lookup(&candidate) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::Unresolved,
            };
        }

        for (prefix, replacement) in &self.aliases {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                let candidate = normalize(&format!("{replacement}{rest}"));
                return match self.lookup(&candidate) {
                    Some(path) => Resolution::Internal(path),
                    None => Resolution::Unresolved,
                };
            }
        }

        if specifier.starts_with('/') {
            return match self.lookup(&normalize(specifier)) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::Unresolved,
            };
        }

        // Scoped npm package.
        if specifier.starts_with('@') {
            return Resolution::External;
        }

        let candidate = if !specifier.contains('/') && specifier.contains('.') {
            specifier.replace('.', "/")
        } else {
            specifier.to_string()
        };
        if let Some(path) = self.lookup(&candidate) {
            return Resolution::Internal(path);
        }
        if from.ends_with(".go") {
            return match self.lookup_go_package(&candidate) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::External,
            };
        }
        // Bare package names never match by suffix, and script modules
        // resolve bare specifiers through node_modules.
        if candidate.contains('/')
            && !is_script_module(from)
            && let Some(path) = self.lookup_suffix(&candidate)
        {
            return Resolution::Internal(path);
        }
        Resolution::External
    }

    fn lookup(&self, candidate: &str) -> Option<String> {
        let candidate = candidate.trim_end_matches('/');
        if self.modules.contains(candidate) {
            return Some(candidate.to_string());
        }
        if let Some(path) = self.by_stem.get(strip_extension(candidate)) {
            return Some(path.clone());
        }
        INDEX_STEMS.iter().find_map(|stem| {
            let index = if candidate.is_empty() {
                (*stem).to_string()
            } else {
                format!("{candidate}/{stem}")
            };
            self.by_stem.get(&index).cloned()
        })
    }

    /// Dotted or slashed module paths (`app.services.user`) whose tail is
    /// exactly one module stem or package index. Ambiguous tails do not resolve.
    fn lookup_suffix(&self, candidate: &str) -> Option<String> {
        let needles: Vec<String> = std::iter::once(format!("/{candidate}"))
            .chain(INDEX_STEMS.iter().map(|stem| format!("/{candidate}/{stem}")))
            .collect();
        let mut hits = self
            .by_stem
            .iter()
            .filter(|(stem, _)| needles.iter().any(|needle| stem.ends_with(needle.as_str())));
        match (hits.next(), hits.next()) {
            (Some((_, path)), None) => Some(path.clone()),
            _ => None,
        }
    }

    /// Go imports name a package directory, usually behind the module path
    /// (`github.com/acme/shop/internal/orders`). Longest matching directory wins.
    fn lookup_go_package(&self, candidate: &str) -> Option<String> {
        self.go_packages
            .iter()
            .filter(|(dir, _)| !dir.is_empty())
            .filter(|(dir, _)| {
                candidate == dir.as_str()
                    || candidate
                        .strip_suffix(dir.as_str())
                        .is_some_and(|head| head.ends_with('/'))
            })
            .max_by_key(|(dir, _)| dir.len())
            .map(|(_, path)| path.clone())
    }
}

/// JavaScript family: bare specifiers are packages.
fn is_script_module(path: &str) -> bool {
    matches!(
        path.rsplit_once('.').map(|(_, ext)| ext),
        Some("ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "mjs" | "cjs" | "vue" | "svelte")
    )
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with('.')
}

/// `.models` / `..core.db` relative to the importing module's package.
fn python_relative(from: &str, specifier: &str) -> Option<String> {
    let dots = specifier.chars().take_while(|c| *c == '.').count();
    let rest = &specifier[dots..];
    let mut base: Vec<&str> = parent_dir(from).split('/').filter(|s| !s.is_empty()).collect();
    for _ in 1..dots {
        base.pop()?;
    }
    let mut out = base.join("/");
    if !rest.is_empty() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&rest.replace('.', "/"));
    }
    Some(out)
}

fn join(dir: &str, specifier: &str) -> String {
    if dir.is_empty() {
        specifier.to_string()
    } else {
        format!("{dir}/{specifier}")
    }
}

/// Collapse `.` and `..` segments. Leading `..` past the root is dropped.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

/// `src/a.ts` → `src/a`; `src/a.test.ts` → `src/a.test`; directories untouched.
pub fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..file_start + dot],
    }
}
