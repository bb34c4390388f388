//! Language-neutral intermediate representation.
//!
//! Front ends lower one source file into one [`ModuleIr`]. The shape is the
//! same for every source language:
//!
//! ```text
//! ModuleIr            path, declared symbols, line counts, directives
//!   ├── Import        source specifier, symbols, dynamic/type-only/re-export
//!   └── FunctionDecl  name, parameters, async/test flags
//!         └── Node    Call | Conditional | TryCatch | Switch | PropertyAccess
//!                     | Assertion | FieldBinding | Loop | Exit | Break | Continue
//! ```
//!
//! Nodes nest (conditionals and loops own their branches), which is all the
//! fact extractor needs to rebuild a per-function control-flow graph. Every
//! node carries a [`SourceLocation`]. Nothing here is mutated after a front end
//! hands the module over.

use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleIr {
    /// Root-relative path with `/` separators. Front ends fill it in when
    /// the source leaves it out.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub declared_symbols: Vec<String>,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    /// Physical line count.
    #[serde(default)]
    pub line_count: u32,
    /// Non-blank, non-comment line count.
    #[serde(default)]
    pub code_lines: u32,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl ModuleIr {
    pub fn new(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    /// Stamp the module path onto every location that left `file` empty.
    pub fn with_locations_filled(mut self) -> Self {
        let file = self.path.clone();
        for import in &mut self.imports {
            fill_location(&mut import.location, &file);
        }
        for function in &mut self.functions {
            fill_location(&mut function.location, &file);
            fill_nodes(&mut function.body, &file);
        }
        self
    }

    pub fn declares(&self, symbol: &str) -> bool {
        self.declared_symbols.iter().any(|s| s == symbol)
    }

    /// Re-export statements, in declaration order.
    pub fn reexports(&self) -> impl Iterator<Item = &Import> {
        self.imports.iter().filter(|import| import.is_reexport)
    }
}

fn fill_location(location: &mut SourceLocation, file: &str) {
    if location.file.is_empty() {
        location.file = file.to_string();
    }
}

fn fill_nodes(nodes: &mut [Node], file: &str) {
    for node in nodes {
        fill_location(&mut node.location, file);
        match &mut node.kind {
            NodeKind::Conditional(cond) => {
                fill_nodes(&mut cond.then_branch, file);
                if let Some(else_branch) = &mut cond.else_branch {
                    fill_nodes(else_branch, file);
                }
            }
            NodeKind::TryCatch(tc) => {
                fill_nodes(&mut tc.body, file);
                if let Some(handler) = &mut tc.handler {
                    fill_nodes(handler, file);
                }
            }
            NodeKind::Switch(sw) => {
                for case in &mut sw.cases {
                    fill_nodes(&mut case.body, file);
                }
                if let Some(default) = &mut sw.default {
                    fill_nodes(default, file);
                }
            }
            NodeKind::Loop(lp) => fill_nodes(&mut lp.body, file),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Specifier as written (`./user`, `app.services.user`, `knex`).
    pub source: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub is_type_only: bool,
    /// `export { x } from "./y"` and friends.
    #[serde(default)]
    pub is_reexport: bool,
    pub location: SourceLocation,
}

impl Import {
    /// Whether this statement brings `symbol` in (wildcards match everything).
    pub fn covers(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == "*" || s == symbol)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// `None` when the source language leaves the parameter untyped.
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub body: Vec<Node>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub location: SourceLocation,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(location: SourceLocation, kind: NodeKind) -> Self {
        Self { location, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Call(CallExpr),
    Conditional(Conditional),
    TryCatch(TryCatch),
    Switch(SwitchStmt),
    PropertyAccess(PropertyAccess),
    Assertion(Assertion),
    FieldBinding(FieldBinding),
    Loop(LoopStmt),
    Exit(ExitStmt),
    Break,
    Continue,
}

/// Visit `nodes` depth-first in source order.
pub fn walk<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        match &node.kind {
            NodeKind::Conditional(cond) => {
                walk(&cond.then_branch, visit);
                if let Some(else_branch) = &cond.else_branch {
                    walk(else_branch, visit);
                }
            }
            NodeKind::TryCatch(tc) => {
                walk(&tc.body, visit);
                if let Some(handler) = &tc.handler {
                    walk(handler, visit);
                }
            }
            NodeKind::Switch(sw) => {
                for case in &sw.cases {
                    walk(&case.body, visit);
                }
                if let Some(default) = &sw.default {
                    walk(default, visit);
                }
            }
            NodeKind::Loop(lp) => walk(&lp.body, visit),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardKind {
    NullCheck,
    StatusCheck,
    ErrorCheck,
    /// `x == "a"` / `x in ("a", "b")`; compared literals go in `values`.
    Equality,
    RangeCheck,
    FormatCheck,
    /// ETag / version / If-Match comparison.
    VersionCheck,
    /// Plain truthiness test (`if (page.has_more)`).
    Truthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    pub kind: GuardKind,
    /// Tested expression, e.g. `res`, `res.status`, `order.shipping`.
    pub subject: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Guard {
    pub fn new(kind: GuardKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Status codes compared by a status check (`res.status === 404`).
    pub fn status_codes(&self) -> Vec<u16> {
        self.values
            .iter()
            .filter_map(|v| v.trim().parse::<u16>().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Read,
    Write,
    Atomic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub resource: String,
    /// The write carries its own precondition (If-Match header, version predicate).
    #[serde(default)]
    pub conditional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: String,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Symbols the result is assigned to (`res`, or `resp, err` in Go).
    #[serde(default)]
    pub binds: Vec<String>,
    /// Endpoint path literal, when visible at the call site.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Guards the language applies inline (`?`, `try?`, `must`).
    #[serde(default)]
    pub enclosing_guards: Vec<GuardKind>,
    #[serde(default)]
    pub effect: Option<Effect>,
}

impl CallExpr {
    pub fn new(callee: impl Into<String>) -> Self {
        Self {
            callee: callee.into(),
            ..Self::default()
        }
    }

    /// Receiver symbol, falling back to the callee's root (`res.json` → `res`).
    pub fn receiver_symbol(&self) -> Option<&str> {
        if let Some(receiver) = &self.receiver {
            return Some(expr::root(receiver));
        }
        let callee = self.callee.as_str();
        if callee.contains('.') {
            Some(expr::root(callee))
        } else {
            None
        }
    }

    /// Whether the call reads `symbol` as receiver or argument.
    pub fn uses(&self, symbol: &str) -> bool {
        self.receiver_symbol() == Some(symbol)
            || self.arguments.iter().any(|arg| expr::mentions(arg, symbol))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub guard: Guard,
    #[serde(default)]
    pub then_branch: Vec<Node>,
    #[serde(default)]
    pub else_branch: Option<Vec<Node>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TryCatch {
    #[serde(default)]
    pub body: Vec<Node>,
    #[serde(default)]
    pub handler: Option<Vec<Node>>,
}

impl TryCatch {
    /// A handler exists and does something.
    pub fn has_handler(&self) -> bool {
        self.handler.as_ref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub labels: Vec<String>,
    #[serde(default)]
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub discriminant: String,
    /// Type owning the discriminant field, when known.
    #[serde(default)]
    pub owner_type: Option<String>,
    #[serde(default)]
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default: Option<Vec<Node>>,
}

impl SwitchStmt {
    pub fn covered_labels(&self) -> impl Iterator<Item = &str> {
        self.cases
            .iter()
            .flat_map(|case| case.labels.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAccess {
    /// Expression being dereferenced (`order.shipping` in `order.shipping.city`).
    pub base: String,
    pub property: String,
    #[serde(default)]
    pub optional_chain: bool,
    /// Type declaring the last field of `base`, when known.
    #[serde(default)]
    pub owner_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionKind {
    ExistenceOnly,
    TypeofOnly,
    ValueEquality,
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub subject: String,
    #[serde(default)]
    pub subject_type: Option<String>,
    pub kind: AssertionKind,
    /// Fields the assertion pins down; empty with `value-equality` means the
    /// whole value is compared.
    #[serde(default)]
    pub asserted_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub symbol: String,
    /// Manifest field name receiving the value.
    pub field: String,
    #[serde(default)]
    pub owner_type: Option<String>,
    #[serde(default)]
    pub literal: Option<Literal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStmt {
    #[serde(default)]
    pub condition: Option<Guard>,
    #[serde(default)]
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitStmt {
    pub value: Option<String>,
    pub throws: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    Disable,
    Enable,
    DisableNextLine,
    DisableFile,
}

/// Inline suppression comment. An empty rule list means every rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub line: u32,
    pub kind: DirectiveKind,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Helpers over dotted expression strings.
pub mod expr {
    /// Strip optional-chaining and non-null markers: `a?.b!.c` → `a.b.c`.
    pub fn normalize(expr: &str) -> String {
        expr.trim().replace("?.", ".").replace("!.", ".")
    }

    /// Leading identifier of an expression.
    pub fn root(expr: &str) -> &str {
        let expr = expr.trim();
        let end = expr
            .find(|c: char| matches!(c, '.' | '?' | '[' | '(' | '!'))
            .unwrap_or(expr.len());
        &expr[..end]
    }

    /// Trailing field name of an expression.
    pub fn last_segment(expr: &str) -> String {
        let normalized = normalize(expr);
        normalized
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .trim_end_matches("()")
            .to_string()
    }

    /// `expr` is `symbol` or a member path rooted at it.
    pub fn mentions(expr: &str, symbol: &str) -> bool {
        if symbol.is_empty() {
            return false;
        }
        let normalized = normalize(expr);
        normalized == symbol
            || normalized
                .strip_prefix(symbol)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
    }

    /// Same expression once optional-chaining syntax is ignored.
    pub fn same(a: &str, b: &str) -> bool {
        normalize(a) == normalize(b)
    }

    /// Case label as written minus quotes and qualifiers:
    /// `"paid"` → `paid`, `Status.PAID` → `PAID`, `Kind::Refunded` → `Refunded`.
    pub fn label(raw: &str) -> String {
        let trimmed = raw.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`'));
        if trimmed.parse::<f64>().is_ok() {
            return trimmed.to_string();
        }
        trimmed
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(trimmed)
            .to_string()
    }

    /// Comparison key that ignores case and word separators, so
    /// `partially_paid`, `PARTIALLY_PAID` and `PartiallyPaid` agree.
    pub fn label_key(raw: &str) -> String {
        label(raw)
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}
