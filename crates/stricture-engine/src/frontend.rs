//! Front-end dispatch.
//!
//! A front end lowers one source file into a [`ModuleIr`]. Language parsers
//! live outside this workspace; the built-in [`IrJsonFrontEnd`] reads IR that
//! an external parser has already serialized next to the sources
//! (`src/orders.ts.ir.json` describes `src/orders.ts`).

use stricture_kernel::{ModuleIr, ParseError};

pub trait FrontEnd: Send + Sync {
    /// Language id stamped on modules this front end produces.
    fn language(&self) -> &str;

    /// Module path for a file this front end accepts, `None` otherwise.
    fn module_path(&self, file: &str) -> Option<String>;

    /// Lower `source`, read from `file`, into IR for `module_path`.
    fn parse(&self, file: &str, module_path: &str, source: &str) -> Result<ModuleIr, ParseError>;
}

const IR_SUFFIX: &str = ".ir.json";

/// Pre-lowered IR serialized as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct IrJsonFrontEnd;

impl FrontEnd for IrJsonFrontEnd {
    fn language(&self) -> &str {
        "ir-json"
    }

    fn module_path(&self, file: &str) -> Option<String> {
        let stem = file.strip_suffix(IR_SUFFIX)?;
        (!stem.is_empty() && !stem.ends_with('/')).then(|| stem.to_string())
    }

    fn parse(&self, file: &str, module_path: &str, source: &str) -> Result<ModuleIr, ParseError> {
        let mut module: ModuleIr =
            serde_json::from_str(source).map_err(|source| ParseError::Malformed {
                path: file.to_string(),
                message: source.to_string(),
            })?;
        if module.path.is_empty() {
            module.path = module_path.to_string();
        } else if module.path != module_path {
            return Err(ParseError::PathMismatch {
                path: file.to_string(),
                declared: module.path,
            });
        }
        if module.language.is_empty() {
            module.language = language_of(module_path).to_string();
        }
        if module.line_count == 0 {
            module.line_count = last_line(&module);
        }
        Ok(module.with_locations_filled())
    }
}

/// Language id guessed from the described file's extension.
fn language_of(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("ts" | "tsx" | "mts" | "cts") => "typescript",
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("py") => "python",
        Some("go") => "go",
        Some("rs") => "rust",
        Some("java") => "java",
        _ => "unknown",
    }
}

/// Highest line any node or import mentions.
fn last_line(module: &ModuleIr) -> u32 {
    let mut max = module
        .imports
        .iter()
        .map(|import| import.location.line)
        .max()
        .unwrap_or(0);
    for function in &module.functions {
        max = max.max(function.location.line);
        stricture_kernel::ir::walk(&function.body, &mut |node| {
            max = max.max(node.location.line);
        });
    }
    max
}

/// Ordered front ends; the first that accepts a file parses it.
pub struct FrontEndRegistry {
    front_ends: Vec<Box<dyn FrontEnd>>,
}

impl FrontEndRegistry {
    pub fn empty() -> Self {
        Self {
            front_ends: Vec::new(),
        }
    }

    /// Front ends registered later take precedence.
    pub fn register(&mut self, front_end: Box<dyn FrontEnd>) -> &mut Self {
        self.front_ends.insert(0, front_end);
        self
    }

    /// Front end and module path for `file`.
    pub fn resolve(&self, file: &str) -> Option<(&dyn FrontEnd, String)> {
        self.front_ends.iter().find_map(|front_end| {
            front_end
                .module_path(file)
                .map(|module_path| (front_end.as_ref(), module_path))
        })
    }

    pub fn languages(&self) -> Vec<&str> {
        self.front_ends.iter().map(|f| f.language()).collect()
    }
}

impl Default for FrontEndRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(IrJsonFrontEnd));
        registry
    }
}

impl std::fmt::Debug for FrontEndRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontEndRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_files_map_to_described_module() {
        let registry = FrontEndRegistry::default();
        let (front_end, module_path) = registry
            .resolve("src/orders.ts.ir.json")
            .expect("ir file is accepted");
        assert_eq!(front_end.language(), "ir-json");
        assert_eq!(module_path, "src/orders.ts");
        assert!(registry.resolve("src/orders.ts").is_none());
        assert!(registry.resolve("src/.ir.json").is_none());
    }

    #[test]
    fn parse_fills_path_language_and_locations() {
        let source = r#"{
            "imports": [{ "source": "./user", "location": { "line": 3 } }],
            "functions": [{
                "name": "load",
                "location": { "line": 5 },
                "body": [{ "node": "call", "callee": "fetch", "location": { "line": 9 } }]
            }]
        }"#;
        let module = IrJsonFrontEnd
            .parse("src/orders.ts.ir.json", "src/orders.ts", source)
            .expect("valid ir");
        assert_eq!(module.path, "src/orders.ts");
        assert_eq!(module.language, "typescript");
        assert_eq!(module.line_count, 9);
        assert_eq!(module.imports[0].location.file, "src/orders.ts");
        assert_eq!(module.functions[0].body[0].location.file, "src/orders.ts");
    }

    #[test]
    fn module_without_declared_path_takes_the_file_path() {
        let source = include_str!("../tests/fixtures/shop/src/repositories/orders.ts.ir.json");
        let module = IrJsonFrontEnd
            .parse(
                "src/repositories/orders.ts.ir.json",
                "src/repositories/orders.ts",
                source,
            )
            .expect("path is optional");
        assert_eq!(module.path, "src/repositories/orders.ts");
        assert_eq!(module.imports[0].source, "../services/orders");
        assert_eq!(module.imports[0].location.file, "src/repositories/orders.ts");
        assert_eq!(module.line_count, 12);
    }

    #[test]
    fn malformed_and_mismatched_ir_are_parse_errors() {
        let err = IrJsonFrontEnd
            .parse("src/a.ts.ir.json", "src/a.ts", "{ not json")
            .expect_err("malformed");
        assert!(matches!(err, ParseError::Malformed { .. }));

        let err = IrJsonFrontEnd
            .parse("src/a.ts.ir.json", "src/a.ts", r#"{ "path": "src/b.ts" }"#)
            .expect_err("mismatch");
        assert_eq!(err.to_string(), "IR in src/a.ts.ir.json declares module path 'src/b.ts'");
    }
}
