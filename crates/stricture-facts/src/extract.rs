//! Per-module fact extraction.
//!
//! Each function body is lowered to a [`Cfg`], dominators are computed once,
//! and the call-site and value passes read from the shared [`FunctionScope`].
//! Nothing here looks at other modules or at the manifest.

use crate::calls;
use crate::cfg::Cfg;
use crate::dominators::Dominators;
use crate::registry::FallibleRegistry;
use crate::values;
use std::sync::OnceLock;
use stricture_kernel::{Fact, FunctionDecl, Guard, ModuleIr, Node, NodeKind, SourceLocation};
use tracing::trace;

/// Extractor bound to a fallible-call registry.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'r> {
    registry: &'r FallibleRegistry,
}

impl<'r> Extractor<'r> {
    pub fn new(registry: &'r FallibleRegistry) -> Self {
        Self { registry }
    }

    /// Facts for every function in `module`, ordered by location.
    pub fn extract(&self, module: &ModuleIr) -> Vec<Fact> {
        let mut facts = Vec::new();
        for function in &module.functions {
            let before = facts.len();
            self.extract_function(module, function, &mut facts);
            trace!(
                module = %module.path,
                function = %function.name,
                facts = facts.len() - before,
                "extracted function facts"
            );
        }
        facts.sort_by(|a, b| a.location().cmp(b.location()));
        facts
    }

    fn extract_function(&self, module: &ModuleIr, function: &FunctionDecl, out: &mut Vec<Fact>) {
        if function.body.is_empty() {
            return;
        }
        let cfg = Cfg::build(&function.body);
        let dominators = Dominators::compute(&cfg);
        let scope = FunctionScope {
            file: &module.path,
            function: &function.name,
            cfg,
            dominators,
            registry: self.registry,
        };
        calls::collect(&scope, out);
        values::collect(&scope, out);
    }
}

/// Extract with the built-in fallible-call registry.
pub fn extract(module: &ModuleIr) -> Vec<Fact> {
    static DEFAULT: OnceLock<FallibleRegistry> = OnceLock::new();
    Extractor::new(DEFAULT.get_or_init(FallibleRegistry::default)).extract(module)
}

/// Everything the passes need about one function.
pub(crate) struct FunctionScope<'f> {
    pub file: &'f str,
    pub function: &'f str,
    pub cfg: Cfg<'f>,
    pub dominators: Dominators,
    pub registry: &'f FallibleRegistry,
}

impl<'f> FunctionScope<'f> {
    /// Node location with the module path filled in when the front end left it out.
    pub fn location(&self, node: &Node) -> SourceLocation {
        let mut location = node.location.clone();
        if location.file.is_empty() {
            location.file = self.file.to_string();
        }
        location
    }

    /// Guard carried by a statement: conditional tests and loop conditions.
    pub fn guard_of(node: &Node) -> Option<&Guard> {
        match &node.kind {
            NodeKind::Conditional(cond) => Some(&cond.guard),
            NodeKind::Loop(lp) => lp.condition.as_ref(),
            _ => None,
        }
    }

    /// Some statement other than `target` satisfying `is_guard` dominates it.
    pub fn dominated_by(&self, target: usize, is_guard: impl Fn(usize, &Node) -> bool) -> bool {
        self.cfg.statements().any(|(id, node)| {
            id != target && is_guard(id, node) && self.dominators.dominates(id, target)
        })
    }

    /// Statements after `origin` (dominated by it) that satisfy `pred`.
    pub fn after(&self, origin: usize, pred: impl Fn(&Node) -> bool) -> Vec<(usize, &'f Node)> {
        self.cfg
            .statements()
            .filter(|(id, node)| {
                *id != origin
                    && self.dominators.is_reachable(*id)
                    && self.dominators.dominates(origin, *id)
                    && pred(node)
            })
            .collect()
    }
}
