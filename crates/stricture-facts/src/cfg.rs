//! Per-function control-flow graph over IR statements.
//!
//! One graph node per IR node plus synthetic entry and exit. Conditionals
//! branch, loops get a back edge to their header, every statement of a try
//! body may jump to its handler, and `Exit`/`Break`/`Continue` jump to the
//! obvious places. Nodes keep the loop headers that enclose them and whether
//! a try with a handler protects them.

use stricture_kernel::{Node, NodeKind};

pub const ENTRY: usize = 0;
pub const EXIT: usize = 1;

#[derive(Debug, Clone)]
pub struct CfgNode<'f> {
    /// `None` for entry and exit.
    pub node: Option<&'f Node>,
    /// Enclosing loop headers, outermost first.
    pub loops: Vec<usize>,
    /// Inside the body of a try whose handler is non-empty.
    pub protected: bool,
}

#[derive(Debug, Clone)]
pub struct Cfg<'f> {
    nodes: Vec<CfgNode<'f>>,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl<'f> Cfg<'f> {
    pub fn build(body: &'f [Node]) -> Self {
        let mut builder = Builder {
            cfg: Cfg {
                nodes: vec![
                    CfgNode {
                        node: None,
                        loops: Vec::new(),
                        protected: false,
                    },
                    CfgNode {
                        node: None,
                        loops: Vec::new(),
                        protected: false,
                    },
                ],
                succ: vec![Vec::new(), Vec::new()],
                pred: vec![Vec::new(), Vec::new()],
            },
            loops: Vec::new(),
            jumps: Vec::new(),
            protected: 0,
        };
        let frontier = builder.block(body, vec![ENTRY]);
        for from in frontier {
            builder.cfg.edge(from, EXIT);
        }
        builder.cfg
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    pub fn node(&self, id: usize) -> &CfgNode<'f> {
        &self.nodes[id]
    }

    /// Statement nodes in source (construction) order.
    pub fn statements(&self) -> impl Iterator<Item = (usize, &'f Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.node.map(|node| (id, node)))
    }

    pub fn successors(&self, id: usize) -> &[usize] {
        &self.succ[id]
    }

    pub fn predecessors(&self, id: usize) -> &[usize] {
        &self.pred[id]
    }

    /// Statement ids nested under loop header `header`.
    pub fn loop_body(&self, header: usize) -> impl Iterator<Item = (usize, &'f Node)> + '_ {
        self.statements()
            .filter(move |(id, _)| self.nodes[*id].loops.contains(&header))
    }

    fn add(&mut self, node: &'f Node, loops: &[usize], protected: bool) -> usize {
        let id = self.nodes.len();
        self.nodes.push(CfgNode {
            node: Some(node),
            loops: loops.to_vec(),
            protected,
        });
        self.succ.push(Vec::new());
        self.pred.push(Vec::new());
        id
    }

    fn edge(&mut self, from: usize, to: usize) {
        if !self.succ[from].contains(&to) {
            self.succ[from].push(to);
            self.pred[to].push(from);
        }
    }
}

enum JumpScope {
    Loop {
        header: usize,
        breaks: Vec<usize>,
    },
    Switch {
        breaks: Vec<usize>,
    },
}

struct Builder<'f> {
    cfg: Cfg<'f>,
    loops: Vec<usize>,
    jumps: Vec<JumpScope>,
    /// Depth of enclosing try bodies with a handler.
    protected: usize,
}

impl<'f> Builder<'f> {
    /// Lower a block; returns the nodes that fall through to whatever follows.
    fn block(&mut self, nodes: &'f [Node], mut preds: Vec<usize>) -> Vec<usize> {
        for node in nodes {
            preds = self.statement(node, preds);
        }
        preds
    }

    fn statement(&mut self, node: &'f Node, preds: Vec<usize>) -> Vec<usize> {
        let id = self.cfg.add(node, &self.loops, self.protected > 0);
        for pred in preds {
            self.cfg.edge(pred, id);
        }

        match &node.kind {
            NodeKind::Conditional(cond) => {
                let mut out = self.block(&cond.then_branch, vec![id]);
                match &cond.else_branch {
                    Some(else_branch) => out.extend(self.block(else_branch, vec![id])),
                    None => out.push(id),
                }
                out
            }
            NodeKind::TryCatch(tc) => {
                let has_handler = tc.has_handler();
                let body_start = self.cfg.len();
                if has_handler {
                    self.protected += 1;
                }
                let mut out = self.block(&tc.body, vec![id]);
                if has_handler {
                    self.protected -= 1;
                }
                let body_end = self.cfg.len();
                if let Some(handler) = tc.handler.as_deref()
                    && !handler.is_empty()
                {
                    let mut handler_preds = vec![id];
                    handler_preds.extend(body_start..body_end);
                    out.extend(self.block(handler, handler_preds));
                }
                out
            }
            NodeKind::Switch(sw) => {
                self.jumps.push(JumpScope::Switch { breaks: Vec::new() });
                let mut out = Vec::new();
                for case in &sw.cases {
                    out.extend(self.block(&case.body, vec![id]));
                }
                match &sw.default {
                    Some(default) => out.extend(self.block(default, vec![id])),
                    None => out.push(id),
                }
                if let Some(JumpScope::Switch { breaks }) = self.jumps.pop() {
                    out.extend(breaks);
                }
                out
            }
            NodeKind::Loop(lp) => {
                self.loops.push(id);
                self.jumps.push(JumpScope::Loop {
                    header: id,
                    breaks: Vec::new(),
                });
                let body_out = self.block(&lp.body, vec![id]);
                for from in body_out {
                    self.cfg.edge(from, id);
                }
                self.loops.pop();
                let mut out = vec![id];
                if let Some(JumpScope::Loop { breaks, .. }) = self.jumps.pop() {
                    out.extend(breaks);
                }
                out
            }
            NodeKind::Exit(_) => {
                self.cfg.edge(id, EXIT);
                Vec::new()
            }
            NodeKind::Break => {
                match self.jumps.last_mut() {
                    Some(JumpScope::Loop { breaks, .. }) | Some(JumpScope::Switch { breaks }) => {
                        breaks.push(id)
                    }
                    None => self.cfg.edge(id, EXIT),
                }
                Vec::new()
            }
            NodeKind::Continue => {
                let header = self.jumps.iter().rev().find_map(|scope| match scope {
                    JumpScope::Loop { header, .. } => Some(*header),
                    JumpScope::Switch { .. } => None,
                });
                match header {
                    Some(header) => self.cfg.edge(id, header),
                    None => self.cfg.edge(id, EXIT),
                }
                Vec::new()
            }
            NodeKind::Call(_)
            | NodeKind::PropertyAccess(_)
            | NodeKind::Assertion(_)
            | NodeKind::FieldBinding(_) => vec![id],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stricture_kernel::{
        CallExpr, Conditional, Guard, GuardKind, LoopStmt, SourceLocation, TryCatch,
    };

    fn call(line: u32, callee: &str) -> Node {
        Node::new(
            SourceLocation::new("a.ts", line, 1),
            NodeKind::Call(CallExpr::new(callee)),
        )
    }

    #[test]
    fn conditional_without_else_falls_through_from_guard() {
        let body = vec![
            call(1, "a"),
            Node::new(
                SourceLocation::new("a.ts", 2, 1),
                NodeKind::Conditional(Conditional {
                    guard: Guard::new(GuardKind::NullCheck, "x"),
                    then_branch: vec![call(3, "b")],
                    else_branch: None,
                }),
            ),
            call(4, "c"),
        ];
        let cfg = Cfg::build(&body);
        // entry, exit, a, cond, b, c
        assert_eq!(cfg.len(), 6);
        assert_eq!(cfg.successors(ENTRY), &[2]);
        assert_eq!(cfg.successors(3), &[4, 5]);
        assert_eq!(cfg.predecessors(5), &[4, 3]);
        assert_eq!(cfg.successors(5), &[EXIT]);
    }

    #[test]
    fn loop_has_back_edge_and_break_exits() {
        let body = vec![Node::new(
            SourceLocation::new("a.ts", 1, 1),
            NodeKind::Loop(LoopStmt {
                condition: None,
                body: vec![
                    call(2, "fetch"),
                    Node::new(SourceLocation::new("a.ts", 3, 1), NodeKind::Break),
                ],
            }),
        )];
        let cfg = Cfg::build(&body);
        // entry, exit, loop(2), fetch(3), break(4)
        assert_eq!(cfg.node(3).loops, vec![2]);
        assert_eq!(cfg.successors(4), &[EXIT]);
        assert!(cfg.predecessors(EXIT).contains(&4));
        assert!(cfg.predecessors(EXIT).contains(&2));
    }

    #[test]
    fn try_body_nodes_reach_handler_and_are_protected() {
        let body = vec![Node::new(
            SourceLocation::new("a.ts", 1, 1),
            NodeKind::TryCatch(TryCatch {
                body: vec![call(2, "fetch"), call(3, "res.json")],
                handler: Some(vec![call(5, "log")]),
            }),
        )];
        let cfg = Cfg::build(&body);
        // entry, exit, try(2), fetch(3), json(4), log(5)
        assert!(cfg.node(3).protected);
        assert!(cfg.node(4).protected);
        assert!(!cfg.node(5).protected);
        assert_eq!(cfg.predecessors(5), &[2, 3, 4]);
    }
}
