//! Strongly connected components and shortest cycles.
//!
//! Runs single-threaded over the assembled graph.

use crate::graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One SCC of size > 1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cycle {
    /// Sorted members of the component.
    pub members: Vec<String>,
    /// Shortest closed walk through the component, first element repeated
    /// at the end.
    pub path: Vec<String>,
}

impl DependencyGraph {
    /// Every import cycle, one per strongly connected component.
    pub fn cycles(&self) -> Vec<Cycle> {
        let adj = self.adjacency();
        let mut out: Vec<Cycle> = strongly_connected(&adj)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|members| {
                let path = shortest_cycle(&adj, &members);
                Cycle {
                    members: members.into_iter().map(str::to_string).collect(),
                    path: path.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();
        out.sort();
        out
    }
}

/// Tarjan's algorithm. Components come back with sorted members.
pub fn strongly_connected<'a>(adj: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> Vec<Vec<&'a str>> {
    struct State<'a> {
        index: u32,
        stack: Vec<&'a str>,
        on_stack: BTreeSet<&'a str>,
        idx: BTreeMap<&'a str, u32>,
        low: BTreeMap<&'a str, u32>,
        out: Vec<Vec<&'a str>>,
    }

    fn strongconnect<'a>(
        v: &'a str,
        adj: &BTreeMap<&'a str, BTreeSet<&'a str>>,
        state: &mut State<'a>,
    ) {
        let v_idx = state.index;
        state.index += 1;
        state.idx.insert(v, v_idx);
        state.low.insert(v, v_idx);
        state.stack.push(v);
        state.on_stack.insert(v);

        if let Some(neigh) = adj.get(v) {
            for &w in neigh {
                if !state.idx.contains_key(w) {
                    strongconnect(w, adj, state);
                    let lw = *state.low.get(w).unwrap_or(&v_idx);
                    let lv = *state.low.get(v).unwrap_or(&v_idx);
                    state.low.insert(v, lv.min(lw));
                } else if state.on_stack.contains(w) {
                    let iw = *state.idx.get(w).unwrap_or(&v_idx);
                    let lv = *state.low.get(v).unwrap_or(&v_idx);
                    state.low.insert(v, lv.min(iw));
                }
            }
        }

        let lv = *state.low.get(v).unwrap_or(&v_idx);
        if lv == v_idx {
            let mut scc = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack.remove(w);
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort_unstable();
            state.out.push(scc);
        }
    }

    let mut state = State {
        index: 0,
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        idx: BTreeMap::new(),
        low: BTreeMap::new(),
        out: Vec::new(),
    };
    for &v in adj.keys() {
        if !state.idx.contains_key(v) {
            strongconnect(v, adj, &mut state);
        }
    }
    state.out
}

/// BFS from each member back to itself inside the component. Shortest wins,
/// ties go to the lexicographically smaller path.
fn shortest_cycle<'a>(adj: &BTreeMap<&'a str, BTreeSet<&'a str>>, members: &[&'a str]) -> Vec<&'a str> {
    let inside: BTreeSet<&str> = members.iter().copied().collect();
    let mut best: Option<Vec<&str>> = None;

    for &start in members {
        let mut parent: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue = VecDeque::from([start]);
        let mut closing: Option<&str> = None;
        'bfs: while let Some(v) = queue.pop_front() {
            for &w in adj.get(v).into_iter().flatten() {
                if !inside.contains(w) {
                    continue;
                }
                if w == start {
                    closing = Some(v);
                    break 'bfs;
                }
                if !parent.contains_key(w) {
                    parent.insert(w, v);
                    queue.push_back(w);
                }
            }
        }
        let Some(last) = closing else {
            continue;
        };

        let mut path = vec![last];
        let mut cursor = last;
        while cursor != start {
            let Some(&prev) = parent.get(cursor) else {
                break;
            };
            path.push(prev);
            cursor = prev;
        }
        path.reverse();
        path.push(start);

        let better = match &best {
            None => true,
            Some(current) => path.len() < current.len() || (path.len() == current.len() && path < *current),
        };
        if better {
            best = Some(path);
        }
    }
    best.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use crate::build;
    use stricture_kernel::{Import, ModuleIr, SourceLocation};
    use stricture_manifest::ArchitectureConfig;

    fn graph(edges: &[(&str, &str)]) -> crate::DependencyGraph {
        let mut modules: std::collections::BTreeMap<&str, ModuleIr> = Default::default();
        for (from, to) in edges {
            modules
                .entry(*to)
                .or_insert_with(|| ModuleIr::new(*to, "typescript"));
            let module = modules
                .entry(*from)
                .or_insert_with(|| ModuleIr::new(*from, "typescript"));
            let line = module.imports.len() as u32 + 1;
            module.imports.push(Import {
                source: format!("/{to}"),
                location: SourceLocation::new(*from, line, 1),
                ..Import::default()
            });
        }
        let modules: Vec<ModuleIr> = modules.into_values().collect();
        build(&modules, &ArchitectureConfig::default())
    }

    #[test]
    fn mutual_import_is_one_cycle() {
        let g = graph(&[
            ("src/service/order.ts", "src/service/user.ts"),
            ("src/service/user.ts", "src/service/order.ts"),
        ]);
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0].path,
            vec![
                "src/service/order.ts".to_string(),
                "src/service/user.ts".to_string(),
                "src/service/order.ts".to_string(),
            ]
        );
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&[("a.ts", "b.ts"), ("b.ts", "c.ts"), ("a.ts", "c.ts")]);
        assert!(g.cycles().is_empty());
    }

    #[test]
    fn shortest_path_is_reported_inside_large_component() {
        // a -> b -> c -> d -> a plus the shortcut c -> a.
        let g = graph(&[
            ("a.ts", "b.ts"),
            ("b.ts", "c.ts"),
            ("c.ts", "d.ts"),
            ("d.ts", "a.ts"),
            ("c.ts", "a.ts"),
        ]);
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members.len(), 4);
        assert_eq!(cycles[0].path, vec!["a.ts", "b.ts", "c.ts", "a.ts"]);
        for pair in cycles[0].path.windows(2) {
            assert!(g.edge_between(&pair[0], &pair[1]).is_some());
        }
    }

    #[test]
    fn separate_components_are_reported_separately() {
        let g = graph(&[
            ("a.ts", "b.ts"),
            ("b.ts", "a.ts"),
            ("x.ts", "y.ts"),
            ("y.ts", "x.ts"),
            ("b.ts", "x.ts"),
        ]);
        let members: Vec<_> = g.cycles().into_iter().map(|c| c.members).collect();
        assert_eq!(
            members,
            vec![
                vec!["a.ts".to_string(), "b.ts".to_string()],
                vec!["x.ts".to_string(), "y.ts".to_string()],
            ]
        );
    }
}
