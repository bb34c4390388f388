//! Dominator tree (Cooper, Harvey and Kennedy's iterative algorithm).

use crate::cfg::{Cfg, ENTRY};

#[derive(Debug, Clone)]
pub struct Dominators {
    /// Immediate dominator per node; `None` for entry and unreachable nodes.
    idom: Vec<Option<usize>>,
    reachable: Vec<bool>,
}

impl Dominators {
    pub fn compute(cfg: &Cfg<'_>) -> Self {
        let n = cfg.len();
        let order = reverse_postorder(cfg);
        let mut rpo_index = vec![usize::MAX; n];
        for (i, &node) in order.iter().enumerate() {
            rpo_index[node] = i;
        }

        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[ENTRY] = Some(ENTRY);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in order.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &p in cfg.predecessors(b) {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(current) => intersect(&idom, &rpo_index, p, current),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }

        let reachable = (0..n).map(|id| rpo_index[id] != usize::MAX).collect();
        idom[ENTRY] = None;
        Self { idom, reachable }
    }

    pub fn is_reachable(&self, id: usize) -> bool {
        self.reachable.get(id).copied().unwrap_or(false)
    }

    pub fn immediate(&self, id: usize) -> Option<usize> {
        self.idom.get(id).copied().flatten()
    }

    /// `a` dominates `b` (reflexive). Unreachable `b` is vacuously dominated.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(b) {
            return true;
        }
        let mut cursor = b;
        loop {
            if cursor == a {
                return true;
            }
            match self.immediate(cursor) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
    }

    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }
}

fn intersect(idom: &[Option<usize>], rpo: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo[a] > rpo[b] {
            match idom[a] {
                Some(next) => a = next,
                None => return b,
            }
        }
        while rpo[b] > rpo[a] {
            match idom[b] {
                Some(next) => b = next,
                None => return a,
            }
        }
    }
    a
}

fn reverse_postorder(cfg: &Cfg<'_>) -> Vec<usize> {
    let mut visited = vec![false; cfg.len()];
    let mut post = Vec::with_capacity(cfg.len());
    // Iterative DFS: (node, next successor index).
    let mut stack = vec![(ENTRY, 0usize)];
    visited[ENTRY] = true;
    while let Some((node, next)) = stack.last_mut() {
        let succ = cfg.successors(*node);
        if *next < succ.len() {
            let child = succ[*next];
            *next += 1;
            if !visited[child] {
                visited[child] = true;
                stack.push((child, 0));
            }
        } else {
            post.push(*node);
            stack.pop();
        }
    }
    post.reverse();
    post
}
