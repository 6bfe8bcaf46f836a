//! Generic DAG algorithms for workflow orchestration
//!
//! Operates on any graph described abstractly by a list of node IDs plus a
//! successor function `ID -> Vec<ID>`. Callers (the job scheduler, and
//! potentially step-level sub-graphs in the future) supply their own node
//! type and adjacency; this crate owns only the graph theory: cycle
//! detection, topological sort, roots/leaves, and ancestor/descendant
//! walks. All operations are O(V+E).

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use tracing::debug;

/// Errors produced by the generic DAG algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagError<ID> {
    CycleDetected(Vec<ID>),
}

impl<ID: std::fmt::Display> std::fmt::Display for DagError<ID> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DagError::CycleDetected(cycle) => {
                let path = cycle
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                write!(f, "cycle detected: {path}")
            }
        }
    }
}

impl<ID: std::fmt::Debug + std::fmt::Display> std::error::Error for DagError<ID> {}

/// Returns true if any node is reachable from itself via `succ+`.
pub fn has_cycle<ID, F, I>(all_ids: &[ID], succ: F) -> bool
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    detect_cycle(all_ids, succ).is_some()
}

/// DFS-based cycle detection with a recursion-stack set. Returns the cycle
/// path rotated to start at the first re-entered node, in traversal order,
/// or `None` if the graph is acyclic. Deterministic given `all_ids` order.
pub fn detect_cycle<ID, F, I>(all_ids: &[ID], succ: F) -> Option<Vec<ID>>
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        InStack,
        Done,
    }

    let mut marks: HashMap<ID, Mark> = HashMap::new();
    let mut stack_path: Vec<ID> = Vec::new();

    fn visit<ID, F, I>(
        node: &ID,
        succ: &F,
        marks: &mut HashMap<ID, Mark>,
        stack_path: &mut Vec<ID>,
    ) -> Option<Vec<ID>>
    where
        ID: Clone + Eq + Hash,
        F: Fn(&ID) -> I,
        I: IntoIterator<Item = ID>,
    {
        if let Some(Mark::Done) = marks.get(node) {
            return None;
        }
        if let Some(Mark::InStack) = marks.get(node) {
            // Rotate stack_path to start at `node`.
            let pos = stack_path.iter().position(|n| n == node).unwrap_or(0);
            let mut cycle: Vec<ID> = stack_path[pos..].to_vec();
            cycle.push(node.clone());
            return Some(cycle);
        }

        marks.insert(node.clone(), Mark::InStack);
        stack_path.push(node.clone());

        for next in succ(node) {
            if let Some(cycle) = visit(&next, succ, marks, stack_path) {
                return Some(cycle);
            }
        }

        stack_path.pop();
        marks.insert(node.clone(), Mark::Done);
        None
    }

    for id in all_ids {
        if marks.contains_key(id) {
            continue;
        }
        if let Some(cycle) = visit(id, &succ, &mut marks, &mut stack_path) {
            return Some(cycle);
        }
    }

    None
}

/// Kahn's algorithm over reversed edges (predecessor counts). Nodes with
/// in-degree zero are queued in their `all_ids` input order; ties among
/// siblings are broken input-order stable. Fails with `CycleDetected` if
/// any node remains unqueued once the frontier drains.
pub fn topological_sort<ID, F, I>(all_ids: &[ID], succ: F) -> Result<Vec<ID>, DagError<ID>>
where
    ID: Clone + Eq + Hash + std::fmt::Display,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    let known: HashSet<ID> = all_ids.iter().cloned().collect();

    // in_degree[v] counts edges u -> v for u, v both known nodes.
    let mut in_degree: HashMap<ID, usize> = all_ids.iter().cloned().map(|id| (id, 0)).collect();
    for id in all_ids {
        for next in succ(id) {
            if known.contains(&next) {
                *in_degree.get_mut(&next).unwrap() += 1;
            }
        }
    }

    let mut queue: VecDeque<ID> = VecDeque::new();
    for id in all_ids {
        if in_degree[id] == 0 {
            queue.push_back(id.clone());
        }
    }

    let mut order = Vec::with_capacity(all_ids.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        for next in succ(&id) {
            if let Some(deg) = in_degree.get_mut(&next) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if order.len() != all_ids.len() {
        let cycle = detect_cycle(all_ids, succ)
            .unwrap_or_else(|| all_ids.iter().cloned().filter(|id| !order.contains(id)).collect());
        return Err(DagError::CycleDetected(cycle));
    }

    debug!(nodes = order.len(), "topological sort complete");
    Ok(order)
}

/// Nodes with no predecessors, in `all_ids` input order.
pub fn find_roots<ID, F, I>(all_ids: &[ID], succ: F) -> Vec<ID>
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    let known: HashSet<ID> = all_ids.iter().cloned().collect();
    let mut has_predecessor: HashSet<ID> = HashSet::new();
    for id in all_ids {
        for next in succ(id) {
            if known.contains(&next) {
                has_predecessor.insert(next);
            }
        }
    }
    all_ids
        .iter()
        .filter(|id| !has_predecessor.contains(*id))
        .cloned()
        .collect()
}

/// Nodes with no successors, in `all_ids` input order.
pub fn find_leaves<ID, F, I>(all_ids: &[ID], succ: F) -> Vec<ID>
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    all_ids
        .iter()
        .filter(|id| succ(id).into_iter().next().is_none())
        .cloned()
        .collect()
}

/// Nodes reachable from `start` following `succ`, excluding `start` itself.
pub fn descendants<ID, F, I>(start: &ID, succ: F) -> Vec<ID>
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    let mut visited: HashSet<ID> = HashSet::new();
    let mut queue: VecDeque<ID> = VecDeque::new();
    queue.push_back(start.clone());
    visited.insert(start.clone());

    let mut result = Vec::new();
    while let Some(node) = queue.pop_front() {
        for next in succ(&node) {
            if visited.insert(next.clone()) {
                result.push(next.clone());
                queue.push_back(next);
            }
        }
    }
    result
}

/// Nodes that reach `start` via `succ` (i.e. descendants in the reversed
/// graph), excluding `start` itself. `all_ids` is needed because the
/// reversed adjacency can't be derived from `succ` alone.
pub fn ancestors<ID, F, I>(start: &ID, all_ids: &[ID], succ: F) -> Vec<ID>
where
    ID: Clone + Eq + Hash,
    F: Fn(&ID) -> I,
    I: IntoIterator<Item = ID>,
{
    let mut predecessors: HashMap<ID, Vec<ID>> = HashMap::new();
    for id in all_ids {
        for next in succ(id) {
            predecessors.entry(next).or_default().push(id.clone());
        }
    }

    let mut visited: HashSet<ID> = HashSet::new();
    let mut queue: VecDeque<ID> = VecDeque::new();
    queue.push_back(start.clone());
    visited.insert(start.clone());

    let mut result = Vec::new();
    while let Some(node) = queue.pop_front() {
        if let Some(preds) = predecessors.get(&node) {
            for p in preds {
                if visited.insert(p.clone()) {
                    result.push(p.clone());
                    queue.push_back(p.clone());
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn graph(edges: &[(&str, &str)]) -> (Vec<String>, Map<String, Vec<String>>) {
        let mut adj: Map<String, Vec<String>> = Map::new();
        let mut ids: Vec<String> = Vec::new();
        for (u, v) in edges {
            if !ids.contains(&u.to_string()) {
                ids.push(u.to_string());
            }
            if !ids.contains(&v.to_string()) {
                ids.push(v.to_string());
            }
            adj.entry(u.to_string()).or_default().push(v.to_string());
        }
        (ids, adj)
    }

    fn succ_fn(adj: &Map<String, Vec<String>>) -> impl Fn(&String) -> Vec<String> + '_ {
        move |id: &String| adj.get(id).cloned().unwrap_or_default()
    }

    #[test]
    fn acyclic_has_no_cycle() {
        let (ids, adj) = graph(&[("a", "b"), ("b", "c")]);
        assert!(!has_cycle(&ids, succ_fn(&adj)));
    }

    #[test]
    fn simple_cycle_detected() {
        let (ids, adj) = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(has_cycle(&ids, succ_fn(&adj)));
        let cycle = detect_cycle(&ids, succ_fn(&adj)).unwrap();
        // cycle path is rotated to start at the first re-entered node and closes the loop
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        let ids: Vec<String> = vec![];
        assert!(!has_cycle(&ids, |_: &String| Vec::<String>::new()));
    }

    #[test]
    fn topo_sort_respects_edges() {
        let (ids, adj) = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        let order = topological_sort(&ids, succ_fn(&adj)).unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn topo_sort_fails_on_cycle() {
        let (ids, adj) = graph(&[("a", "b"), ("b", "a")]);
        let result = topological_sort(&ids, succ_fn(&adj));
        assert!(matches!(result, Err(DagError::CycleDetected(_))));
    }

    #[test]
    fn roots_and_leaves() {
        let (ids, adj) = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        assert_eq!(find_roots(&ids, succ_fn(&adj)), vec!["a".to_string()]);
        assert_eq!(find_leaves(&ids, succ_fn(&adj)), vec!["d".to_string()]);
    }

    #[test]
    fn descendants_and_ancestors_exclude_start() {
        let (ids, adj) = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        let mut desc = descendants(&"a".to_string(), succ_fn(&adj));
        desc.sort();
        assert_eq!(desc, vec!["b".to_string(), "c".to_string(), "d".to_string()]);

        let mut anc = ancestors(&"d".to_string(), &ids, succ_fn(&adj));
        anc.sort();
        assert_eq!(anc, vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        assert!(!descendants(&"d".to_string(), succ_fn(&adj)).contains(&"d".to_string()));
    }

    #[test]
    fn unknown_successor_ids_are_tolerated() {
        let mut adj: Map<String, Vec<String>> = Map::new();
        adj.insert("a".to_string(), vec!["ghost".to_string()]);
        let ids = vec!["a".to_string()];
        // "ghost" is not in all_ids; topo sort should still succeed treating it as missing.
        let order = topological_sort(&ids, succ_fn(&adj)).unwrap();
        assert_eq!(order, vec!["a".to_string()]);
    }
}
