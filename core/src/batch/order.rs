//! file: core/src/batch/order.rs
//! description: dependency ordering of the programs in a batch.
//!
//! Cycles are found with a depth-first walk over the module dependency
//! graph. Programs on a cycle, and programs depending on one, are set aside
//! with the cycle they hit; the rest are grouped into levels where every
//! program only depends on programs of earlier levels.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOrder {
    /// Programs grouped so each level depends only on earlier ones.
    pub levels: Vec<Vec<String>>,
    /// Programs that cannot be built, with the cycle responsible.
    pub blocked: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unseen,
    Visiting,
    Done,
}

/// Orders `graph` (program -> programs it depends on). Dependencies on keys
/// outside the graph are ignored here; they surface as unresolved actions.
pub fn build_order(graph: &BTreeMap<String, BTreeSet<String>>) -> BuildOrder {
    let edges: BTreeMap<&str, Vec<&str>> = graph
        .iter()
        .map(|(k, deps)| {
            let deps = deps.iter().map(String::as_str).filter(|d| graph.contains_key(*d)).collect();
            (k.as_str(), deps)
        })
        .collect();

    let mut state: BTreeMap<&str, VisitState> = edges.keys().map(|k| (*k, VisitState::Unseen)).collect();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    fn dfs<'g>(
        node: &'g str,
        edges: &BTreeMap<&'g str, Vec<&'g str>>,
        state: &mut BTreeMap<&'g str, VisitState>,
        stack: &mut Vec<&'g str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        state.insert(node, VisitState::Visiting);
        stack.push(node);
        for next in edges.get(node).into_iter().flatten() {
            match state.get(next).copied().unwrap_or(VisitState::Unseen) {
                VisitState::Unseen => dfs(*next, edges, state, stack, cycles),
                VisitState::Visiting => {
                    if let Some(pos) = stack.iter().position(|s| s == next) {
                        let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
                        cycle.push(next.to_string());
                        cycles.push(cycle);
                    }
                }
                VisitState::Done => {}
            }
        }
        stack.pop();
        state.insert(node, VisitState::Done);
    }

    let keys: Vec<&str> = edges.keys().copied().collect();
    for key in keys {
        if state.get(key) == Some(&VisitState::Unseen) {
            dfs(key, &edges, &mut state, &mut stack, &mut cycles);
        }
    }

    let mut order = BuildOrder::default();
    for cycle in &cycles {
        for member in cycle {
            order.blocked.entry(member.clone()).or_insert_with(|| cycle.clone());
        }
    }
    // dependants of a blocked program inherit its cycle
    loop {
        let mut changed = false;
        for (key, deps) in &edges {
            if order.blocked.contains_key(*key) {
                continue;
            }
            if let Some(cycle) = deps.iter().find_map(|d| order.blocked.get(*d).cloned()) {
                order.blocked.insert(key.to_string(), cycle);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut remaining: Vec<&str> = edges.keys().copied().filter(|k| !order.blocked.contains_key(*k)).collect();
    while !remaining.is_empty() {
        let (ready, waiting): (Vec<&str>, Vec<&str>) = remaining
            .iter()
            .copied()
            .partition(|k| edges.get(*k).into_iter().flatten().all(|d| placed.contains(d)));
        if ready.is_empty() {
            // unreachable once cycles are blocked; keep the loop finite regardless
            for key in waiting {
                order.blocked.insert(key.to_string(), vec![key.to_string()]);
            }
            break;
        }
        placed.extend(ready.iter().copied());
        order.levels.push(ready.into_iter().map(str::to_string).collect());
        remaining = waiting;
    }
    log::debug!(
        "build order: {} level(s), {} blocked program(s)",
        order.levels.len(),
        order.blocked.len()
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        edges
            .iter()
            .map(|(k, deps)| (k.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn dependencies_come_first() {
        let order = build_order(&graph(&[("door", &["lock"]), ("lock", &[]), ("lamp", &[])]));
        assert_eq!(order.levels, vec![vec!["lamp".to_string(), "lock".to_string()], vec!["door".to_string()]]);
        assert!(order.blocked.is_empty());
    }

    #[test]
    fn cycle_blocks_members_and_dependants_only() {
        let order = build_order(&graph(&[("a", &["b"]), ("b", &["a"]), ("c", &["a"]), ("d", &[])]));
        assert_eq!(order.levels, vec![vec!["d".to_string()]]);
        assert_eq!(order.blocked.len(), 3);
        let cycle = &order.blocked["c"];
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"a".to_string()) && cycle.contains(&"b".to_string()));
    }
}
