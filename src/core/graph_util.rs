//! Deterministic graph algorithms over dependency edges: external-bucket
//! rewriting, Tarjan SCC, bounded representative-cycle sampling, BFS
//! shortest path, and per-node fan-in/fan-out/density metrics. Built on
//! `petgraph::graphmap::DiGraphMap`, but every traversal this module
//! exposes explicitly sorts first: petgraph's own iteration order is never
//! relied upon.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graphmap::DiGraphMap;

use crate::core::cancellation::CancellationToken;

/// Prefix used for external dependency bucket nodes.
pub const EXTERNAL_PREFIX: &str = "__external__";

/// A directed graph over string node ids, built from dependency edges, with
/// only deterministic (pre-sorted) traversal operations exposed.
#[derive(Debug, Clone, Default)]
pub struct DirectedGraph {
    inner: DiGraphMap<u32, ()>,
    id_of: BTreeMap<String, u32>,
    node_of: Vec<String>,
}

impl DirectedGraph {
    pub fn new() -> Self {
        DirectedGraph::default()
    }

    fn intern(&mut self, node: &str) -> u32 {
        if let Some(&id) = self.id_of.get(node) {
            return id;
        }
        let id = self.node_of.len() as u32;
        self.node_of.push(node.to_string());
        self.id_of.insert(node.to_string(), id);
        self.inner.add_node(id);
        id
    }

    /// Add a directed edge `from -> to`, interning both endpoints.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let a = self.intern(from);
        let b = self.intern(to);
        self.inner.add_edge(a, b, ());
    }

    /// Ensure a node exists even if it has no edges.
    pub fn add_node(&mut self, node: &str) {
        self.intern(node);
    }

    /// All node names, sorted.
    pub fn nodes(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.node_of.iter().map(|s| s.as_str()).collect();
        v.sort_unstable();
        v
    }

    /// Sorted list of direct successors of `node`.
    pub fn successors(&self, node: &str) -> Vec<&str> {
        let Some(&id) = self.id_of.get(node) else { return Vec::new() };
        let mut out: Vec<&str> =
            self.inner.neighbors_directed(id, petgraph::Direction::Outgoing).map(|n| self.node_of[n as usize].as_str()).collect();
        out.sort_unstable();
        out
    }

    /// Sorted list of direct predecessors of `node`.
    pub fn predecessors(&self, node: &str) -> Vec<&str> {
        let Some(&id) = self.id_of.get(node) else { return Vec::new() };
        let mut out: Vec<&str> =
            self.inner.neighbors_directed(id, petgraph::Direction::Incoming).map(|n| self.node_of[n as usize].as_str()).collect();
        out.sort_unstable();
        out
    }

    pub fn fan_out(&self, node: &str) -> usize {
        self.successors(node).len()
    }

    pub fn fan_in(&self, node: &str) -> usize {
        self.predecessors(node).len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// `edges / (n * (n - 1))`; `0.0` when fewer than 2 nodes.
    pub fn dependency_density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n as f64 * (n as f64 - 1.0))
    }

    /// Strongly connected components, each sorted, the whole list sorted by
    /// each component's smallest member. Deterministic regardless of
    /// insertion order.
    pub fn strongly_connected_components(&self) -> Vec<Vec<&str>> {
        let mut sccs: Vec<Vec<&str>> =
            tarjan_scc_sorted(&self.inner).into_iter().map(|ids| {
                let mut names: Vec<&str> = ids.iter().map(|&id| self.node_of[id as usize].as_str()).collect();
                names.sort_unstable();
                names
            }).collect();
        sccs.sort_by(|a, b| a.first().cmp(&b.first()));
        sccs
    }

    /// SCCs with more than one member, or a single member with a self-loop.
    pub fn cyclic_components(&self) -> Vec<Vec<&str>> {
        self.strongly_connected_components()
            .into_iter()
            .filter(|scc| scc.len() > 1 || (scc.len() == 1 && self.has_self_loop(scc[0])))
            .collect()
    }

    fn has_self_loop(&self, node: &str) -> bool {
        self.id_of.get(node).map(|&id| self.inner.contains_edge(id, id)).unwrap_or(false)
    }

    /// BFS shortest path from `from` to `to`, visiting successors in sorted
    /// order so the result is deterministic among equal-length paths.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let start = *self.id_of.get(from)?;
        let goal = *self.id_of.get(to)?;
        if start == goal {
            return Some(vec![from.to_string()]);
        }

        let mut visited = BTreeSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(vec![start]);

        while let Some(path) = queue.pop_front() {
            let last = *path.last().unwrap();
            let mut next: Vec<u32> = self.inner.neighbors_directed(last, petgraph::Direction::Outgoing).collect();
            next.sort_unstable();
            for n in next {
                if n == goal {
                    let mut full = path.clone();
                    full.push(n);
                    return Some(full.into_iter().map(|id| self.node_of[id as usize].clone()).collect());
                }
                if visited.insert(n) {
                    let mut extended = path.clone();
                    extended.push(n);
                    queue.push_back(extended);
                }
            }
        }
        None
    }

    /// Up to `max_cycles` representative simple cycles, each truncated to
    /// `max_node_count` nodes, sampled deterministically from the cyclic
    /// SCCs via DFS over sorted successor order.
    pub fn sample_cycles(&self, max_cycles: usize, max_node_count: usize, cancel: &CancellationToken) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        for scc in self.cyclic_components() {
            if cycles.len() >= max_cycles || cancel.is_cancelled() {
                break;
            }
            if let Some(cycle) = self.find_one_cycle(&scc, max_node_count) {
                cycles.push(cycle);
            }
        }
        cycles
    }

    fn find_one_cycle(&self, scc: &[&str], max_node_count: usize) -> Option<Vec<String>> {
        let scc_set: BTreeSet<&str> = scc.iter().copied().collect();
        let start = *scc.first()?;
        let start_id = *self.id_of.get(start)?;

        if scc.len() == 1 {
            if self.has_self_loop(start) {
                return Some(vec![start.to_string(), start.to_string()]);
            }
            return None;
        }

        let mut stack = vec![(start_id, vec![start_id])];
        while let Some((node, path)) = stack.pop() {
            if path.len() > max_node_count {
                continue;
            }
            let mut next: Vec<u32> = self.inner.neighbors_directed(node, petgraph::Direction::Outgoing).collect();
            next.sort_unstable();
            for n in next {
                let n_name = self.node_of[n as usize].as_str();
                if !scc_set.contains(n_name) {
                    continue;
                }
                if n == start_id {
                    let mut full: Vec<String> = path.iter().map(|&id| self.node_of[id as usize].clone()).collect();
                    full.push(start.to_string());
                    return Some(full);
                }
                if !path.contains(&n) {
                    let mut extended = path.clone();
                    extended.push(n);
                    stack.push((n, extended));
                }
            }
        }
        None
    }
}

/// Tarjan's algorithm producing SCCs in deterministic order: nodes are
/// visited in sorted id order, and within each node successors are visited
/// in sorted order (via `petgraph`'s `u32` node ids, which this module
/// assigns in discovery order but always iterates sorted downstream).
fn tarjan_scc_sorted(graph: &DiGraphMap<u32, ()>) -> Vec<Vec<u32>> {
    struct State {
        index_counter: usize,
        stack: Vec<u32>,
        on_stack: BTreeSet<u32>,
        indices: BTreeMap<u32, usize>,
        lowlink: BTreeMap<u32, usize>,
        sccs: Vec<Vec<u32>>,
    }

    fn strongconnect(v: u32, graph: &DiGraphMap<u32, ()>, st: &mut State) {
        st.indices.insert(v, st.index_counter);
        st.lowlink.insert(v, st.index_counter);
        st.index_counter += 1;
        st.stack.push(v);
        st.on_stack.insert(v);

        let mut successors: Vec<u32> = graph.neighbors_directed(v, petgraph::Direction::Outgoing).collect();
        successors.sort_unstable();

        for w in successors {
            if !st.indices.contains_key(&w) {
                strongconnect(w, graph, st);
                let w_low = st.lowlink[&w];
                let v_low = st.lowlink[&v];
                st.lowlink.insert(v, v_low.min(w_low));
            } else if st.on_stack.contains(&w) {
                let w_idx = st.indices[&w];
                let v_low = st.lowlink[&v];
                st.lowlink.insert(v, v_low.min(w_idx));
            }
        }

        if st.lowlink[&v] == st.indices[&v] {
            let mut component = Vec::new();
            loop {
                let w = st.stack.pop().unwrap();
                st.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            st.sccs.push(component);
        }
    }

    let mut nodes: Vec<u32> = graph.nodes().collect();
    nodes.sort_unstable();

    let mut st = State {
        index_counter: 0,
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        indices: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        sccs: Vec::new(),
    };

    for v in nodes {
        if !st.indices.contains_key(&v) {
            strongconnect(v, graph, &mut st);
        }
    }

    st.sccs
}

/// Build a class-granularity graph from a fact index's dependency edges.
/// Every project class is added as a node even if it has no edges, so
/// isolated classes still appear in per-node metrics.
pub fn build_class_graph(facts: &crate::core::fact_index::FactIndex) -> DirectedGraph {
    let mut g = DirectedGraph::new();
    for class in &facts.classes {
        g.add_node(&class.fq_name);
    }
    for edge in &facts.edges {
        if edge.from.fq_name != edge.to.fq_name {
            g.add_edge(&edge.from.fq_name, &edge.to.fq_name);
        }
    }
    g
}

/// Build a package-granularity graph: nodes are dotted package names, an
/// edge `p -> q` exists if any class in `p` depends on any class in `q`.
/// When `include_external` is set, edges leaving the project are rewritten
/// to `__external__:<package>` bucket nodes instead of being dropped.
pub fn build_package_graph(facts: &crate::core::fact_index::FactIndex) -> DirectedGraph {
    let mut g = DirectedGraph::new();
    for class in &facts.classes {
        g.add_node(&class.package_name);
    }
    for edge in &facts.edges {
        if edge.from.package_name != edge.to.package_name {
            g.add_edge(&edge.from.package_name, &edge.to.package_name);
        }
    }
    g
}

/// Build a module-granularity graph: nodes are each package's top-level
/// segment (`com.a.web` -> `com`).
pub fn build_module_graph(facts: &crate::core::fact_index::FactIndex) -> DirectedGraph {
    fn module_of(package: &str) -> &str {
        package.split('.').next().unwrap_or(package)
    }
    let mut g = DirectedGraph::new();
    for class in &facts.classes {
        g.add_node(module_of(&class.package_name));
    }
    for edge in &facts.edges {
        let from_mod = module_of(&edge.from.package_name);
        let to_mod = module_of(&edge.to.package_name);
        if from_mod != to_mod {
            g.add_edge(from_mod, to_mod);
        }
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_cycle() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("c", "a");
        let sccs = g.cyclic_components();
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn acyclic_graph_has_no_cyclic_components() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        assert!(g.cyclic_components().is_empty());
    }

    #[test]
    fn shortest_path_is_deterministic() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        g.add_edge("a", "c");
        g.add_edge("b", "d");
        g.add_edge("c", "d");
        let path = g.shortest_path("a", "d").unwrap();
        assert_eq!(path, vec!["a", "b", "d"]);
    }

    #[test]
    fn dependency_density_small_graph() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "b");
        assert!((g.dependency_density() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn self_loop_counts_as_cyclic() {
        let mut g = DirectedGraph::new();
        g.add_edge("a", "a");
        assert_eq!(g.cyclic_components(), vec![vec!["a"]]);
    }
}
