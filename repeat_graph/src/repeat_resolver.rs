//! Repeat resolution. Each ambiguous junction is split into unique paths
//! when the spanning reads single out one out-edge for every in-edge,
//! and is left untouched otherwise.
use crate::bipartite_matching::maximum_weight_matching;
use crate::graph::{EdgeAttributes, EdgeId, NodeId, RepeatGraph};
use crate::graph_processing::GraphProcessor;
use crate::read_aligner::ReadAligner;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JunctionState {
    Unresolved,
    Resolved,
    PermanentlyAmbiguous,
}

impl std::fmt::Display for JunctionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JunctionState::Unresolved => write!(f, "Unresolved"),
            JunctionState::Resolved => write!(f, "Resolved"),
            JunctionState::PermanentlyAmbiguous => write!(f, "Ambiguous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionKind {
    /// Reads go from the in-edges to the out-edges through this node.
    Node(NodeId),
    /// Reads go from the in-edges to the out-edges through this repeat edge.
    Repeat(EdgeId),
}

impl std::fmt::Display for JunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JunctionKind::Node(n) => write!(f, "Node {}", n),
            JunctionKind::Repeat(e) => write!(f, "Repeat {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub kind: JunctionKind,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
    pub state: JunctionState,
    /// Spanning reads of every (in-edge, out-edge) pair, filled on resolution.
    pub support: Vec<(EdgeId, EdgeId, usize)>,
    /// The pairs the junction was split into.
    pub matching: Vec<(EdgeId, EdgeId)>,
}

impl std::fmt::Display for Junction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ins: Vec<_> = self.in_edges.iter().map(|e| format!("{}", e)).collect();
        let outs: Vec<_> = self.out_edges.iter().map(|e| format!("{}", e)).collect();
        write!(
            f,
            "{}\t[{}]->[{}]\t{}",
            self.kind,
            ins.join(","),
            outs.join(","),
            self.state
        )
    }
}

impl Junction {
    fn new(kind: JunctionKind, in_edges: Vec<EdgeId>, out_edges: Vec<EdgeId>, state: JunctionState) -> Self {
        Self {
            kind,
            in_edges,
            out_edges,
            state,
            support: vec![],
            matching: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub resolved: usize,
    pub ambiguous: usize,
    /// Number of split operations (new nodes or new repeat copies).
    pub splits: usize,
}

impl std::fmt::Display for ResolveReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved:{}\tAmbiguous:{}\tSplits:{}",
            self.resolved, self.ambiguous, self.splits
        )
    }
}

#[derive(Debug, Clone)]
pub struct RepeatResolver {
    config: Config,
    junctions: Vec<Junction>,
}

// Whether the in/out sides can be rerouted independently.
fn is_separable(graph: &RepeatGraph, in_edges: &[EdgeId], out_edges: &[EdgeId]) -> bool {
    let mut seen: HashSet<EdgeId> = HashSet::new();
    for &e in in_edges.iter().chain(out_edges.iter()) {
        let edge = match graph.edge(e) {
            Some(edge) => edge,
            None => return false,
        };
        if edge.is_self_complement() || edge.is_loop() || seen.contains(&edge.rc) || !seen.insert(e) {
            return false;
        }
    }
    true
}

impl RepeatResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            junctions: vec![],
        }
    }
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }
    pub fn junction(&self, kind: JunctionKind) -> Option<&Junction> {
        self.junctions.iter().find(|j| j.kind == kind)
    }
    /// Classifies the edges by multiplicity and collects the junctions to resolve:
    /// one per repeat edge (multiplicity > 1), and one per branching node not
    /// adjacent to a repeat edge. A node branching on one side only is a
    /// junction too; it can never be matched and ends up ambiguous.
    /// One of each reverse-complement pair is kept.
    pub fn find_repeats(&mut self, graph: &RepeatGraph) -> &[Junction] {
        self.junctions.clear();
        let mut repeat_nodes: HashSet<NodeId> = HashSet::new();
        for edge in graph.canonical_edges().filter(|e| e.is_repetitive()) {
            for &n in &[edge.source, edge.sink] {
                repeat_nodes.insert(n);
                if let Some(node) = graph.node(n) {
                    repeat_nodes.insert(node.rc);
                }
            }
            let (source, sink) = match (graph.node(edge.source), graph.node(edge.sink)) {
                (Some(source), Some(sink)) => (source, sink),
                _ => continue,
            };
            let in_edges = source.in_edges.clone();
            let out_edges = sink.out_edges.clone();
            let isolated_repeat = source.out_edges == [edge.id] && sink.in_edges == [edge.id];
            let simple = !edge.is_loop()
                && !edge.is_self_complement()
                && !source.is_self_complement()
                && !sink.is_self_complement()
                && sink.id != source.rc;
            let sides: Vec<_> = in_edges.iter().chain(out_edges.iter()).collect();
            let touches_repeat = sides.iter().any(|&&e| e == edge.id || e == edge.rc);
            let state = if isolated_repeat
                && simple
                && !touches_repeat
                && !in_edges.is_empty()
                && !out_edges.is_empty()
                && is_separable(graph, &in_edges, &out_edges)
            {
                JunctionState::Unresolved
            } else {
                JunctionState::PermanentlyAmbiguous
            };
            let junction = Junction::new(JunctionKind::Repeat(edge.id), in_edges, out_edges, state);
            debug!("{}", junction);
            self.junctions.push(junction);
        }
        for node in graph.nodes() {
            if node.id > node.rc || repeat_nodes.contains(&node.id) {
                continue;
            }
            let weight = |edges: &[EdgeId]| -> u32 {
                edges
                    .iter()
                    .filter_map(|&e| graph.edge(e))
                    .map(|e| e.multiplicity)
                    .sum()
            };
            if weight(&node.in_edges) <= 1 && weight(&node.out_edges) <= 1 {
                continue;
            }
            let state = if !node.is_self_complement() && is_separable(graph, &node.in_edges, &node.out_edges) {
                JunctionState::Unresolved
            } else {
                JunctionState::PermanentlyAmbiguous
            };
            let junction = Junction::new(
                JunctionKind::Node(node.id),
                node.in_edges.clone(),
                node.out_edges.clone(),
                state,
            );
            debug!("{}", junction);
            self.junctions.push(junction);
        }
        info!(
            "Found {} junctions ({} repeat edges)",
            self.junctions.len(),
            self.junctions
                .iter()
                .filter(|j| matches!(j.kind, JunctionKind::Repeat(_)))
                .count()
        );
        &self.junctions
    }

    /// Resolves every unresolved junction the spanning reads allow to.
    /// A junction becomes `Resolved` only if the (in-edge, out-edge) pairs with at
    /// least `min_spanning_reads` reads form a perfect matching; otherwise
    /// it becomes `PermanentlyAmbiguous` and the graph is left as it is.
    pub fn resolve_repeats(&mut self, graph: &mut RepeatGraph, aligner: &mut ReadAligner) -> Result<ResolveReport> {
        let mut report = ResolveReport::default();
        for idx in 0..self.junctions.len() {
            if self.junctions[idx].state != JunctionState::Unresolved {
                if self.junctions[idx].state == JunctionState::PermanentlyAmbiguous {
                    report.ambiguous += 1;
                }
                continue;
            }
            let (in_edges, out_edges) = self.current_sides(graph, self.junctions[idx].kind)?;
            let via = match self.junctions[idx].kind {
                JunctionKind::Repeat(e) => Some(e),
                JunctionKind::Node(_) => None,
            };
            let counts = aligner.count_transitions(&in_edges, via, &out_edges);
            let support: Vec<_> = in_edges
                .iter()
                .flat_map(|&i| out_edges.iter().map(move |&o| (i, o)))
                .map(|(i, o)| {
                    let allowed = via.is_some() || graph.is_connection_allowed(i, o);
                    let count = if allowed {
                        counts.get(&(i, o)).copied().unwrap_or(0)
                    } else {
                        0
                    };
                    (i, o, count)
                })
                .collect();
            let matching = decide(&in_edges, &out_edges, &support, self.config.min_spanning_reads);
            let junction = &mut self.junctions[idx];
            junction.in_edges = in_edges;
            junction.out_edges = out_edges;
            junction.support = support;
            match matching {
                Some(matching) => {
                    debug!("Resolving {} by {:?}", junction, matching);
                    let kind = junction.kind;
                    junction.state = JunctionState::Resolved;
                    junction.matching = matching.clone();
                    report.splits += match kind {
                        JunctionKind::Node(node) => split_node_junction(graph, node, &matching)?,
                        JunctionKind::Repeat(repeat) => split_repeat_junction(graph, aligner, repeat, &matching)?,
                    };
                    report.resolved += 1;
                }
                None => {
                    debug!("Leaving {} ambiguous", junction);
                    junction.state = JunctionState::PermanentlyAmbiguous;
                    report.ambiguous += 1;
                }
            }
        }
        aligner.remove_inconsistent(graph);
        graph.remove_isolated_nodes();
        info!("Repeat resolution. {}\t{}", report, graph);
        Ok(report)
    }

    // The in/out sides of the junction in the current graph.
    fn current_sides(&self, graph: &RepeatGraph, kind: JunctionKind) -> Result<(Vec<EdgeId>, Vec<EdgeId>)> {
        match kind {
            JunctionKind::Node(node) => {
                let node = graph.node_checked(node)?;
                Ok((node.in_edges.clone(), node.out_edges.clone()))
            }
            JunctionKind::Repeat(repeat) => {
                let edge = graph.edge_checked(repeat)?;
                let in_edges = graph.in_edges(edge.source)?.to_vec();
                let out_edges = graph.out_edges(edge.sink)?.to_vec();
                Ok((in_edges, out_edges))
            }
        }
    }

    /// Merges the runs of edges left behind by the splits into single edges,
    /// drops the tombstones, and checks the graph. Returns the number of merged edges.
    pub fn fix_long_edges(
        &mut self,
        graph: &mut RepeatGraph,
        aligner: &mut ReadAligner,
        processor: &mut GraphProcessor,
    ) -> Result<usize> {
        let merged = processor.compact_chains(graph)?;
        aligner.remap_merged(graph, &merged)?;
        let tombstones = graph.compact()?;
        graph.remove_isolated_nodes();
        graph.check_invariants()?;
        info!(
            "Fixed long edges. {} merged, {} tombstones dropped",
            merged.len(),
            tombstones
        );
        Ok(merged.len())
    }
}

/// The matching a junction is resolved by, if any: the supported pairs
/// (at least `threshold` reads) must pair every in-edge with exactly one
/// out-edge and vice versa.
pub fn decide(
    in_edges: &[EdgeId],
    out_edges: &[EdgeId],
    support: &[(EdgeId, EdgeId, usize)],
    threshold: usize,
) -> Option<Vec<(EdgeId, EdgeId)>> {
    if in_edges.is_empty() || in_edges.len() != out_edges.len() {
        return None;
    }
    let in_index: HashMap<EdgeId, usize> = in_edges.iter().enumerate().map(|(i, &e)| (e, i)).collect();
    let out_index: HashMap<EdgeId, usize> = out_edges.iter().enumerate().map(|(i, &e)| (e, i)).collect();
    let mut graph = vec![vec![]; in_edges.len()];
    let mut claims_in = vec![0; in_edges.len()];
    let mut claims_out = vec![0; out_edges.len()];
    for &(i, o, count) in support.iter().filter(|x| x.2 >= threshold.max(1)) {
        let (i, o) = match (in_index.get(&i), out_index.get(&o)) {
            (Some(&i), Some(&o)) => (i, o),
            _ => continue,
        };
        graph[i].push((o, count as u64));
        claims_in[i] += 1;
        claims_out[o] += 1;
    }
    // An edge claimed by two supported pairs is a conflict, whatever the matching says.
    if claims_in.iter().chain(claims_out.iter()).any(|&c| c != 1) {
        return None;
    }
    let matching = maximum_weight_matching(in_edges.len(), out_edges.len(), &graph);
    if matching.len() != in_edges.len() {
        return None;
    }
    Some(
        matching
            .into_iter()
            .map(|(i, o)| (in_edges[i], out_edges[o]))
            .collect(),
    )
}

// Moves every matched pair but the last one to a node of its own.
fn split_node_junction(graph: &mut RepeatGraph, node: NodeId, matching: &[(EdgeId, EdgeId)]) -> Result<usize> {
    let mut splits = 0;
    for &(i, o) in matching.iter().take(matching.len().saturating_sub(1)) {
        let new_node = graph.split_node(node, &[i], &[o])?;
        debug!("{} -> {} -> {}", i, new_node, o);
        splits += 1;
    }
    Ok(splits)
}

// For every matched pair but the last one, makes a copy of the repeat
// connecting only that pair and moves the reads going through the pair onto it.
fn split_repeat_junction(
    graph: &mut RepeatGraph,
    aligner: &mut ReadAligner,
    repeat: EdgeId,
    matching: &[(EdgeId, EdgeId)],
) -> Result<usize> {
    let mut splits = 0;
    for &(i, o) in matching.iter().take(matching.len().saturating_sub(1)) {
        let edge = graph.edge_checked(repeat)?.clone();
        if edge.multiplicity <= 1 {
            warn!("{} has more spanning paths than copies", repeat);
        }
        let copies = edge.multiplicity.max(1);
        let start = graph.split_node(edge.source, &[i], &[])?;
        let end = graph.split_node(edge.sink, &[], &[o])?;
        let attrs = EdgeAttributes {
            copies: 1,
            multiplicity: 1,
            resolved: true,
            haplotype: edge.haplotype,
        };
        let copy = graph.add_edge(start, end, edge.segments.clone(), attrs)?;
        let share = edge.mean_coverage / copies as f64;
        graph.set_coverage(copy, share)?;
        graph.set_multiplicity(repeat, (copies - 1).max(1))?;
        graph.set_coverage(repeat, (edge.mean_coverage - share).max(share))?;
        let rerouted = aligner.reroute(graph, i, repeat, o, copy);
        let (rc_i, rc_o) = (graph.complement_edge(i)?, graph.complement_edge(o)?);
        let (rc_repeat, rc_copy) = (edge.rc, graph.complement_edge(copy)?);
        aligner.reroute(graph, rc_o, rc_repeat, rc_i, rc_copy);
        debug!("{} -> {} -> {} ({} reads)", i, copy, o, rerouted);
        splits += 1;
    }
    if graph.edge_checked(repeat)?.multiplicity == 1 {
        graph.set_resolved(repeat, true)?;
    }
    Ok(splits)
}
