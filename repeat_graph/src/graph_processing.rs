//! Topological clean-up of the repeat graph.
use crate::graph::{EdgeAttributes, EdgeId, GraphPath, Node, RepeatGraph};
use crate::{Config, Result};
use std::collections::HashSet;

/// A run of edges replaced by a single edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedChain {
    pub merged: EdgeId,
    pub edges: Vec<EdgeId>,
    /// Where each of the edges starts inside the merged edge.
    pub offsets: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SimplifyReport {
    pub rounds: usize,
    pub merged: Vec<MergedChain>,
    pub tips: usize,
    pub bubbles: usize,
}

impl std::fmt::Display for SimplifyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rounds:{}\tMergedChains:{}\tTips:{}\tBubbles:{}",
            self.rounds,
            self.merged.len(),
            self.tips,
            self.bubbles
        )
    }
}

impl SimplifyReport {
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.tips == 0 && self.bubbles == 0
    }
}

// A node a path can go through without any choice.
fn is_passable(node: &Node) -> bool {
    node.is_bypass() && !node.is_self_complement() && node.in_edges[0] != node.out_edges[0]
}

/// Maximal runs of edges through passable nodes, with a flag telling
/// whether the run closes into a cycle. Every edge belongs to exactly one run.
pub fn unbranching_runs(graph: &RepeatGraph) -> Vec<(Vec<EdgeId>, bool)> {
    let mut visited: HashSet<EdgeId> = HashSet::new();
    let mut runs = vec![];
    for edge in graph.edges() {
        if visited.contains(&edge.id) {
            continue;
        }
        let (mut start, mut circular) = (edge.id, false);
        while let Some(node) = graph.edge(start).and_then(|e| graph.node(e.source)) {
            if !is_passable(node) {
                break;
            }
            let prev = node.in_edges[0];
            if prev == edge.id {
                circular = true;
                break;
            }
            start = prev;
        }
        if circular {
            start = edge.id;
        }
        let (mut run, mut current) = (vec![start], start);
        while let Some(node) = graph.edge(current).and_then(|e| graph.node(e.sink)) {
            if !is_passable(node) {
                break;
            }
            let next = node.out_edges[0];
            if next == start {
                break;
            }
            run.push(next);
            current = next;
        }
        visited.extend(run.iter().copied());
        runs.push((run, circular));
    }
    runs
}

/// Simplification passes and the edges-paths view of the graph.
#[derive(Debug, Clone)]
pub struct GraphProcessor {
    config: Config,
    // The edges paths and the generation they were computed at.
    paths: Option<(u64, Vec<GraphPath>)>,
}

impl GraphProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            paths: None,
        }
    }
    /// Runs chain compaction, tip removal and bubble collapse until nothing changes.
    pub fn simplify(&mut self, graph: &mut RepeatGraph) -> Result<SimplifyReport> {
        let mut report = SimplifyReport::default();
        while report.rounds < self.config.max_simplify_rounds {
            report.rounds += 1;
            let mut merged = self.compact_chains(graph)?;
            let tips = self.remove_tips(graph)?;
            let bubbles = self.collapse_bubbles(graph)?;
            graph.remove_isolated_nodes();
            debug!(
                "Round {}: {} chains, {} tips, {} bubbles",
                report.rounds,
                merged.len(),
                tips,
                bubbles
            );
            let changed = !merged.is_empty() || tips > 0 || bubbles > 0;
            report.merged.append(&mut merged);
            report.tips += tips;
            report.bubbles += bubbles;
            if !changed {
                break;
            }
        }
        info!("Simplified. {}\t{}", report, graph);
        Ok(report)
    }

    /// Replaces every run of two or more edges through passable nodes by one edge.
    /// Merged edges are removed even if alignments pin them; callers holding
    /// alignments should remap them with the returned chains.
    pub fn compact_chains(&mut self, graph: &mut RepeatGraph) -> Result<Vec<MergedChain>> {
        let mut merged = vec![];
        let mut visited: HashSet<EdgeId> = HashSet::new();
        for (run, circular) in unbranching_runs(graph) {
            if run.len() < 2 || run.iter().any(|e| visited.contains(e)) {
                continue;
            }
            let rc_run = run
                .iter()
                .rev()
                .map(|&e| graph.complement_edge(e))
                .collect::<Result<Vec<_>>>()?;
            visited.extend(run.iter().copied());
            visited.extend(rc_run.iter().copied());
            // A run containing its own complement (a hairpin) stays as it is.
            let members: HashSet<_> = run.iter().collect();
            if rc_run.iter().any(|e| members.contains(e)) {
                continue;
            }
            let offsets = run_offsets(graph, &run)?;
            let rc_offsets = run_offsets(graph, &rc_run)?;
            let new_edge = merge_run(graph, &run, circular)?;
            let rc_edge = graph.complement_edge(new_edge)?;
            merged.push(MergedChain {
                merged: new_edge,
                edges: run,
                offsets,
            });
            merged.push(MergedChain {
                merged: rc_edge,
                edges: rc_run,
                offsets: rc_offsets,
            });
        }
        if !merged.is_empty() {
            graph.remove_isolated_nodes();
            debug!("Compacted {} chains", merged.len() / 2);
        }
        Ok(merged)
    }

    fn remove_tips(&mut self, graph: &mut RepeatGraph) -> Result<usize> {
        let mean = mean_coverage(graph);
        let mut tips = vec![];
        for edge in graph.canonical_edges() {
            if edge.length > self.config.max_tip_length
                || edge.is_loop()
                || edge.is_self_complement()
                || edge.haplotype
                || graph.references(edge.id) + graph.references(edge.rc) > 0
            {
                continue;
            }
            let weak = mean <= 0. || edge.mean_coverage < self.config.tip_coverage_rate * mean;
            let (source, sink) = (graph.node_checked(edge.source)?, graph.node_checked(edge.sink)?);
            let dead_end = sink.out_degree() == 0 && sink.in_degree() == 1 && source.out_degree() > 1;
            let dead_start = source.in_degree() == 0 && source.out_degree() == 1 && sink.in_degree() > 1;
            if weak && (dead_end || dead_start) {
                tips.push(edge.id);
            }
        }
        let mut removed = 0;
        for tip in tips {
            // An earlier removal may have turned the attachment point into a plain node.
            let still_tip = {
                let edge = graph.edge_checked(tip)?;
                let (source, sink) = (graph.node_checked(edge.source)?, graph.node_checked(edge.sink)?);
                (sink.out_degree() == 0 && source.out_degree() > 1)
                    || (source.in_degree() == 0 && sink.in_degree() > 1)
            };
            if still_tip {
                debug!("Removing tip {}", graph.edge_checked(tip)?);
                graph.remove_edge(tip, false)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn collapse_bubbles(&mut self, graph: &mut RepeatGraph) -> Result<usize> {
        let mut removed: HashSet<EdgeId> = HashSet::new();
        let mut pairs = vec![];
        for node in graph.nodes() {
            let candidates: Vec<_> = node
                .out_edges
                .iter()
                .filter_map(|&e| graph.edge(e))
                .filter(|e| !e.is_loop() && !e.haplotype)
                .filter(|e| e.length <= self.config.max_bubble_length)
                .collect();
            for (i, e1) in candidates.iter().enumerate() {
                for e2 in candidates.iter().skip(i + 1) {
                    if e1.sink != e2.sink || e1.rc == e2.id {
                        continue;
                    }
                    if [e1.id, e1.rc, e2.id, e2.rc].iter().any(|e| removed.contains(e)) {
                        continue;
                    }
                    let diff = (e1.length as i64 - e2.length as i64).unsigned_abs() as usize;
                    let longer = e1.length.max(e2.length) as f64;
                    let tolerance = (self.config.bubble_length_tolerance * longer) as usize;
                    if diff > tolerance.max(self.config.bubble_min_tolerance) {
                        continue;
                    }
                    let (keep, remove) = if (e2.mean_coverage, e1.id) > (e1.mean_coverage, e2.id) {
                        (e2, e1)
                    } else {
                        (e1, e2)
                    };
                    if graph.references(remove.id) + graph.references(remove.rc) > 0 {
                        continue;
                    }
                    removed.insert(remove.id);
                    removed.insert(remove.rc);
                    pairs.push((keep.id, remove.id));
                }
            }
        }
        let mut collapsed = 0;
        for (keep, remove) in pairs {
            if !graph.contains_edge(remove) || !graph.contains_edge(keep) {
                continue;
            }
            let coverage = graph.edge_checked(keep)?.mean_coverage + graph.edge_checked(remove)?.mean_coverage;
            debug!("Collapsing {} into {}", remove, keep);
            graph.set_coverage(keep, coverage)?;
            graph.remove_edge(remove, false)?;
            collapsed += 1;
        }
        Ok(collapsed)
    }

    /// The current unbranching decomposition of the graph. Computed on demand
    /// and reused until the graph changes.
    pub fn edges_paths(&mut self, graph: &RepeatGraph) -> &[GraphPath] {
        let generation = graph.generation();
        let stale = match self.paths.as_ref() {
            Some((g, _)) => *g != generation,
            None => true,
        };
        if stale {
            let paths: Vec<_> = unbranching_runs(graph)
                .into_iter()
                .enumerate()
                .map(|(id, (edges, circular))| GraphPath::new(id, edges, circular))
                .collect();
            debug!("Regenerated {} edges paths at generation {}", paths.len(), generation);
            self.paths = Some((generation, paths));
        }
        match self.paths.as_ref() {
            Some((_, paths)) => paths.as_slice(),
            None => &[],
        }
    }
}

/// Length-weighted mean coverage over the covered edges.
pub fn mean_coverage(graph: &RepeatGraph) -> f64 {
    let (sum, len) = graph
        .edges()
        .filter(|e| e.mean_coverage > 0.)
        .fold((0., 0), |(sum, len), e| {
            (sum + e.mean_coverage * e.length as f64, len + e.length)
        });
    if len == 0 {
        0.
    } else {
        sum / len as f64
    }
}

fn run_offsets(graph: &RepeatGraph, run: &[EdgeId]) -> Result<Vec<usize>> {
    let mut offsets = Vec::with_capacity(run.len());
    let mut total = 0;
    for &e in run {
        offsets.push(total);
        total += graph.edge_checked(e)?.length;
    }
    Ok(offsets)
}

// Replaces the run by one edge and returns it.
fn merge_run(graph: &mut RepeatGraph, run: &[EdgeId], circular: bool) -> Result<EdgeId> {
    let edges = run
        .iter()
        .map(|&e| graph.edge_checked(e).map(|e| e.clone()))
        .collect::<Result<Vec<_>>>()?;
    let source = edges[0].source;
    let sink = if circular {
        source
    } else {
        edges[edges.len() - 1].sink
    };
    let segments: Vec<_> = edges.iter().flat_map(|e| e.segments.iter().copied()).collect();
    let length: usize = edges.iter().map(|e| e.length).sum();
    let coverage = if length == 0 {
        0.
    } else {
        edges
            .iter()
            .map(|e| e.mean_coverage * e.length as f64)
            .sum::<f64>()
            / length as f64
    };
    let attrs = EdgeAttributes {
        copies: edges.iter().map(|e| e.copies).min().unwrap_or(1),
        multiplicity: edges.iter().map(|e| e.multiplicity).min().unwrap_or(1),
        resolved: edges.iter().all(|e| e.resolved),
        haplotype: edges.iter().any(|e| e.haplotype),
    };
    let merged = graph.add_edge(source, sink, segments, attrs)?;
    graph.set_coverage(merged, coverage)?;
    for &e in run {
        graph.remove_edge(e, true)?;
    }
    debug!("Merged {} edges into {}", run.len(), merged);
    Ok(merged)
}
