//! Copy-number inference from read coverage, and pruning of the edges
//! and connections the reads do not support.
use crate::graph::{EdgeId, RepeatGraph};
use crate::read_aligner::ReadAligner;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplicityEstimate {
    pub edge: EdgeId,
    /// Mean number of aligned reads per base.
    pub coverage: f64,
    pub multiplicity: u32,
    /// Number of distinct reads aligned to the edge.
    pub support: usize,
    /// The coverage ratio is close to an integer.
    pub confident: bool,
}

impl std::fmt::Display for MultiplicityEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\tcov:{:.2}\tx{}\tsupport:{}\t{}",
            self.edge,
            self.coverage,
            self.multiplicity,
            self.support,
            if self.confident { "confident" } else { "uncertain" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct MultiplicityInferer {
    config: Config,
    estimates: HashMap<EdgeId, MultiplicityEstimate>,
    baseline: f64,
    // The graph generation the estimates were computed at.
    generation: Option<u64>,
}

// Distinct reads (either strand) aligned to the edge.
fn supporting_reads(aligner: &ReadAligner, edge: EdgeId) -> HashSet<usize> {
    aligner
        .alignments_on(edge)
        .iter()
        .map(|a| a.read.record())
        .collect()
}

impl MultiplicityInferer {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            estimates: HashMap::new(),
            baseline: 0.,
            generation: None,
        }
    }
    /// Single-copy coverage estimated by the last call of `estimate_coverage`.
    pub fn mean_coverage(&self) -> f64 {
        self.baseline
    }
    pub fn estimate(&self, edge: EdgeId) -> Option<&MultiplicityEstimate> {
        self.estimates.get(&edge)
    }
    pub fn estimates(&self) -> impl Iterator<Item = &MultiplicityEstimate> {
        self.estimates.values()
    }
    /// Whether the graph changed since the estimates were computed.
    pub fn is_stale(&self, graph: &RepeatGraph) -> bool {
        self.generation != Some(graph.generation())
    }
    /// Computes the coverage of every edge and the single-copy baseline, then
    /// sets the multiplicity of every edge to the rounded coverage ratio.
    /// Returns the baseline.
    pub fn estimate_coverage(&mut self, graph: &mut RepeatGraph, aligner: &ReadAligner) -> Result<f64> {
        self.estimates.clear();
        let edges: Vec<_> = graph.canonical_edges().map(|e| (e.id, e.rc, e.length)).collect();
        for &(id, rc, length) in edges.iter() {
            let bases: usize = aligner
                .alignments_on(id)
                .iter()
                .flat_map(|a| a.chain.iter())
                .filter(|c| c.edge == id)
                .map(|c| c.edge_end - c.edge_start)
                .sum();
            // A self-complementary edge carries both strands of every read.
            let strands = if id == rc { 2. } else { 1. };
            let coverage = if length == 0 {
                0.
            } else {
                bases as f64 / length as f64 / strands
            };
            let support = supporting_reads(aligner, id).len();
            let estimate = MultiplicityEstimate {
                edge: id,
                coverage,
                multiplicity: 0,
                support,
                confident: false,
            };
            self.estimates.insert(id, estimate);
        }
        self.baseline = self.single_copy_coverage(graph);
        if self.baseline <= 0. {
            warn!("No edge is covered by reads. Multiplicities are left unchanged.");
        }
        for &(id, rc, length) in edges.iter() {
            let estimate = match self.estimates.get_mut(&id) {
                Some(estimate) => estimate,
                None => continue,
            };
            graph.set_coverage(id, estimate.coverage)?;
            if self.baseline > 0. {
                let ratio = estimate.coverage / self.baseline;
                let rounded = ratio.round();
                let mut multiplicity = rounded as u32;
                // Keep edges with some evidence, or too long to be noise.
                if multiplicity == 0 && (estimate.support > 0 || length >= self.config.min_edge_length) {
                    multiplicity = 1;
                }
                estimate.multiplicity = multiplicity;
                estimate.confident = (ratio - rounded).abs() <= self.config.multiplicity_confidence;
                graph.set_multiplicity(id, multiplicity)?;
            } else {
                estimate.multiplicity = graph.edge_checked(id)?.multiplicity;
            }
            let estimate = *estimate;
            self.estimates.insert(rc, MultiplicityEstimate { edge: rc, ..estimate });
            trace!("{}", estimate);
        }
        self.generation = Some(graph.generation());
        info!("Single-copy coverage:{:.2}", self.baseline);
        Ok(self.baseline)
    }
    // Length-weighted quantile of the coverage over the covered edges,
    // at `unique_length_fraction` (the median by default).
    fn single_copy_coverage(&self, graph: &RepeatGraph) -> f64 {
        let mut covered: Vec<(f64, usize)> = graph
            .canonical_edges()
            .filter_map(|e| self.estimates.get(&e.id).map(|x| (x.coverage, e.length)))
            .filter(|&(coverage, length)| coverage > 0. && length > 0)
            .collect();
        if covered.is_empty() {
            return 0.;
        }
        covered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let total: usize = covered.iter().map(|x| x.1).sum();
        let threshold = total as f64 * self.config.unique_length_fraction;
        let mut cumulative = 0;
        for &(coverage, length) in covered.iter() {
            cumulative += length;
            if cumulative as f64 >= threshold {
                return coverage;
            }
        }
        covered[covered.len() - 1].0
    }
    fn refresh(&mut self, graph: &mut RepeatGraph, aligner: &ReadAligner) -> Result<()> {
        if self.is_stale(graph) {
            debug!("Coverage estimates are stale. Recomputing.");
            self.estimate_coverage(graph, aligner)?;
        }
        Ok(())
    }
    /// Removes the short edges supported by too few reads. Their alignments are dropped first.
    /// Returns the number of removed edge pairs.
    pub fn remove_unsupported_edges(
        &mut self,
        graph: &mut RepeatGraph,
        aligner: &mut ReadAligner,
    ) -> Result<usize> {
        self.refresh(graph, aligner)?;
        let unsupported: Vec<EdgeId> = graph
            .canonical_edges()
            .filter(|e| e.length < self.config.min_edge_length)
            .filter(|e| {
                let support = self.estimates.get(&e.id).map(|x| x.support).unwrap_or(0);
                support < self.config.min_edge_support
            })
            .map(|e| e.id)
            .collect();
        for &edge in unsupported.iter() {
            let dropped = aligner.remove_alignments_on(graph, edge)?;
            debug!("Removing unsupported {} ({} alignments)", edge, dropped);
            graph.remove_edge(edge, false)?;
        }
        graph.remove_isolated_nodes();
        if !unsupported.is_empty() {
            // Dropped alignments changed the coverage of the other edges.
            self.estimate_coverage(graph, aligner)?;
        }
        info!("Removed {} unsupported edges", unsupported.len());
        Ok(unsupported.len())
    }
    /// Forbids the (in-edge, out-edge) pairs no read goes through at a node
    /// where both edges are otherwise traversed by reads.
    /// Returns the number of newly forbidden pairs.
    pub fn remove_unsupported_connections(
        &mut self,
        graph: &mut RepeatGraph,
        aligner: &ReadAligner,
    ) -> Result<usize> {
        let junctions: Vec<(Vec<EdgeId>, Vec<EdgeId>)> = graph
            .nodes()
            .filter(|n| n.in_degree() > 1 || n.out_degree() > 1)
            .filter(|n| n.in_degree() > 0 && n.out_degree() > 0)
            .map(|n| (n.in_edges.clone(), n.out_edges.clone()))
            .collect();
        let mut forbidden = 0;
        for (in_edges, out_edges) in junctions {
            let counts = aligner.count_transitions(&in_edges, None, &out_edges);
            let through = |e: EdgeId, is_in: bool| -> usize {
                counts
                    .iter()
                    .filter(|((i, o), _)| if is_in { *i == e } else { *o == e })
                    .map(|(_, c)| c)
                    .sum()
            };
            for &i in in_edges.iter() {
                for &o in out_edges.iter() {
                    let count = counts.get(&(i, o)).copied().unwrap_or(0);
                    if count == 0 && through(i, true) > 0 && through(o, false) > 0 {
                        if !graph.is_connection_allowed(i, o) {
                            continue;
                        }
                        debug!("Forbidding {} -> {}", i, o);
                        if graph.forbid_connection(i, o)? {
                            forbidden += 1;
                        }
                    }
                }
            }
        }
        info!("Forbade {} connections", forbidden);
        Ok(forbidden)
    }
    /// Marks the parallel edges with similar coverage but disjoint supporting
    /// reads as separate haplotypes. Returns the number of marked pairs.
    pub fn separate_haplotypes(&mut self, graph: &mut RepeatGraph, aligner: &ReadAligner) -> Result<usize> {
        self.refresh(graph, aligner)?;
        let mut pairs = vec![];
        for node in graph.nodes() {
            let edges: Vec<_> = node
                .out_edges
                .iter()
                .filter_map(|&e| graph.edge(e))
                .filter(|e| !e.is_loop() && e.id <= e.rc)
                .collect();
            for (i, e1) in edges.iter().enumerate() {
                for e2 in edges.iter().skip(i + 1) {
                    if e1.sink != e2.sink || e1.rc == e2.id || (e1.haplotype && e2.haplotype) {
                        continue;
                    }
                    let (c1, c2) = (e1.mean_coverage, e2.mean_coverage);
                    if c1 <= 0. || c2 <= 0. {
                        continue;
                    }
                    if (c1 - c2).abs() > self.config.haplotype_coverage_tolerance * c1.max(c2) {
                        continue;
                    }
                    let (r1, r2) = (supporting_reads(aligner, e1.id), supporting_reads(aligner, e2.id));
                    if !r1.is_empty() && !r2.is_empty() && r1.is_disjoint(&r2) {
                        pairs.push((e1.id, e2.id));
                    }
                }
            }
        }
        for &(e1, e2) in pairs.iter() {
            debug!("Haplotypes {} and {}", e1, e2);
            graph.set_haplotype(e1, true)?;
            graph.set_haplotype(e2, true)?;
        }
        info!("Separated {} haplotype pairs", pairs.len());
        Ok(pairs.len())
    }
}
