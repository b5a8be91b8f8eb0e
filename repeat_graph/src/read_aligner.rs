//! Aligning reads to the graph. Each read is turned into a chain of
//! edge alignments that is a walk in the graph.
use crate::graph::{EdgeId, RepeatGraph};
use crate::graph_processing::MergedChain;
use crate::overlap::{OverlapRange, OverlapService, Strand};
use crate::sequence::{SeqId, SequenceProvider};
use crate::{Config, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A part of a read aligned to a part of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAlignment {
    pub edge: EdgeId,
    pub read_start: usize,
    pub read_end: usize,
    pub edge_start: usize,
    pub edge_end: usize,
}

impl std::fmt::Display for EdgeAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}-{}:{}:{}-{}",
            self.read_start, self.read_end, self.edge, self.edge_start, self.edge_end
        )
    }
}

/// The walk of a read through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadAlignment {
    pub read: SeqId,
    pub read_len: usize,
    pub chain: Vec<EdgeAlignment>,
}

impl std::fmt::Display for ReadAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let chain: Vec<_> = self.chain.iter().map(|c| format!("{}", c)).collect();
        write!(f, "{}({})\t{}", self.read, self.read_len, chain.join(" "))
    }
}

impl ReadAlignment {
    pub fn edges(&self) -> Vec<EdgeId> {
        self.chain.iter().map(|c| c.edge).collect()
    }
    /// Sum of the aligned read spans.
    pub fn aligned_length(&self) -> usize {
        self.chain.iter().map(|c| c.read_end - c.read_start).sum()
    }
    /// Whether the consecutive edges go through (in_edge, out_edge).
    pub fn contains_transition(&self, in_edge: EdgeId, out_edge: EdgeId) -> bool {
        self.chain
            .windows(2)
            .any(|w| w[0].edge == in_edge && w[1].edge == out_edge)
    }
    /// Whether the consecutive edges go through (in_edge, via, out_edge).
    pub fn contains_traversal(&self, in_edge: EdgeId, via: EdgeId, out_edge: EdgeId) -> bool {
        self.chain
            .windows(3)
            .any(|w| w[0].edge == in_edge && w[1].edge == via && w[2].edge == out_edge)
    }
    /// The same alignment for the reverse complement of the read.
    pub fn complement(&self, graph: &RepeatGraph) -> Result<Self> {
        let chain = self
            .chain
            .iter()
            .rev()
            .map(|c| {
                let edge = graph.edge_checked(c.edge)?;
                Ok(EdgeAlignment {
                    edge: edge.rc,
                    read_start: self.read_len - c.read_end,
                    read_end: self.read_len - c.read_start,
                    edge_start: edge.length - c.edge_end,
                    edge_end: edge.length - c.edge_start,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            read: self.read.rc(),
            read_len: self.read_len,
            chain,
        })
    }
    /// Whether the chain is still a walk in the graph.
    pub fn is_consistent(&self, graph: &RepeatGraph) -> bool {
        let live = self.chain.iter().all(|c| graph.contains_edge(c.edge));
        live && self.chain.windows(2).all(|w| {
            match (graph.edge(w[0].edge), graph.edge(w[1].edge)) {
                (Some(e), Some(f)) => {
                    (e.id == f.id && w[0].edge_end <= w[1].edge_start) || e.sink == f.source
                }
                _ => false,
            }
        })
    }
}

/// Owns the alignments of the reads to the graph, and the edge -> alignments index.
#[derive(Debug, Clone)]
pub struct ReadAligner {
    config: Config,
    alignments: Vec<Option<ReadAlignment>>,
    by_edge: HashMap<EdgeId, Vec<usize>>,
    unaligned: Vec<SeqId>,
}

impl ReadAligner {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            alignments: vec![],
            by_edge: HashMap::new(),
            unaligned: vec![],
        }
    }
    /// Aligns every read in parallel and stores the alignments of both strands.
    /// The graph is read-only while the reads are aligned; the edges of the stored
    /// alignments are pinned afterwards.
    pub fn align_reads<S, O>(
        &mut self,
        graph: &mut RepeatGraph,
        reads: &S,
        read_ids: &[SeqId],
        service: &O,
    ) -> Result<()>
    where
        S: SequenceProvider,
        O: OverlapService,
    {
        self.clear(graph);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.max(1))
            .build()?;
        let results: Vec<Result<(SeqId, usize, Vec<EdgeAlignment>)>> = {
            let graph: &RepeatGraph = graph;
            let config = &self.config;
            pool.install(|| {
                read_ids
                    .par_iter()
                    .map(|&id| {
                        let seq = reads.sequence(id)?;
                        let overlaps = service.overlaps(seq);
                        Ok((id, seq.len(), chain_overlaps(graph, config, &overlaps)))
                    })
                    .collect()
            })
        };
        for result in results {
            let (read, read_len, chain) = result?;
            if chain.is_empty() {
                self.unaligned.push(read);
                continue;
            }
            let alignment = ReadAlignment {
                read,
                read_len,
                chain,
            };
            let complement = alignment.complement(graph)?;
            self.insert(graph, alignment);
            self.insert(graph, complement);
        }
        info!(
            "Aligned {} reads, {} unaligned",
            read_ids.len() - self.unaligned.len(),
            self.unaligned.len()
        );
        Ok(())
    }
    fn insert(&mut self, graph: &mut RepeatGraph, alignment: ReadAlignment) {
        self.alignments.push(None);
        self.insert_at(graph, self.alignments.len() - 1, alignment);
    }
    /// Adds an alignment computed elsewhere, together with its complement.
    pub fn add_alignment(&mut self, graph: &mut RepeatGraph, alignment: ReadAlignment) -> Result<()> {
        if !alignment.is_consistent(graph) {
            return Err(crate::RepeatGraphError::invariant(format!(
                "alignment of {} is not a walk in the graph",
                alignment.read
            )));
        }
        let complement = alignment.complement(graph)?;
        self.insert(graph, alignment);
        self.insert(graph, complement);
        Ok(())
    }
    /// Drops every alignment and releases the pinned edges.
    pub fn clear(&mut self, graph: &mut RepeatGraph) {
        for alignment in self.alignments.drain(..).flatten() {
            graph.unpin_edges(&alignment.edges());
        }
        self.by_edge.clear();
        self.unaligned.clear();
    }
    pub fn alignments(&self) -> impl Iterator<Item = &ReadAlignment> {
        self.alignments.iter().filter_map(|a| a.as_ref())
    }
    pub fn num_alignments(&self) -> usize {
        self.alignments().count()
    }
    /// The alignments going through the edge.
    pub fn alignments_on(&self, edge: EdgeId) -> Vec<&ReadAlignment> {
        self.by_edge
            .get(&edge)
            .map(|idxs| {
                idxs.iter()
                    .filter_map(|&i| self.alignments[i].as_ref())
                    .collect()
            })
            .unwrap_or_default()
    }
    pub fn unaligned(&self) -> &[SeqId] {
        &self.unaligned
    }
    fn remove(&mut self, graph: &mut RepeatGraph, idx: usize) {
        if let Some(alignment) = self.alignments[idx].take() {
            let edges = alignment.edges();
            graph.unpin_edges(&edges);
            for e in edges {
                if let Some(idxs) = self.by_edge.get_mut(&e) {
                    idxs.retain(|&i| i != idx);
                    if idxs.is_empty() {
                        self.by_edge.remove(&e);
                    }
                }
            }
        }
    }
    /// Drops the alignments going through the edge or its complement, so that
    /// the edge can be removed. Returns the number of dropped alignments.
    pub fn remove_alignments_on(&mut self, graph: &mut RepeatGraph, edge: EdgeId) -> Result<usize> {
        let rc = graph.complement_edge(edge)?;
        let mut idxs: Vec<usize> = [edge, rc]
            .iter()
            .filter_map(|e| self.by_edge.get(e))
            .flat_map(|idxs| idxs.iter().copied())
            .collect();
        idxs.sort();
        idxs.dedup();
        for &idx in idxs.iter() {
            self.remove(graph, idx);
        }
        Ok(idxs.len())
    }
    /// Drops the alignments that are no longer walks in the graph.
    pub fn remove_inconsistent(&mut self, graph: &mut RepeatGraph) -> usize {
        let broken: Vec<_> = self
            .alignments
            .iter()
            .enumerate()
            .filter_map(|(idx, a)| a.as_ref().map(|a| (idx, a)))
            .filter(|(_, a)| !a.is_consistent(graph))
            .map(|(idx, _)| idx)
            .collect();
        for &idx in broken.iter() {
            self.remove(graph, idx);
        }
        if !broken.is_empty() {
            debug!("Dropped {} inconsistent alignments", broken.len());
        }
        broken.len()
    }
    /// Rewrites the alignments on merged chains onto the merged edges.
    pub fn remap_merged(&mut self, graph: &mut RepeatGraph, merged: &[MergedChain]) -> Result<()> {
        let mut position: HashMap<EdgeId, (EdgeId, usize)> = HashMap::new();
        for chain in merged {
            for (&e, &offset) in chain.edges.iter().zip(chain.offsets.iter()) {
                position.insert(e, (chain.merged, offset));
            }
        }
        let touched: Vec<usize> = {
            let mut idxs: Vec<_> = position
                .keys()
                .filter_map(|e| self.by_edge.get(e))
                .flat_map(|idxs| idxs.iter().copied())
                .collect();
            idxs.sort();
            idxs.dedup();
            idxs
        };
        for idx in touched {
            let alignment = match self.alignments[idx].take() {
                Some(alignment) => alignment,
                None => continue,
            };
            let old_edges = alignment.edges();
            for e in old_edges.iter() {
                if let Some(idxs) = self.by_edge.get_mut(e) {
                    idxs.retain(|&i| i != idx);
                }
            }
            graph.unpin_edges(&old_edges);
            let mut chain: Vec<EdgeAlignment> = vec![];
            for c in alignment.chain.iter() {
                let c = match position.get(&c.edge) {
                    Some(&(edge, offset)) => EdgeAlignment {
                        edge,
                        edge_start: c.edge_start + offset,
                        edge_end: c.edge_end + offset,
                        ..*c
                    },
                    None => *c,
                };
                match chain.last_mut() {
                    Some(last) if last.edge == c.edge && last.edge_end <= c.edge_start => {
                        last.read_end = c.read_end;
                        last.edge_end = c.edge_end;
                    }
                    _ => chain.push(c),
                }
            }
            self.insert_at(graph, idx, ReadAlignment { chain, ..alignment });
        }
        self.by_edge.retain(|_, idxs| !idxs.is_empty());
        Ok(())
    }
    fn insert_at(&mut self, graph: &mut RepeatGraph, idx: usize, alignment: ReadAlignment) {
        let mut edges = alignment.edges();
        graph.pin_edges(&edges);
        edges.sort();
        edges.dedup();
        for e in edges {
            self.by_edge.entry(e).or_default().push(idx);
        }
        self.alignments[idx] = Some(alignment);
    }
    /// Moves the alignments going through `in_edge -> repeat -> out_edge`
    /// (or entering/leaving the repeat through one of them and ending inside it)
    /// onto `copy`, an edge spelling the same sequence as `repeat`.
    pub fn reroute(
        &mut self,
        graph: &mut RepeatGraph,
        in_edge: EdgeId,
        repeat: EdgeId,
        out_edge: EdgeId,
        copy: EdgeId,
    ) -> usize {
        let idxs = self.by_edge.get(&repeat).cloned().unwrap_or_default();
        let mut rerouted = 0;
        for idx in idxs {
            let mut alignment = match self.alignments[idx].take() {
                Some(alignment) => alignment,
                None => continue,
            };
            let len = alignment.chain.len();
            let targets: Vec<usize> = (0..len)
                .filter(|&i| alignment.chain[i].edge == repeat)
                .filter(|&i| {
                    let prev = if i > 0 {
                        Some(alignment.chain[i - 1].edge)
                    } else {
                        None
                    };
                    let next = alignment.chain.get(i + 1).map(|c| c.edge);
                    match (prev, next) {
                        (Some(p), Some(n)) => p == in_edge && n == out_edge,
                        (Some(p), None) => p == in_edge,
                        (None, Some(n)) => n == out_edge,
                        (None, None) => false,
                    }
                })
                .collect();
            if targets.is_empty() {
                self.alignments[idx] = Some(alignment);
                continue;
            }
            let old_edges = alignment.edges();
            for e in old_edges.iter() {
                if let Some(idxs) = self.by_edge.get_mut(e) {
                    idxs.retain(|&i| i != idx);
                }
            }
            graph.unpin_edges(&old_edges);
            for i in targets {
                alignment.chain[i].edge = copy;
            }
            self.insert_at(graph, idx, alignment);
            rerouted += 1;
        }
        self.by_edge.retain(|_, idxs| !idxs.is_empty());
        rerouted
    }
    /// Number of alignments through each (in-edge, out-edge) pair, optionally
    /// via an edge in between.
    pub fn count_transitions(
        &self,
        in_edges: &[EdgeId],
        via: Option<EdgeId>,
        out_edges: &[EdgeId],
    ) -> HashMap<(EdgeId, EdgeId), usize> {
        let mut counts: HashMap<(EdgeId, EdgeId), usize> = HashMap::new();
        let mut candidates: Vec<usize> = match via {
            Some(via) => self.by_edge.get(&via).cloned().unwrap_or_default(),
            None => in_edges
                .iter()
                .filter_map(|e| self.by_edge.get(e))
                .flat_map(|idxs| idxs.iter().copied())
                .collect(),
        };
        candidates.sort();
        candidates.dedup();
        for alignment in candidates.iter().filter_map(|&i| self.alignments[i].as_ref()) {
            for &i in in_edges {
                for &o in out_edges {
                    let hit = match via {
                        Some(via) => alignment.contains_traversal(i, via, o),
                        None => alignment.contains_transition(i, o),
                    };
                    if hit {
                        *counts.entry((i, o)).or_default() += 1;
                    }
                }
            }
        }
        counts
    }
}

// Chains the overlaps of a read into the best walk in the graph.
fn chain_overlaps(
    graph: &RepeatGraph,
    config: &Config,
    overlaps: &[OverlapRange<EdgeId>],
) -> Vec<EdgeAlignment> {
    let mut overlaps: Vec<OverlapRange<EdgeId>> = overlaps
        .iter()
        .filter(|o| {
            let fits = graph.edge(o.target).map_or(false, |e| e.length == o.target_len);
            if !(fits && o.is_well_formed()) {
                debug!("Dropping malformed overlap {}", o);
            }
            fits && o.is_well_formed()
        })
        .filter(|o| o.query_span() >= config.min_overlap && !o.is_empty())
        .filter_map(|o| match o.strand {
            Strand::Forward => Some(*o),
            Strand::Reverse => graph.edge(o.target).map(|e| o.to_forward(e.rc)),
        })
        .filter(|o| graph.contains_edge(o.target))
        .collect();
    if overlaps.is_empty() {
        return vec![];
    }
    overlaps.sort_by_key(|o| (o.query_start, o.query_end, o.target, o.target_start));
    let gap = config.max_chain_gap as i64;
    let compatible = |prev: &OverlapRange<EdgeId>, next: &OverlapRange<EdgeId>| -> bool {
        if prev.query_start >= next.query_start || prev.query_end > next.query_end {
            return false;
        }
        let read_gap = next.query_start as i64 - prev.query_end as i64;
        let graph_gap = if prev.target == next.target {
            if prev.target_end > next.target_start + config.max_chain_gap {
                return false;
            }
            next.target_start as i64 - prev.target_end as i64
        } else {
            let adjacent = match (graph.edge(prev.target), graph.edge(next.target)) {
                (Some(p), Some(n)) => p.sink == n.source,
                _ => false,
            };
            if !adjacent || !graph.is_connection_allowed(prev.target, next.target) {
                return false;
            }
            (prev.target_len.saturating_sub(prev.target_end) + next.target_start) as i64
        };
        (read_gap - graph_gap).abs() <= gap
    };
    // Best total aligned length of a chain ending at each overlap.
    let mut scores: Vec<usize> = overlaps.iter().map(|o| o.query_span()).collect();
    let mut predecessors: Vec<Option<usize>> = vec![None; overlaps.len()];
    for i in 0..overlaps.len() {
        for j in 0..i {
            if compatible(&overlaps[j], &overlaps[i]) {
                let score = scores[j] + overlaps[i].query_span();
                if score > scores[i] {
                    scores[i] = score;
                    predecessors[i] = Some(j);
                }
            }
        }
    }
    // Ties go to the earliest overlap.
    let mut best = 0;
    for i in 1..overlaps.len() {
        if scores[i] > scores[best] {
            best = i;
        }
    }
    let mut picked = vec![best];
    while let Some(prev) = predecessors[picked[picked.len() - 1]] {
        picked.push(prev);
    }
    picked.reverse();
    let mut chain: Vec<EdgeAlignment> = vec![];
    for o in picked.into_iter().map(|i| &overlaps[i]) {
        match chain.last_mut() {
            Some(last) if last.edge == o.target && last.edge_end <= o.target_start + config.max_chain_gap => {
                last.read_end = o.query_end;
                last.edge_end = o.target_end.max(last.edge_end);
            }
            _ => chain.push(EdgeAlignment {
                edge: o.target,
                read_start: o.query_start,
                read_end: o.query_end,
                edge_start: o.target_start,
                edge_end: o.target_end,
            }),
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttributes, SeqSegment};
    fn piece(start: usize, end: usize) -> SeqSegment {
        SeqSegment::new(SeqId::forward(0), 100_000, start, end)
    }
    fn overlap(target: EdgeId, q: (usize, usize), t: (usize, usize), len: usize) -> OverlapRange<EdgeId> {
        OverlapRange {
            target,
            query_start: q.0,
            query_end: q.1,
            target_start: t.0,
            target_end: t.1,
            target_len: len,
            strand: Strand::Forward,
            score: q.1 - q.0,
        }
    }
    // u -e1-> v -e2-> w, and v -e3-> x
    fn graph() -> (RepeatGraph, EdgeId, EdgeId, EdgeId) {
        let mut graph = RepeatGraph::new();
        let (u, _) = graph.add_node_pair();
        let (v, _) = graph.add_node_pair();
        let (w, _) = graph.add_node_pair();
        let (x, _) = graph.add_node_pair();
        let attrs = EdgeAttributes::default();
        let e1 = graph.add_edge(u, v, vec![piece(0, 10_000)], attrs).unwrap();
        let e2 = graph.add_edge(v, w, vec![piece(10_000, 20_000)], attrs).unwrap();
        let e3 = graph.add_edge(v, x, vec![piece(30_000, 40_000)], attrs).unwrap();
        (graph, e1, e2, e3)
    }
    fn config() -> Config {
        Config {
            min_overlap: 1_000,
            ..Config::default()
        }
    }
    #[test]
    fn chains_adjacent_edges() {
        let (graph, e1, e2, e3) = graph();
        let overlaps = vec![
            overlap(e1, (0, 4_000), (6_000, 10_000), 10_000),
            overlap(e2, (4_050, 9_000), (0, 4_950), 10_000),
            // A shorter branch.
            overlap(e3, (4_000, 6_000), (0, 2_000), 10_000),
        ];
        let chain = chain_overlaps(&graph, &config(), &overlaps);
        let edges: Vec<_> = chain.iter().map(|c| c.edge).collect();
        assert_eq!(edges, vec![e1, e2]);
        assert_eq!(chain[1].read_end, 9_000);
    }
    #[test]
    fn gap_and_forbidden() {
        let (mut graph, e1, e2, _) = graph();
        let far = vec![
            overlap(e1, (0, 4_000), (6_000, 10_000), 10_000),
            overlap(e2, (10_000, 15_000), (0, 5_000), 10_000),
        ];
        assert_eq!(chain_overlaps(&graph, &config(), &far).len(), 1);
        let near = vec![
            overlap(e1, (0, 4_000), (6_000, 10_000), 10_000),
            overlap(e2, (4_000, 9_000), (0, 5_000), 10_000),
        ];
        assert_eq!(chain_overlaps(&graph, &config(), &near).len(), 2);
        graph.forbid_connection(e1, e2).unwrap();
        assert_eq!(chain_overlaps(&graph, &config(), &near).len(), 1);
    }
    #[test]
    fn short_overlaps_are_discarded() {
        let (graph, e1, _, _) = graph();
        let overlaps = vec![overlap(e1, (0, 999), (0, 999), 10_000)];
        assert!(chain_overlaps(&graph, &config(), &overlaps).is_empty());
    }
    #[test]
    fn malformed_overlaps_are_dropped() {
        let (graph, e1, e2, _) = graph();
        // Ends past the edge.
        let mut ovlp = overlap(e1, (0, 3_000), (8_000, 11_000), 10_000);
        ovlp.strand = Strand::Reverse;
        assert!(chain_overlaps(&graph, &config(), &[ovlp]).is_empty());
        // Claims a length the edge does not have.
        let ovlp = overlap(e2, (0, 3_000), (0, 3_000), 12_000);
        assert!(chain_overlaps(&graph, &config(), &[ovlp]).is_empty());
        let ovlp = OverlapRange {
            query_start: 3_000,
            query_end: 0,
            ..overlap(e2, (0, 3_000), (0, 3_000), 10_000)
        };
        assert!(chain_overlaps(&graph, &config(), &[ovlp]).is_empty());
        let ovlp = overlap(e2, (0, 3_000), (0, 3_000), 10_000);
        assert_eq!(chain_overlaps(&graph, &config(), &[ovlp]).len(), 1);
    }
    #[test]
    fn reverse_strand() {
        let (graph, e1, _, _) = graph();
        let rc1 = graph.complement_edge(e1).unwrap();
        let mut ovlp = overlap(e1, (0, 3_000), (0, 3_000), 10_000);
        ovlp.strand = Strand::Reverse;
        let chain = chain_overlaps(&graph, &config(), &[ovlp]);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].edge, rc1);
        assert_eq!((chain[0].edge_start, chain[0].edge_end), (7_000, 10_000));
    }
    #[test]
    fn storage_and_pins() {
        let (mut graph, e1, e2, _) = graph();
        let mut aligner = ReadAligner::new(&config());
        let alignment = ReadAlignment {
            read: SeqId::forward(3),
            read_len: 9_000,
            chain: vec![
                EdgeAlignment {
                    edge: e1,
                    read_start: 0,
                    read_end: 4_000,
                    edge_start: 6_000,
                    edge_end: 10_000,
                },
                EdgeAlignment {
                    edge: e2,
                    read_start: 4_000,
                    read_end: 9_000,
                    edge_start: 0,
                    edge_end: 5_000,
                },
            ],
        };
        aligner.add_alignment(&mut graph, alignment).unwrap();
        assert_eq!(aligner.num_alignments(), 2);
        let rc2 = graph.complement_edge(e2).unwrap();
        let complement = aligner.alignments_on(rc2)[0];
        assert_eq!(complement.read, SeqId::forward(3).rc());
        assert_eq!(complement.chain[0].edge_start, 5_000);
        assert_eq!(complement.chain[0].read_start, 0);
        assert_eq!(graph.references(e1), 1);
        assert!(graph.remove_edge(e1, false).is_err());
        let counts = aligner.count_transitions(&[e1], None, &[e2]);
        assert_eq!(counts.get(&(e1, e2)), Some(&1));
        assert_eq!(aligner.remove_alignments_on(&mut graph, e1).unwrap(), 2);
        assert_eq!(graph.references(e1), 0);
        graph.remove_edge(e1, false).unwrap();
    }
}
