//! The repeat graph. Nodes and edges live in flat arenas addressed by
//! integer ids; every cross reference (source/sink, incident edges,
//! reverse complement) is an id. Each edge has a reverse-complement
//! partner (possibly itself, for a palindromic segment), and each node
//! has a partner node, so that `rc(e).source == rc(e.sink)` and
//! `rc(e).sink == rc(e.source)` always hold.
use crate::sequence::{SeqId, SequenceProvider};
use crate::{RepeatGraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An interval [start, end) of a sequence in the sequence container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqSegment {
    pub seq: SeqId,
    pub seq_len: usize,
    pub start: usize,
    pub end: usize,
}

impl std::fmt::Display for SeqSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.seq, self.start, self.end)
    }
}

impl SeqSegment {
    pub fn new(seq: SeqId, seq_len: usize, start: usize, end: usize) -> Self {
        assert!(start <= end && end <= seq_len);
        Self {
            seq,
            seq_len,
            start,
            end,
        }
    }
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
    pub fn complement(&self) -> Self {
        Self {
            seq: self.seq.rc(),
            seq_len: self.seq_len,
            start: self.seq_len - self.end,
            end: self.seq_len - self.start,
        }
    }
    /// True if `next` continues this interval on the same sequence.
    pub fn is_followed_by(&self, next: &Self) -> bool {
        self.seq == next.seq && self.end == next.start
    }
}

/// Concatenates adjacent collinear pieces.
pub fn coalesce_segments(segments: &[SeqSegment]) -> Vec<SeqSegment> {
    let mut result: Vec<SeqSegment> = Vec::with_capacity(segments.len());
    for seg in segments.iter().filter(|s| !s.is_empty()) {
        match result.last_mut() {
            Some(last) if last.is_followed_by(seg) => last.end = seg.end,
            _ => result.push(*seg),
        }
    }
    result
}

fn complement_segments(segments: &[SeqSegment]) -> Vec<SeqSegment> {
    segments.iter().rev().map(SeqSegment::complement).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub rc: NodeId,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
}

impl Node {
    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }
    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }
    pub fn is_isolated(&self) -> bool {
        self.in_edges.is_empty() && self.out_edges.is_empty()
    }
    /// One way in, one way out.
    pub fn is_bypass(&self) -> bool {
        self.in_edges.len() == 1 && self.out_edges.len() == 1
    }
    pub fn is_self_complement(&self) -> bool {
        self.id == self.rc
    }
}

/// A directed piece of sequence between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub sink: NodeId,
    pub rc: EdgeId,
    /// Pieces of the container, concatenated to spell the edge.
    pub segments: Vec<SeqSegment>,
    pub length: usize,
    /// How many segments of the draft assembly were collapsed onto this edge.
    pub copies: usize,
    /// Copy-number estimate. Zero means the edge is logically removed.
    pub multiplicity: u32,
    pub mean_coverage: f64,
    pub resolved: bool,
    /// Kept apart from parallel edges because it is a separate haplotype.
    pub haplotype: bool,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}({})\t{}->{}\t{}bp\tx{}\tcov:{:.1}",
            self.id, self.rc, self.source, self.sink, self.length, self.multiplicity, self.mean_coverage
        )?;
        if self.resolved {
            write!(f, "\tresolved")?;
        }
        if self.haplotype {
            write!(f, "\thaplotype")?;
        }
        Ok(())
    }
}

impl Edge {
    pub fn is_loop(&self) -> bool {
        self.source == self.sink
    }
    pub fn is_self_complement(&self) -> bool {
        self.id == self.rc
    }
    pub fn is_repetitive(&self) -> bool {
        self.multiplicity > 1
    }
    pub fn is_tombstone(&self) -> bool {
        self.multiplicity == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeAttributes {
    pub copies: usize,
    pub multiplicity: u32,
    pub resolved: bool,
    pub haplotype: bool,
}

impl Default for EdgeAttributes {
    fn default() -> Self {
        Self {
            copies: 1,
            multiplicity: 1,
            resolved: false,
            haplotype: false,
        }
    }
}

/// The multigraph. It exclusively owns all the nodes and the edges.
#[derive(Debug, Clone, Default)]
pub struct RepeatGraph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    generation: u64,
    // Number of live alignments pinning each edge.
    references: HashMap<EdgeId, usize>,
    // (in-edge, out-edge) pairs no path may use.
    forbidden: HashSet<(EdgeId, EdgeId)>,
}

impl std::fmt::Display for RepeatGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let repeats = self.edges().filter(|e| e.is_repetitive()).count();
        let length = self.edges().map(|e| e.length).sum::<usize>();
        write!(
            f,
            "Nodes:{}\tEdges:{}\tRepeats:{}\tTotalLength:{}\tGeneration:{}",
            self.num_nodes(),
            self.num_edges(),
            repeats,
            length,
            self.generation
        )
    }
}

impl RepeatGraph {
    pub fn new() -> Self {
        Self::default()
    }
    /// Advanced by every topology mutation. Derived views compare against it.
    pub fn generation(&self) -> u64 {
        self.generation
    }
    fn bump(&mut self) {
        self.generation += 1;
    }
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0).and_then(|e| e.as_ref())
    }
    pub fn node_checked(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(RepeatGraphError::UnknownNode(id))
    }
    pub fn edge_checked(&self, id: EdgeId) -> Result<&Edge> {
        self.edge(id).ok_or(RepeatGraphError::UnknownEdge(id))
    }
    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(RepeatGraphError::UnknownNode(id))
    }
    fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge> {
        self.edges
            .get_mut(id.0)
            .and_then(|e| e.as_mut())
            .ok_or(RepeatGraphError::UnknownEdge(id))
    }
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edge(id).is_some()
    }
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(|e| e.as_ref())
    }
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges().map(|e| e.id).collect()
    }
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }
    pub fn num_nodes(&self) -> usize {
        self.nodes().count()
    }
    pub fn num_edges(&self) -> usize {
        self.edges().count()
    }
    /// One edge per reverse-complement pair, the one with the smaller id.
    pub fn canonical_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges().filter(|e| e.id <= e.rc)
    }
    pub fn complement_edge(&self, id: EdgeId) -> Result<EdgeId> {
        self.edge_checked(id).map(|e| e.rc)
    }
    pub fn complement_node(&self, id: NodeId) -> Result<NodeId> {
        self.node_checked(id).map(|n| n.rc)
    }
    pub fn source(&self, id: EdgeId) -> Result<NodeId> {
        self.edge_checked(id).map(|e| e.source)
    }
    pub fn sink(&self, id: EdgeId) -> Result<NodeId> {
        self.edge_checked(id).map(|e| e.sink)
    }
    pub fn in_edges(&self, id: NodeId) -> Result<&[EdgeId]> {
        self.node_checked(id).map(|n| n.in_edges.as_slice())
    }
    pub fn out_edges(&self, id: NodeId) -> Result<&[EdgeId]> {
        self.node_checked(id).map(|n| n.out_edges.as_slice())
    }

    /// Creates a node and its complementary node.
    pub fn add_node_pair(&mut self) -> (NodeId, NodeId) {
        let (fwd, rev) = (NodeId(self.nodes.len()), NodeId(self.nodes.len() + 1));
        self.nodes.push(Some(Node {
            id: fwd,
            rc: rev,
            in_edges: vec![],
            out_edges: vec![],
        }));
        self.nodes.push(Some(Node {
            id: rev,
            rc: fwd,
            in_edges: vec![],
            out_edges: vec![],
        }));
        self.bump();
        (fwd, rev)
    }
    /// Creates a node that is its own complement.
    pub fn add_self_complement_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            id,
            rc: id,
            in_edges: vec![],
            out_edges: vec![],
        }));
        self.bump();
        id
    }

    /// Inserts an edge `source -> sink` spelled by `segments`, together with
    /// its complement `rc(sink) -> rc(source)`. Returns the id of the former.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        sink: NodeId,
        segments: Vec<SeqSegment>,
        attrs: EdgeAttributes,
    ) -> Result<EdgeId> {
        let rc_source = self.complement_node(sink)?;
        let rc_sink = self.complement_node(source)?;
        let segments = coalesce_segments(&segments);
        let rc_segments = complement_segments(&segments);
        let (fwd, rev) = (EdgeId(self.edges.len()), EdgeId(self.edges.len() + 1));
        let forward = Self::new_edge(fwd, rev, source, sink, segments, attrs);
        let reverse = Self::new_edge(rev, fwd, rc_source, rc_sink, rc_segments, attrs);
        self.edges.push(Some(forward));
        self.edges.push(Some(reverse));
        self.attach(fwd)?;
        self.attach(rev)?;
        self.bump();
        Ok(fwd)
    }
    /// Inserts an edge that is its own complement. `sink` should be `rc(source)`.
    pub fn add_self_complement_edge(
        &mut self,
        source: NodeId,
        segments: Vec<SeqSegment>,
        attrs: EdgeAttributes,
    ) -> Result<EdgeId> {
        let sink = self.complement_node(source)?;
        let id = EdgeId(self.edges.len());
        let segments = coalesce_segments(&segments);
        self.edges
            .push(Some(Self::new_edge(id, id, source, sink, segments, attrs)));
        self.attach(id)?;
        self.bump();
        Ok(id)
    }
    fn new_edge(
        id: EdgeId,
        rc: EdgeId,
        source: NodeId,
        sink: NodeId,
        segments: Vec<SeqSegment>,
        attrs: EdgeAttributes,
    ) -> Edge {
        let length = segments.iter().map(|s| s.len()).sum();
        Edge {
            id,
            source,
            sink,
            rc,
            segments,
            length,
            copies: attrs.copies,
            multiplicity: attrs.multiplicity,
            mean_coverage: 0.,
            resolved: attrs.resolved,
            haplotype: attrs.haplotype,
        }
    }
    fn attach(&mut self, id: EdgeId) -> Result<()> {
        let (source, sink) = {
            let edge = self.edge_checked(id)?;
            (edge.source, edge.sink)
        };
        self.node_mut(source)?.out_edges.push(id);
        self.node_mut(sink)?.in_edges.push(id);
        Ok(())
    }
    fn detach(&mut self, id: EdgeId) -> Result<()> {
        let (source, sink) = {
            let edge = self.edge_checked(id)?;
            (edge.source, edge.sink)
        };
        self.node_mut(source)?.out_edges.retain(|&e| e != id);
        self.node_mut(sink)?.in_edges.retain(|&e| e != id);
        Ok(())
    }

    /// Removes the edge and its complement. Fails if a live alignment still
    /// pins either of them, unless `force` is set. Paths holding the edge
    /// are stale afterwards and get regenerated at the next generation.
    pub fn remove_edge(&mut self, id: EdgeId, force: bool) -> Result<()> {
        let rc = self.complement_edge(id)?;
        if !force {
            for e in [id, rc].iter() {
                let references = self.references(*e);
                if references > 0 {
                    return Err(RepeatGraphError::DanglingReference {
                        edge: *e,
                        references,
                    });
                }
            }
        }
        self.detach(id)?;
        if rc != id {
            self.detach(rc)?;
        }
        self.edges[id.0] = None;
        self.edges[rc.0] = None;
        self.references.remove(&id);
        self.references.remove(&rc);
        self.forbidden
            .retain(|&(a, b)| a != id && a != rc && b != id && b != rc);
        self.bump();
        Ok(())
    }

    /// Moves the given in-edges (as sinks) and out-edges (as sources) of `node`
    /// to a newly created node, and mirrors the move on the complementary node.
    pub fn split_node(
        &mut self,
        node: NodeId,
        in_edges: &[EdgeId],
        out_edges: &[EdgeId],
    ) -> Result<NodeId> {
        let current = self.node_checked(node)?;
        if current.is_self_complement() {
            return Err(RepeatGraphError::invariant(format!(
                "cannot split self-complementary node {}",
                node
            )));
        }
        let rc_node = current.rc;
        for e in in_edges {
            if !current.in_edges.contains(e) {
                return Err(RepeatGraphError::invariant(format!(
                    "{} is not an in-edge of {}",
                    e, node
                )));
            }
        }
        for e in out_edges {
            if !current.out_edges.contains(e) {
                return Err(RepeatGraphError::invariant(format!(
                    "{} is not an out-edge of {}",
                    e, node
                )));
            }
        }
        let moved = in_edges.iter().chain(out_edges.iter());
        for &e in moved {
            if self.edge_checked(e)?.is_self_complement() {
                return Err(RepeatGraphError::invariant(format!(
                    "cannot move self-complementary edge {}",
                    e
                )));
            }
        }
        let (new_node, new_rc) = self.add_node_pair();
        for &e in in_edges {
            let rc = self.complement_edge(e)?;
            self.node_mut(node)?.in_edges.retain(|&x| x != e);
            self.edge_mut(e)?.sink = new_node;
            self.node_mut(new_node)?.in_edges.push(e);
            self.node_mut(rc_node)?.out_edges.retain(|&x| x != rc);
            self.edge_mut(rc)?.source = new_rc;
            self.node_mut(new_rc)?.out_edges.push(rc);
        }
        for &e in out_edges {
            let rc = self.complement_edge(e)?;
            self.node_mut(node)?.out_edges.retain(|&x| x != e);
            self.edge_mut(e)?.source = new_node;
            self.node_mut(new_node)?.out_edges.push(e);
            self.node_mut(rc_node)?.in_edges.retain(|&x| x != rc);
            self.edge_mut(rc)?.sink = new_rc;
            self.node_mut(new_rc)?.in_edges.push(rc);
        }
        self.bump();
        Ok(new_node)
    }

    /// Removes every node without incident edges. Returns the number of nodes removed.
    pub fn remove_isolated_nodes(&mut self) -> usize {
        let isolated: Vec<_> = self
            .nodes()
            .filter(|n| n.is_isolated())
            .filter(|n| self.node(n.rc).map(|m| m.is_isolated()).unwrap_or(true))
            .map(|n| n.id)
            .collect();
        for &id in isolated.iter() {
            self.nodes[id.0] = None;
        }
        if !isolated.is_empty() {
            self.bump();
        }
        isolated.len()
    }

    /// Drops unreferenced tombstones (multiplicity 0) and isolated nodes.
    pub fn compact(&mut self) -> Result<usize> {
        let tombstones: Vec<_> = self
            .canonical_edges()
            .filter(|e| e.is_tombstone())
            .filter(|e| self.references(e.id) == 0 && self.references(e.rc) == 0)
            .map(|e| e.id)
            .collect();
        for &e in tombstones.iter() {
            self.remove_edge(e, false)?;
        }
        let nodes = self.remove_isolated_nodes();
        debug!("Compaction removed {} tombstones, {} nodes", tombstones.len(), nodes);
        Ok(tombstones.len())
    }

    pub fn set_multiplicity(&mut self, id: EdgeId, multiplicity: u32) -> Result<()> {
        let rc = self.complement_edge(id)?;
        self.edge_mut(id)?.multiplicity = multiplicity;
        self.edge_mut(rc)?.multiplicity = multiplicity;
        Ok(())
    }
    pub fn set_coverage(&mut self, id: EdgeId, coverage: f64) -> Result<()> {
        let rc = self.complement_edge(id)?;
        self.edge_mut(id)?.mean_coverage = coverage;
        self.edge_mut(rc)?.mean_coverage = coverage;
        Ok(())
    }
    pub fn set_resolved(&mut self, id: EdgeId, resolved: bool) -> Result<()> {
        let rc = self.complement_edge(id)?;
        self.edge_mut(id)?.resolved = resolved;
        self.edge_mut(rc)?.resolved = resolved;
        Ok(())
    }
    pub fn set_haplotype(&mut self, id: EdgeId, haplotype: bool) -> Result<()> {
        let rc = self.complement_edge(id)?;
        self.edge_mut(id)?.haplotype = haplotype;
        self.edge_mut(rc)?.haplotype = haplotype;
        Ok(())
    }

    /// Registers live references (alignments) to the edges.
    pub fn pin_edges(&mut self, edges: &[EdgeId]) {
        for &e in edges {
            *self.references.entry(e).or_default() += 1;
        }
    }
    pub fn unpin_edges(&mut self, edges: &[EdgeId]) {
        for e in edges {
            if let Some(count) = self.references.get_mut(e) {
                *count -= 1;
                if *count == 0 {
                    self.references.remove(e);
                }
            }
        }
    }
    pub fn references(&self, id: EdgeId) -> usize {
        self.references.get(&id).copied().unwrap_or(0)
    }

    /// Forbids paths going through `in_edge` then `out_edge` (and the complementary transition).
    pub fn forbid_connection(&mut self, in_edge: EdgeId, out_edge: EdgeId) -> Result<bool> {
        let (rc_in, rc_out) = (self.complement_edge(in_edge)?, self.complement_edge(out_edge)?);
        if self.sink(in_edge)? != self.source(out_edge)? {
            return Err(RepeatGraphError::invariant(format!(
                "{} and {} are not adjacent",
                in_edge, out_edge
            )));
        }
        let inserted = self.forbidden.insert((in_edge, out_edge));
        self.forbidden.insert((rc_out, rc_in));
        Ok(inserted)
    }
    pub fn is_connection_allowed(&self, in_edge: EdgeId, out_edge: EdgeId) -> bool {
        !self.forbidden.contains(&(in_edge, out_edge))
    }
    pub fn forbidden_connections(&self) -> impl Iterator<Item = &(EdgeId, EdgeId)> {
        self.forbidden.iter()
    }

    /// The sequence of the edge.
    pub fn edge_sequence<S: SequenceProvider>(&self, id: EdgeId, seqs: &S) -> Result<Vec<u8>> {
        let edge = self.edge_checked(id)?;
        let mut seq = Vec::with_capacity(edge.length);
        for segment in edge.segments.iter() {
            let template = seqs.sequence(segment.seq)?;
            if template.len() < segment.end {
                return Err(RepeatGraphError::invariant(format!(
                    "segment {} of {} exceeds its sequence",
                    segment, id
                )));
            }
            seq.extend_from_slice(&template[segment.start..segment.end]);
        }
        Ok(seq)
    }

    /// Checks the pairing and adjacency invariants. Any error means the graph is corrupted.
    pub fn check_invariants(&self) -> Result<()> {
        for edge in self.edges() {
            let rc = self.edge(edge.rc).ok_or_else(|| {
                RepeatGraphError::invariant(format!("complement of {} is missing", edge.id))
            })?;
            if rc.rc != edge.id {
                return Err(RepeatGraphError::invariant(format!(
                    "complement of {} is not an involution",
                    edge.id
                )));
            }
            let (source, sink) = (self.node_checked(edge.source)?, self.node_checked(edge.sink)?);
            if rc.source != sink.rc || rc.sink != source.rc {
                return Err(RepeatGraphError::invariant(format!(
                    "{} and {} are not complementary",
                    edge.id, rc.id
                )));
            }
            if !source.out_edges.contains(&edge.id) || !sink.in_edges.contains(&edge.id) {
                return Err(RepeatGraphError::invariant(format!(
                    "{} is not registered at its nodes",
                    edge.id
                )));
            }
            if edge.length != edge.segments.iter().map(|s| s.len()).sum::<usize>() {
                return Err(RepeatGraphError::invariant(format!(
                    "length of {} is stale",
                    edge.id
                )));
            }
            if edge.multiplicity != rc.multiplicity || edge.length != rc.length {
                return Err(RepeatGraphError::invariant(format!(
                    "{} and {} disagree",
                    edge.id, rc.id
                )));
            }
        }
        for node in self.nodes() {
            let rc = self.node(node.rc).ok_or_else(|| {
                RepeatGraphError::invariant(format!("complement of {} is missing", node.id))
            })?;
            if rc.rc != node.id {
                return Err(RepeatGraphError::invariant(format!(
                    "complement of {} is not an involution",
                    node.id
                )));
            }
            let edges = node.in_edges.iter().map(|&e| (e, true));
            let edges = edges.chain(node.out_edges.iter().map(|&e| (e, false)));
            for (e, is_in) in edges {
                let edge = self.edge(e).ok_or_else(|| {
                    RepeatGraphError::invariant(format!("{} refers to a dead edge {}", node.id, e))
                })?;
                let end = if is_in { edge.sink } else { edge.source };
                if end != node.id {
                    return Err(RepeatGraphError::invariant(format!(
                        "{} is not incident to {}",
                        e, node.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A walk through the graph. Paths are views regenerated from the topology
/// (see `GraphProcessor::edges_paths`), so they never pin their edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub id: usize,
    pub edges: Vec<EdgeId>,
    pub circular: bool,
}

impl std::fmt::Display for GraphPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let edges: Vec<_> = self.edges.iter().map(|e| format!("{}", e)).collect();
        write!(f, "path_{}[{}]", self.id, edges.join(","))?;
        if self.circular {
            write!(f, "(circular)")?;
        }
        Ok(())
    }
}

impl GraphPath {
    pub fn new(id: usize, edges: Vec<EdgeId>, circular: bool) -> Self {
        Self {
            id,
            edges,
            circular,
        }
    }
    pub fn first(&self) -> EdgeId {
        self.edges[0]
    }
    pub fn last(&self) -> EdgeId {
        self.edges[self.edges.len() - 1]
    }
    /// Consecutive edges share nodes, so the length is the sum of the edge lengths.
    pub fn length(&self, graph: &RepeatGraph) -> usize {
        self.edges
            .iter()
            .filter_map(|&e| graph.edge(e))
            .map(|e| e.length)
            .sum()
    }
    /// Length-weighted mean coverage of the edges.
    pub fn mean_coverage(&self, graph: &RepeatGraph) -> f64 {
        let (sum, len) = self
            .edges
            .iter()
            .filter_map(|&e| graph.edge(e))
            .fold((0., 0), |(sum, len), e| {
                (sum + e.mean_coverage * e.length as f64, len + e.length)
            });
        if len == 0 {
            0.
        } else {
            sum / len as f64
        }
    }
    pub fn is_valid(&self, graph: &RepeatGraph) -> bool {
        let edges: Option<Vec<_>> = self.edges.iter().map(|&e| graph.edge(e)).collect();
        let edges = match edges {
            Some(edges) if !edges.is_empty() => edges,
            _ => return false,
        };
        let adjacent = edges.windows(2).all(|w| w[0].sink == w[1].source);
        let closed = !self.circular || edges[edges.len() - 1].sink == edges[0].source;
        adjacent && closed
    }
    pub fn is_repetitive(&self, graph: &RepeatGraph) -> bool {
        self.edges
            .iter()
            .filter_map(|&e| graph.edge(e))
            .any(|e| e.is_repetitive())
    }
}
