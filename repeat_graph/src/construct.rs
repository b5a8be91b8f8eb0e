//! Building the initial repeat graph from a draft assembly.
//! Repeat copies found by self-alignment of the assembly are glued
//! together, so that every repeated segment becomes a single edge.
use crate::find_union::FindUnion;
use crate::graph::{EdgeAttributes, NodeId, RepeatGraph, SeqSegment};
use crate::kmer_index::KmerIndex;
use crate::sequence::{SeqId, SequenceProvider};
use crate::{Config, Result};
use std::collections::{BTreeMap, HashMap};

/// A pair of similar regions in the draft assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepeatAlignment {
    pub query: SeqId,
    pub query_start: usize,
    pub query_end: usize,
    pub query_len: usize,
    pub target: SeqId,
    pub target_start: usize,
    pub target_end: usize,
    pub target_len: usize,
}

impl std::fmt::Display for RepeatAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}\t{}:{}-{}",
            self.query, self.query_start, self.query_end, self.target, self.target_start, self.target_end
        )
    }
}

impl RepeatAlignment {
    pub fn len(&self) -> usize {
        (self.query_end - self.query_start).min(self.target_end - self.target_start)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The same alignment seen from the target.
    pub fn swap(&self) -> Self {
        Self {
            query: self.target,
            query_start: self.target_start,
            query_end: self.target_end,
            query_len: self.target_len,
            target: self.query,
            target_start: self.query_start,
            target_end: self.query_end,
            target_len: self.query_len,
        }
    }
    /// The same alignment between the reverse complements.
    pub fn complement(&self) -> Self {
        Self {
            query: self.query.rc(),
            query_start: self.query_len - self.query_end,
            query_end: self.query_len - self.query_start,
            query_len: self.query_len,
            target: self.target.rc(),
            target_start: self.target_len - self.target_end,
            target_end: self.target_len - self.target_start,
            target_len: self.target_len,
        }
    }
    /// Maps a query position inside the alignment onto the target by linear interpolation.
    pub fn project(&self, pos: usize) -> Option<usize> {
        if pos < self.query_start || self.query_end < pos {
            return None;
        }
        let qspan = (self.query_end - self.query_start).max(1) as u64;
        let tspan = (self.target_end - self.target_start) as u64;
        let offset = (pos - self.query_start) as u64 * tspan / qspan;
        Some((self.target_start + offset as usize).min(self.target_end))
    }
}

/// Finds repeated regions of the assembly, on both strands, that are at
/// least `min_repeat_length` long. The result is closed under swapping
/// query/target and under taking reverse complements.
pub fn detect_repeats<S: SequenceProvider>(
    seqs: &S,
    contigs: &[SeqId],
    c: &Config,
) -> Result<Vec<RepeatAlignment>> {
    let mut index: KmerIndex<SeqId> = KmerIndex::new(c);
    for &id in contigs {
        index.add_target(id, seqs.sequence(id)?);
        index.add_target(id.rc(), seqs.sequence(id.rc())?);
    }
    let mut repeats = vec![];
    for &query in contigs {
        let seq = seqs.sequence(query)?;
        for ovlp in index.find_overlaps(seq) {
            let trivial = ovlp.target == query
                && (ovlp.target_start as i64 - ovlp.query_start as i64).abs() <= c.seed_band as i64;
            if trivial || ovlp.len() < c.min_repeat_length {
                continue;
            }
            let aln = RepeatAlignment {
                query,
                query_start: ovlp.query_start,
                query_end: ovlp.query_end,
                query_len: seq.len(),
                target: ovlp.target,
                target_start: ovlp.target_start,
                target_end: ovlp.target_end,
                target_len: ovlp.target_len,
            };
            debug!("Repeat {}", aln);
            repeats.push(aln);
        }
    }
    Ok(symmetric_closure(&repeats))
}

fn symmetric_closure(repeats: &[RepeatAlignment]) -> Vec<RepeatAlignment> {
    let mut closure: Vec<_> = repeats
        .iter()
        .flat_map(|r| vec![*r, r.swap(), r.complement(), r.swap().complement()])
        .collect();
    closure.sort_by_key(|r| (r.query, r.query_start, r.query_end, r.target, r.target_start));
    closure.dedup();
    closure
}

#[derive(Debug, Clone, Copy)]
struct Gluepoint {
    seq: SeqId,
    pos: usize,
    len: usize,
    mirror: usize,
}

// Gluepoints with their mirror images and the classes of glued points.
struct Gluepoints {
    points: Vec<Gluepoint>,
    positions: HashMap<SeqId, BTreeMap<usize, usize>>,
    classes: FindUnion,
    separation: usize,
}

impl Gluepoints {
    fn new(separation: usize) -> Self {
        Self {
            points: vec![],
            positions: HashMap::new(),
            classes: FindUnion::new(0),
            separation,
        }
    }
    // A point on the same strand within the separation, if any.
    fn nearest(&self, seq: SeqId, pos: usize, len: usize) -> Option<usize> {
        let positions = self.positions.get(&seq)?;
        let lower = pos.saturating_sub(self.separation);
        positions
            .range(lower..=pos + self.separation)
            .filter(|&(&q, _)| !((q == 0 && pos == len) || (q == len && pos == 0)))
            .min_by_key(|&(&q, _)| (q as i64 - pos as i64).abs())
            .map(|(_, &idx)| idx)
    }
    // Returns the index of the point and whether it is new.
    fn insert(&mut self, seq: SeqId, pos: usize, len: usize) -> (usize, bool) {
        if let Some(idx) = self.nearest(seq, pos, len) {
            return (idx, false);
        }
        let (fwd, rev) = (self.points.len(), self.points.len() + 1);
        self.points.push(Gluepoint {
            seq,
            pos,
            len,
            mirror: rev,
        });
        self.points.push(Gluepoint {
            seq: seq.rc(),
            pos: len - pos,
            len,
            mirror: fwd,
        });
        self.classes.push();
        self.classes.push();
        self.positions.entry(seq).or_default().insert(pos, fwd);
        self.positions.entry(seq.rc()).or_default().insert(len - pos, rev);
        (fwd, true)
    }
    fn unite(&mut self, a: usize, b: usize) {
        let (ma, mb) = (self.points[a].mirror, self.points[b].mirror);
        self.classes.unite(a, b);
        self.classes.unite(ma, mb);
    }
    fn class(&mut self, idx: usize) -> usize {
        self.classes.find(idx)
    }
    // Points on the given strand, sorted by position.
    fn cuts(&self, seq: SeqId) -> Vec<usize> {
        self.positions
            .get(&seq)
            .map(|ps| ps.values().copied().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    seq: SeqId,
    len: usize,
    start: usize,
    end: usize,
    from: usize,
    to: usize,
}

impl RepeatGraph {
    /// Builds the graph from the contigs of a draft assembly and the repeats inside them.
    /// Every contig is cut at its gluepoints; segments that are copies of each other
    /// become a single edge whose `copies` counts them.
    pub fn build<S: SequenceProvider>(
        seqs: &S,
        contigs: &[SeqId],
        repeats: &[RepeatAlignment],
        c: &Config,
    ) -> Result<Self> {
        let repeats = symmetric_closure(repeats);
        let mut by_query: HashMap<SeqId, Vec<RepeatAlignment>> = HashMap::new();
        for r in repeats.iter() {
            by_query.entry(r.query).or_default().push(*r);
        }
        let mut gluepoints = Gluepoints::new(c.max_repeat_separation);
        let mut stack = vec![];
        for &id in contigs {
            let len = seqs.length(id)?;
            for &pos in &[0, len] {
                let (idx, new) = gluepoints.insert(id, pos, len);
                if new {
                    stack.push(idx);
                    stack.push(gluepoints.points[idx].mirror);
                }
            }
        }
        for r in repeats.iter() {
            for &pos in &[r.query_start, r.query_end] {
                let (idx, new) = gluepoints.insert(r.query, pos, r.query_len);
                if new {
                    stack.push(idx);
                    stack.push(gluepoints.points[idx].mirror);
                }
            }
        }
        // Project every point onto the other copies until nothing changes.
        while let Some(idx) = stack.pop() {
            let point = gluepoints.points[idx];
            let alignments = match by_query.get(&point.seq) {
                Some(alns) => alns,
                None => continue,
            };
            for aln in alignments {
                if let Some(pos) = aln.project(point.pos) {
                    let (projected, new) = gluepoints.insert(aln.target, pos, aln.target_len);
                    gluepoints.unite(idx, projected);
                    if new {
                        stack.push(projected);
                        stack.push(gluepoints.points[projected].mirror);
                    }
                }
            }
        }
        debug!("{} gluepoints", gluepoints.points.len());
        // Cut the contigs.
        let mut segments: Vec<Segment> = vec![];
        let mut segment_index: HashMap<SeqId, Vec<usize>> = HashMap::new();
        for &id in contigs {
            let cuts = gluepoints.cuts(id);
            for w in cuts.windows(2) {
                let (from, to) = (gluepoints.points[w[0]], gluepoints.points[w[1]]);
                segment_index.entry(id).or_default().push(segments.len());
                segments.push(Segment {
                    seq: id,
                    len: from.len,
                    start: from.pos,
                    end: to.pos,
                    from: w[0],
                    to: w[1],
                });
            }
        }
        // Glue the aligned segments. 2i is the i-th segment, 2i+1 its complement.
        let mut glued = FindUnion::new(2 * segments.len());
        for (i, segment) in segments.iter().enumerate() {
            let middle = (segment.start + segment.end) / 2;
            let alignments = by_query.get(&segment.seq).map(|x| x.as_slice()).unwrap_or(&[]);
            for aln in alignments {
                let pos = match aln.project(middle) {
                    Some(pos) => pos,
                    None => continue,
                };
                let (forward, pos) = if aln.target.strand() {
                    (aln.target, pos)
                } else {
                    (aln.target.rc(), aln.target_len - pos)
                };
                let j = match segment_index.get(&forward).and_then(|idxs| {
                    idxs.iter()
                        .find(|&&j| segments[j].start <= pos && pos < segments[j].end)
                }) {
                    Some(&j) => j,
                    None => continue,
                };
                let flip = !aln.target.strand() as usize;
                glued.unite(2 * i, 2 * j + flip);
                glued.unite(2 * i + 1, 2 * j + (1 - flip));
            }
        }
        let mut graph = RepeatGraph::new();
        let mut nodes: HashMap<usize, NodeId> = HashMap::new();
        let mut node_of = |graph: &mut RepeatGraph, gluepoints: &mut Gluepoints, point: usize| {
            let class = gluepoints.class(point);
            if let Some(&node) = nodes.get(&class) {
                return node;
            }
            let mirror = gluepoints.class(gluepoints.points[point].mirror);
            if class == mirror {
                let node = graph.add_self_complement_node();
                nodes.insert(class, node);
                node
            } else {
                let (fwd, rev) = graph.add_node_pair();
                nodes.insert(class, fwd);
                nodes.insert(mirror, rev);
                fwd
            }
        };
        let mut groups: BTreeMap<(usize, NodeId, NodeId), Vec<usize>> = BTreeMap::new();
        for x in 0..2 * segments.len() {
            let segment = segments[x / 2];
            let (from, to) = if x % 2 == 0 {
                (segment.from, segment.to)
            } else {
                let points = &gluepoints.points;
                (points[segment.to].mirror, points[segment.from].mirror)
            };
            let from = node_of(&mut graph, &mut gluepoints, from);
            let to = node_of(&mut graph, &mut gluepoints, to);
            groups
                .entry((glued.find(x), from, to))
                .or_default()
                .push(x);
        }
        let mut used = vec![false; 2 * segments.len()];
        for ((_, from, to), members) in groups {
            if used[members[0]] {
                continue;
            }
            let x = members[0];
            let segment = segments[x / 2];
            let piece = SeqSegment::new(segment.seq, segment.len, segment.start, segment.end);
            let piece = if x % 2 == 0 { piece } else { piece.complement() };
            let palindromic = members.iter().any(|&m| members.contains(&(m ^ 1)));
            let copies = if palindromic {
                members.len() / 2
            } else {
                members.len()
            };
            let attrs = EdgeAttributes {
                copies: copies.max(1),
                ..EdgeAttributes::default()
            };
            let edge = if palindromic && graph.complement_node(from)? == to {
                graph.add_self_complement_edge(from, vec![piece], attrs)?
            } else {
                graph.add_edge(from, to, vec![piece], attrs)?
            };
            debug!("Added {} ({} copies)", edge, attrs.copies);
            for &m in members.iter() {
                used[m] = true;
                used[m ^ 1] = true;
            }
        }
        info!("Built the repeat graph. {}", graph);
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceContainer;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;
    fn random_seq<R: Rng>(rng: &mut R, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }
    fn config() -> Config {
        Config {
            min_repeat_length: 1_000,
            max_repeat_separation: 100,
            ..Config::default()
        }
    }
    #[test]
    fn projection() {
        let aln = RepeatAlignment {
            query: SeqId::forward(0),
            query_start: 100,
            query_end: 300,
            query_len: 1_000,
            target: SeqId::forward(1),
            target_start: 500,
            target_end: 700,
            target_len: 800,
        };
        assert_eq!(aln.project(150), Some(550));
        assert_eq!(aln.project(50), None);
        let rc = aln.complement();
        assert_eq!((rc.query_start, rc.query_end), (700, 900));
        assert_eq!((rc.target_start, rc.target_end), (100, 300));
        assert_eq!(aln.swap().swap(), aln);
        assert_eq!(rc.complement(), aln);
    }
    #[test]
    fn single_contig() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(10);
        let mut seqs = SequenceContainer::new();
        let id = seqs.add_sequence("ctg", &random_seq(&mut rng, 5_000)).unwrap();
        let c = config();
        let repeats = detect_repeats(&seqs, &[id], &c).unwrap();
        assert!(repeats.is_empty());
        let graph = RepeatGraph::build(&seqs, &[id], &repeats, &c).unwrap();
        graph.check_invariants().unwrap();
        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.num_nodes(), 4);
        let edge = graph.edges().next().unwrap();
        assert_eq!(edge.length, 5_000);
        let seq = graph.edge_sequence(edge.id, &seqs).unwrap();
        let rc = graph.edge_sequence(edge.rc, &seqs).unwrap();
        assert_eq!(crate::sequence::revcmp(&seq), rc);
    }
    #[test]
    fn shared_repeat() {
        // ctg1 = a R b, ctg2 = c R d
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(11);
        let repeat = random_seq(&mut rng, 3_000);
        let mut seqs = SequenceContainer::new();
        let ctg1 = [random_seq(&mut rng, 4_000), repeat.clone(), random_seq(&mut rng, 4_000)].concat();
        let ctg2 = [random_seq(&mut rng, 5_000), repeat, random_seq(&mut rng, 3_000)].concat();
        let ids = vec![
            seqs.add_sequence("ctg1", &ctg1).unwrap(),
            seqs.add_sequence("ctg2", &ctg2).unwrap(),
        ];
        let c = config();
        let repeats = detect_repeats(&seqs, &ids, &c).unwrap();
        assert!(!repeats.is_empty());
        let graph = RepeatGraph::build(&seqs, &ids, &repeats, &c).unwrap();
        graph.check_invariants().unwrap();
        // Four unique flanks and one repeat, on both strands.
        assert_eq!(graph.num_edges(), 10);
        let collapsed: Vec<_> = graph.edges().filter(|e| e.copies == 2).collect();
        assert_eq!(collapsed.len(), 2);
        assert!(collapsed.iter().all(|e| (e.length as i64 - 3_000).abs() < 100));
        let node = graph.node(collapsed[0].source).unwrap();
        assert_eq!(node.in_degree(), 2);
    }
}
