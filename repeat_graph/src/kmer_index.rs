//! A k-mer seed index used as the default overlap service.
//! Each target is indexed on the given strand only; callers index
//! reverse complements as separate targets (the graph already contains
//! the complementary edge of every edge).
use crate::graph::{EdgeId, RepeatGraph};
use crate::overlap::{OverlapRange, OverlapService, Strand};
use crate::sequence::SequenceProvider;
use crate::Config;
use metrohash::MetroHashMap;

const MAX_K: usize = 32;

#[derive(Debug, Clone)]
pub struct KmerIndex<T> {
    k: usize,
    max_occurrences: usize,
    min_hits: usize,
    band: usize,
    max_gap: usize,
    targets: Vec<(T, usize)>,
    index: MetroHashMap<u64, Vec<(u32, u32)>>,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    target: u32,
    query_pos: usize,
    target_pos: usize,
}

impl Hit {
    fn diagonal(&self) -> i64 {
        self.target_pos as i64 - self.query_pos as i64
    }
}

#[inline]
fn encode(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Enumerates (position, packed k-mer) of the given sequence, skipping windows with ambiguous bases.
pub fn kmers(seq: &[u8], k: usize) -> Vec<(usize, u64)> {
    let mask = if k == MAX_K { !0 } else { (1u64 << (2 * k)) - 1 };
    let mut result = Vec::with_capacity(seq.len());
    let (mut kmer, mut valid) = (0u64, 0usize);
    for (idx, &base) in seq.iter().enumerate() {
        match encode(base) {
            Some(code) => {
                kmer = ((kmer << 2) | code) & mask;
                valid += 1;
            }
            None => {
                kmer = 0;
                valid = 0;
            }
        }
        if valid >= k {
            result.push((idx + 1 - k, kmer));
        }
    }
    result
}

impl<T: Copy + Send + Sync> KmerIndex<T> {
    pub fn new(c: &Config) -> Self {
        Self {
            k: c.kmer_size.max(1).min(MAX_K),
            max_occurrences: c.max_kmer_occurrences,
            min_hits: c.min_seed_hits.max(1),
            band: c.seed_band.max(1),
            max_gap: c.max_chain_gap.max(c.seed_band),
            targets: vec![],
            index: MetroHashMap::default(),
        }
    }
    pub fn k(&self) -> usize {
        self.k
    }
    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }
    pub fn add_target(&mut self, target: T, seq: &[u8]) {
        let idx = self.targets.len() as u32;
        self.targets.push((target, seq.len()));
        for (pos, kmer) in kmers(seq, self.k) {
            self.index.entry(kmer).or_default().push((idx, pos as u32));
        }
    }
    fn collect_hits(&self, query: &[u8]) -> Vec<Hit> {
        kmers(query, self.k)
            .into_iter()
            .filter_map(|(qpos, kmer)| self.index.get(&kmer).map(|hits| (qpos, hits)))
            .filter(|(_, hits)| hits.len() <= self.max_occurrences)
            .flat_map(|(query_pos, hits)| {
                hits.iter().map(move |&(target, tpos)| Hit {
                    target,
                    query_pos,
                    target_pos: tpos as usize,
                })
            })
            .collect()
    }
    /// Finds collinear runs of seed hits between the query and every target.
    pub fn find_overlaps(&self, query: &[u8]) -> Vec<OverlapRange<T>> {
        let mut hits = self.collect_hits(query);
        hits.sort_by_key(|h| (h.target, h.diagonal(), h.query_pos));
        let mut overlaps = vec![];
        let mut start = 0;
        while start < hits.len() {
            // Single-linkage clustering along diagonals within a target.
            let mut end = start + 1;
            while end < hits.len()
                && hits[end].target == hits[start].target
                && hits[end].diagonal() - hits[end - 1].diagonal() <= self.band as i64
            {
                end += 1;
            }
            if end - start >= self.min_hits {
                let mut cluster = hits[start..end].to_vec();
                cluster.sort_by_key(|h| (h.query_pos, std::cmp::Reverse(h.target_pos)));
                for chain in self.split_chain(longest_collinear_chain(&cluster)) {
                    if chain.len() >= self.min_hits {
                        overlaps.push(self.to_overlap(&chain));
                    }
                }
            }
            start = end;
        }
        overlaps.sort_by_key(|o| (o.query_start, o.query_end));
        overlaps
    }
    fn split_chain(&self, chain: Vec<Hit>) -> Vec<Vec<Hit>> {
        let mut chains: Vec<Vec<Hit>> = vec![];
        for hit in chain {
            match chains.last_mut() {
                Some(last) if hit.query_pos - last[last.len() - 1].query_pos <= self.max_gap => {
                    last.push(hit)
                }
                _ => chains.push(vec![hit]),
            }
        }
        chains
    }
    fn to_overlap(&self, chain: &[Hit]) -> OverlapRange<T> {
        let (first, last) = (chain[0], chain[chain.len() - 1]);
        let (target, target_len) = self.targets[first.target as usize];
        OverlapRange {
            target,
            query_start: first.query_pos,
            query_end: last.query_pos + self.k,
            target_start: first.target_pos,
            target_end: (last.target_pos + self.k).min(target_len),
            target_len,
            strand: Strand::Forward,
            score: chain.len(),
        }
    }
}

// Longest chain of hits strictly increasing in both coordinates.
// The input should be sorted by the query position, and hits sharing a query position
// by descending target position, so that they never chain with each other.
fn longest_collinear_chain(hits: &[Hit]) -> Vec<Hit> {
    // tails[l] = index of the smallest tail of an increasing chain of length l+1.
    let mut tails: Vec<usize> = vec![];
    let mut predecessors: Vec<Option<usize>> = vec![None; hits.len()];
    for (idx, hit) in hits.iter().enumerate() {
        let position = tails.partition_point(|&t| hits[t].target_pos < hit.target_pos);
        predecessors[idx] = if position > 0 {
            Some(tails[position - 1])
        } else {
            None
        };
        if position == tails.len() {
            tails.push(idx);
        } else {
            tails[position] = idx;
        }
    }
    let mut chain = vec![];
    let mut current = tails.last().copied();
    while let Some(idx) = current {
        chain.push(hits[idx]);
        current = predecessors[idx];
    }
    chain.reverse();
    chain
}

impl KmerIndex<EdgeId> {
    /// Indexes every live edge of the graph.
    pub fn from_graph<S: SequenceProvider>(
        graph: &RepeatGraph,
        seqs: &S,
        c: &Config,
    ) -> crate::Result<Self> {
        let mut index = Self::new(c);
        for edge in graph.edges() {
            let seq = graph.edge_sequence(edge.id, seqs)?;
            index.add_target(edge.id, &seq);
        }
        debug!(
            "Indexed {} edges ({} distinct k-mers)",
            index.num_targets(),
            index.index.len()
        );
        Ok(index)
    }
}

impl OverlapService for KmerIndex<EdgeId> {
    fn overlaps(&self, query: &[u8]) -> Vec<OverlapRange<EdgeId>> {
        self.find_overlaps(query)
    }
}
