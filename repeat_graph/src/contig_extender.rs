//! Contigs from the resolved graph.
use crate::graph::{EdgeId, GraphPath, RepeatGraph};
use crate::graph_processing::unbranching_runs;
use crate::sequence::SequenceProvider;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A maximal unbranching path of the final graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbranchingPath {
    pub path: GraphPath,
    pub length: usize,
    pub mean_coverage: f64,
    pub repetitive: bool,
    /// Id of the path spelling the reverse complement.
    pub rc_id: usize,
    /// No edge enters the first node, no edge leaves the last one.
    pub isolated: bool,
}

impl std::fmt::Display for UnbranchingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}bp\tcov:{:.1}\trc:{}{}",
            self.path,
            self.length,
            self.mean_coverage,
            self.rc_id,
            if self.repetitive { "\trepetitive" } else { "" }
        )
    }
}

impl UnbranchingPath {
    pub fn id(&self) -> usize {
        self.path.id
    }
    pub fn circular(&self) -> bool {
        self.path.circular
    }
    pub fn edges(&self) -> &[EdgeId] {
        &self.path.edges
    }
    /// The sequence of the path. Consecutive edges share a node, so the
    /// sequences are simply concatenated.
    pub fn spell<S: SequenceProvider>(&self, graph: &RepeatGraph, seqs: &S) -> Result<Vec<u8>> {
        let mut seq = Vec::with_capacity(self.length);
        for &e in self.path.edges.iter() {
            seq.extend(graph.edge_sequence(e, seqs)?);
        }
        Ok(seq)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contig {
    pub name: String,
    pub path_id: usize,
    pub seq: Vec<u8>,
    pub coverage: f64,
    pub circular: bool,
    pub repetitive: bool,
    pub multiplicity: u32,
}

impl std::fmt::Display for Contig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{:.0}\t{}\t{}\t{}",
            self.name,
            self.seq.len(),
            self.coverage,
            if self.circular { "+" } else { "-" },
            if self.repetitive { "+" } else { "-" },
            self.multiplicity
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContigExtender {
    paths: Vec<UnbranchingPath>,
}

impl ContigExtender {
    pub fn new() -> Self {
        Self::default()
    }
    /// Decomposes the graph into maximal unbranching paths, and pairs every
    /// path with its reverse complement.
    pub fn generate_unbranching_paths(&mut self, graph: &RepeatGraph) -> &[UnbranchingPath] {
        let paths: Vec<_> = unbranching_runs(graph)
            .into_iter()
            .enumerate()
            .map(|(id, (edges, circular))| GraphPath::new(id, edges, circular))
            .collect();
        self.paths = describe_paths(graph, &paths);
        debug!("{} unbranching paths", self.paths.len());
        &self.paths
    }
    pub fn unbranching_paths(&self) -> &[UnbranchingPath] {
        &self.paths
    }
    /// Spells one contig per reverse-complement pair of paths. Repetitive
    /// paths are skipped unless they make up a whole component.
    pub fn generate_contigs<S: SequenceProvider>(&self, graph: &RepeatGraph, seqs: &S) -> Result<Vec<Contig>> {
        let mut contigs = vec![];
        for path in self.paths.iter() {
            if path.rc_id < path.id() || (path.repetitive && !path.isolated) {
                continue;
            }
            let multiplicity = path
                .edges()
                .iter()
                .filter_map(|&e| graph.edge(e))
                .map(|e| e.multiplicity)
                .max()
                .unwrap_or(1);
            contigs.push(Contig {
                name: format!("contig_{}", contigs.len() + 1),
                path_id: path.id(),
                seq: path.spell(graph, seqs)?,
                coverage: path.mean_coverage,
                circular: path.circular(),
                repetitive: path.repetitive,
                multiplicity,
            });
        }
        info!(
            "Generated {} contigs ({} bp)",
            contigs.len(),
            contigs.iter().map(|c| c.seq.len()).sum::<usize>()
        );
        Ok(contigs)
    }
}

/// Annotates the paths of an unbranching decomposition with their length,
/// coverage, and the id of the path spelling their reverse complement.
pub fn describe_paths(graph: &RepeatGraph, paths: &[GraphPath]) -> Vec<UnbranchingPath> {
    let mut path_of: HashMap<EdgeId, usize> = HashMap::new();
    for path in paths.iter() {
        for &e in path.edges.iter() {
            path_of.insert(e, path.id);
        }
    }
    paths
        .iter()
        .filter(|path| !path.edges.is_empty())
        .map(|path| {
            let rc_id = graph
                .edge(path.first())
                .and_then(|e| path_of.get(&e.rc))
                .copied()
                .unwrap_or(path.id);
            let isolated = match (graph.edge(path.first()), graph.edge(path.last())) {
                (Some(first), Some(last)) => {
                    let start = graph.node(first.source).map(|n| n.in_degree()).unwrap_or(0);
                    let end = graph.node(last.sink).map(|n| n.out_degree()).unwrap_or(0);
                    path.circular || (start == 0 && end == 0)
                }
                _ => false,
            };
            UnbranchingPath {
                length: path.length(graph),
                mean_coverage: path.mean_coverage(graph),
                repetitive: path.is_repetitive(graph),
                rc_id,
                isolated,
                path: path.clone(),
            }
        })
        .collect()
}

/// The header of the contig statistics table.
pub const STATS_HEADER: &str = "#seq_name\tlength\tcoverage\tcircular\trepeat\tmult";

/// Tab-delimited statistics of the contigs, one line per contig.
pub fn stats(contigs: &[Contig]) -> String {
    let mut lines = vec![STATS_HEADER.to_string()];
    lines.extend(contigs.iter().map(|c| format!("{}", c)));
    lines.join("\n") + "\n"
}
