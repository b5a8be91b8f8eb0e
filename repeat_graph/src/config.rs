use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_KMER_SIZE: usize = 15;
pub const DEFAULT_MIN_OVERLAP: usize = 5_000;
pub const DEFAULT_THREADS: usize = 1;

/// Every threshold used by the repeat graph engine.
/// A JSON file may set any subset of the fields; the rest fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// k-mer (seed) size of the overlap index.
    pub kmer_size: usize,
    /// Overlaps shorter than this (in read coordinates) are discarded before chaining.
    pub min_overlap: usize,
    /// Size of the worker pool used while aligning reads.
    pub threads: usize,
    /// Repeat boundaries closer than this are glued into the same node.
    pub max_repeat_separation: usize,
    /// Minimum self-alignment length inside the draft assembly to be regarded as a repeat.
    pub min_repeat_length: usize,
    /// k-mers occurring more often than this are not used as seeds.
    pub max_kmer_occurrences: usize,
    /// Minimum number of seed hits on a diagonal band to report an overlap.
    pub min_seed_hits: usize,
    /// Width of a diagonal band.
    pub seed_band: usize,
    /// Largest discrepancy between read gap and graph gap when chaining two overlaps.
    pub max_chain_gap: usize,
    /// Tips longer than this are never removed.
    pub max_tip_length: usize,
    /// A tip is weakly supported if its coverage is below this fraction of the mean coverage.
    pub tip_coverage_rate: f64,
    /// Parallel paths longer than this are never collapsed.
    pub max_bubble_length: usize,
    /// Relative length difference allowed between the two branches of a bubble.
    pub bubble_length_tolerance: f64,
    /// Absolute length difference always allowed between the two branches of a bubble.
    pub bubble_min_tolerance: usize,
    /// Fraction of the total (length-weighted) graph presumed to be single-copy.
    pub unique_length_fraction: f64,
    /// Largest distance between coverage ratio and its rounded value to be a confident estimate.
    pub multiplicity_confidence: f64,
    /// Edges with fewer supporting reads than this may be pruned.
    pub min_edge_support: usize,
    /// Edges at least this long are never pruned for low support.
    pub min_edge_length: usize,
    /// Relative coverage difference under which two parallel edges are indistinguishable.
    pub haplotype_coverage_tolerance: f64,
    /// Minimum number of spanning reads for an (in-edge, out-edge) pair to be used in resolution.
    pub min_spanning_reads: usize,
    /// Upper bound on the number of simplification rounds.
    pub max_simplify_rounds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kmer_size: DEFAULT_KMER_SIZE,
            min_overlap: DEFAULT_MIN_OVERLAP,
            threads: DEFAULT_THREADS,
            max_repeat_separation: 500,
            min_repeat_length: DEFAULT_MIN_OVERLAP,
            max_kmer_occurrences: 500,
            min_seed_hits: 4,
            seed_band: 500,
            max_chain_gap: 1_500,
            max_tip_length: 20_000,
            tip_coverage_rate: 0.5,
            max_bubble_length: 50_000,
            bubble_length_tolerance: 0.1,
            bubble_min_tolerance: 500,
            unique_length_fraction: 0.5,
            multiplicity_confidence: 0.25,
            min_edge_support: 3,
            min_edge_length: 10_000,
            haplotype_coverage_tolerance: 0.3,
            min_spanning_reads: 5,
            max_simplify_rounds: 100,
        }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "KmerSize:{}", self.kmer_size)?;
        writeln!(f, "MinOverlap:{}", self.min_overlap)?;
        writeln!(f, "Threads:{}", self.threads)?;
        writeln!(
            f,
            "Repeats:separation={},min_len={}",
            self.max_repeat_separation, self.min_repeat_length
        )?;
        writeln!(
            f,
            "Seeds:max_occ={},min_hits={},band={},chain_gap={}",
            self.max_kmer_occurrences, self.min_seed_hits, self.seed_band, self.max_chain_gap
        )?;
        writeln!(
            f,
            "Tips:max_len={},cov_rate={:.3}",
            self.max_tip_length, self.tip_coverage_rate
        )?;
        writeln!(
            f,
            "Bubbles:max_len={},tolerance={:.3}/{}",
            self.max_bubble_length, self.bubble_length_tolerance, self.bubble_min_tolerance
        )?;
        writeln!(
            f,
            "Multiplicity:unique_frac={:.3},confidence={:.3}",
            self.unique_length_fraction, self.multiplicity_confidence
        )?;
        writeln!(
            f,
            "Support:min_reads={},min_len={},haplotype_tol={:.3}",
            self.min_edge_support, self.min_edge_length, self.haplotype_coverage_tolerance
        )?;
        write!(f, "Resolution:min_spanning_reads={}", self.min_spanning_reads)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::de::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::de::from_str(json)?)
    }
    /// Overrides the values the command line injects.
    pub fn with_parameters(mut self, kmer_size: usize, min_overlap: usize, threads: usize) -> Self {
        self.kmer_size = kmer_size;
        self.min_overlap = min_overlap;
        self.threads = threads.max(1);
        self
    }
}
