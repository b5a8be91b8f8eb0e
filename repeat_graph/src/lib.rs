#[macro_use]
extern crate log;
extern crate bio;
extern crate metrohash;
extern crate rayon;
extern crate serde;
extern crate serde_json;
extern crate thiserror;
#[cfg(test)]
extern crate rand;
#[cfg(test)]
extern crate rand_xoshiro;
pub mod bipartite_matching;
mod config;
pub use config::*;
pub mod construct;
pub mod contig_extender;
mod error;
pub use error::{RepeatGraphError, Result};
mod find_union;
pub mod graph;
pub use graph::{EdgeId, GraphPath, NodeId, RepeatGraph};
pub mod graph_processing;
pub use graph_processing::GraphProcessor;
pub mod kmer_index;
pub use kmer_index::KmerIndex;
pub mod multiplicity_inferer;
pub use multiplicity_inferer::MultiplicityInferer;
pub mod overlap;
pub use overlap::{OverlapRange, OverlapService, Strand};
pub mod read_aligner;
pub use read_aligner::ReadAligner;
pub mod repeat_resolver;
pub use repeat_resolver::RepeatResolver;
pub mod sequence;
pub use sequence::{SeqId, SequenceContainer, SequenceProvider};
pub use contig_extender::ContigExtender;
#[cfg(test)]
mod tests;
