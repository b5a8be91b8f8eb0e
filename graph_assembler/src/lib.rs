#[macro_use]
extern crate log;
extern crate bio;
extern crate repeat_graph;
pub mod output;
use repeat_graph::contig_extender::{describe_paths, Contig};
use repeat_graph::{
    construct, Config, ContigExtender, GraphProcessor, KmerIndex, MultiplicityInferer, ReadAligner,
    RepeatGraph, RepeatResolver, Result, SequenceContainer,
};
use std::path::PathBuf;

/// Inputs of one assembly run.
#[derive(Debug, Clone)]
pub struct Args {
    pub in_assembly: PathBuf,
    pub reads_files: Vec<PathBuf>,
    pub out_folder: PathBuf,
    pub config: Config,
    /// Extending contigs beyond the unbranching paths is not done;
    /// the flag is kept so that command lines stay valid.
    pub graph_continue: bool,
}

impl Args {
    /// Reads the configuration file and applies the command line values on top of it.
    pub fn new(
        in_assembly: PathBuf,
        reads_files: Vec<PathBuf>,
        out_folder: PathBuf,
        config_path: Option<PathBuf>,
        (kmer_size, min_overlap, threads): (usize, usize, usize),
    ) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        Ok(Self {
            in_assembly,
            reads_files,
            out_folder,
            config: config.with_parameters(kmer_size, min_overlap, threads),
            graph_continue: false,
        })
    }
}

/// Runs the whole pipeline, writing the intermediate and final graphs into
/// `out_folder`. Returns the contigs.
pub fn run(args: &Args) -> Result<Vec<Contig>> {
    let c = &args.config;
    let out = |name: &str| args.out_folder.join(name);
    std::fs::create_dir_all(&args.out_folder)?;
    debug!("Config\n{}", c);
    if args.graph_continue {
        warn!("Contig extension through the graph is not supported. Reporting unbranching paths.");
    }
    info!("Reading sequences");
    let mut assembly = SequenceContainer::new();
    assembly.load_from_file(&args.in_assembly)?;
    let mut reads = SequenceContainer::new();
    for file in args.reads_files.iter() {
        reads.load_from_file(file)?;
    }
    info!(
        "{} contigs ({} bp), {} reads ({} bp)",
        assembly.len(),
        assembly.total_length(),
        reads.len(),
        reads.total_length()
    );

    info!("Building repeat graph");
    let contigs: Vec<_> = assembly.ids().collect();
    let repeats = construct::detect_repeats(&assembly, &contigs, c)?;
    let mut graph = RepeatGraph::build(&assembly, &contigs, &repeats, c)?;
    let mut processor = GraphProcessor::new(c);
    let paths = describe_paths(&graph, processor.edges_paths(&graph));
    output::write_dot(&graph, out("graph_raw.dot"))?;
    output::write_gfa(&graph, &paths, &assembly, out("graph_raw.gfa"))?;
    processor.simplify(&mut graph)?;

    info!("Aligning reads to the graph");
    let index = KmerIndex::from_graph(&graph, &assembly, c)?;
    let mut aligner = ReadAligner::new(c);
    let read_ids: Vec<_> = reads.ids().collect();
    aligner.align_reads(&mut graph, &reads, &read_ids, &index)?;

    info!("Inferring multiplicities");
    let mut inferer = MultiplicityInferer::new(c);
    inferer.estimate_coverage(&mut graph, &aligner)?;
    inferer.remove_unsupported_edges(&mut graph, &mut aligner)?;
    inferer.remove_unsupported_connections(&mut graph, &aligner)?;
    inferer.separate_haplotypes(&mut graph, &aligner)?;

    info!("Resolving repeats");
    let mut resolver = RepeatResolver::new(c);
    resolver.find_repeats(&graph);
    let paths = describe_paths(&graph, processor.edges_paths(&graph));
    output::write_dot(&graph, out("graph_before_rr.dot"))?;
    output::write_gfa(&graph, &paths, &assembly, out("graph_before_rr.gfa"))?;
    output::write_paths_fasta(&graph, &paths, &assembly, out("graph_before_rr.fasta"))?;
    resolver.resolve_repeats(&mut graph, &mut aligner)?;
    output::write_repeats_dump(resolver.junctions(), &aligner, &reads, out("repeats_dump.txt"))?;
    resolver.fix_long_edges(&mut graph, &mut aligner, &mut processor)?;
    let paths = describe_paths(&graph, processor.edges_paths(&graph));
    output::write_dot(&graph, out("graph_after_rr.dot"))?;
    output::write_gfa(&graph, &paths, &assembly, out("graph_after_rr.gfa"))?;
    output::write_paths_fasta(&graph, &paths, &assembly, out("graph_paths.fasta"))?;

    info!("Generating contigs");
    let mut extender = ContigExtender::new();
    let paths = extender.generate_unbranching_paths(&graph).to_vec();
    let contigs = extender.generate_contigs(&graph, &assembly)?;
    output::write_contigs(&contigs, out("contigs.fasta"))?;
    output::write_contig_stats(&contigs, out("contigs_stats.txt"))?;
    output::write_dot(&graph, out("graph_final.dot"))?;
    output::write_gfa(&graph, &paths, &assembly, out("graph_final.gfa"))?;
    output::write_paths_fasta(&graph, &paths, &assembly, out("graph_final.fasta"))?;
    info!("Done. {} contigs in {:?}", contigs.len(), args.out_folder);
    Ok(contigs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;
    use std::io::Write;
    fn random_seq<R: Rng>(rng: &mut R, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }
    fn write_fasta(path: &std::path::Path, records: &[(String, Vec<u8>)]) {
        let mut wtr = std::fs::File::create(path).unwrap();
        for (name, seq) in records {
            writeln!(wtr, ">{}\n{}", name, String::from_utf8_lossy(seq)).unwrap();
        }
    }
    #[test]
    fn single_contig_pipeline() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(3);
        let dir = std::env::temp_dir().join(format!("graph_assembler_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let contig = random_seq(&mut rng, 6_000);
        write_fasta(&dir.join("assembly.fa"), &[("ctg".to_string(), contig.clone())]);
        let reads: Vec<_> = (0..8)
            .map(|i| (format!("read{}", i), contig[i * 400..i * 400 + 2_500].to_vec()))
            .collect();
        write_fasta(&dir.join("reads.fa"), &reads);
        let config = Config {
            min_repeat_length: 1_000,
            ..Config::default()
        };
        let mut args = Args::new(
            dir.join("assembly.fa"),
            vec![dir.join("reads.fa")],
            dir.join("out"),
            None,
            (15, 1_000, 2),
        )
        .unwrap();
        args.config = Config {
            kmer_size: 15,
            min_overlap: 1_000,
            threads: 2,
            ..config
        };
        let contigs = run(&args).unwrap();
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].seq.len(), 6_000);
        for name in &[
            "graph_raw.dot",
            "graph_raw.gfa",
            "graph_before_rr.gfa",
            "graph_after_rr.gfa",
            "graph_paths.fasta",
            "repeats_dump.txt",
            "contigs_stats.txt",
            "graph_final.gfa",
        ] {
            assert!(dir.join("out").join(name).exists(), "{}", name);
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
