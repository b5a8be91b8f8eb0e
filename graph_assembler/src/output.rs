//! Writers for the graph, the repeats, and the contigs.
use bio::io::fasta;
use repeat_graph::contig_extender::{self, Contig, UnbranchingPath};
use repeat_graph::repeat_resolver::Junction;
use repeat_graph::{EdgeId, ReadAligner, RepeatGraph, SeqId, SequenceProvider};
use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::Path;

fn color(graph: &RepeatGraph, edge: EdgeId) -> &'static str {
    match graph.edge(edge) {
        Some(e) if e.is_repetitive() => "red",
        Some(e) if e.resolved => "blue",
        Some(e) if e.haplotype => "darkgreen",
        _ => "black",
    }
}

/// The graph in DOT. Edges are labelled by id, length, coverage, and multiplicity.
pub fn to_dot(graph: &RepeatGraph) -> String {
    let mut lines = vec!["digraph {".to_string(), "  nodesep = 0.5;".to_string()];
    lines.push("  node [shape = circle, label = \"\", height = 0.3];".to_string());
    for node in graph.nodes() {
        lines.push(format!("  \"{}\";", node.id));
    }
    for edge in graph.edges() {
        lines.push(format!(
            "  \"{}\" -> \"{}\" [label = \"id {} {}bp {:.1}x x{}\", color = \"{}\"];",
            edge.source,
            edge.sink,
            edge.id,
            edge.length,
            edge.mean_coverage,
            edge.multiplicity,
            color(graph, edge.id)
        ));
    }
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}

pub fn write_dot<P: AsRef<Path>>(graph: &RepeatGraph, path: P) -> std::io::Result<()> {
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    wtr.write_all(to_dot(graph).as_bytes())
}

fn path_name(path: &UnbranchingPath) -> String {
    format!("edge_{}", path.id().min(path.rc_id))
}

// Orientation of the path relative to its segment.
fn orient(path: &UnbranchingPath) -> char {
    if path.id() <= path.rc_id {
        '+'
    } else {
        '-'
    }
}

fn flip(sign: char) -> char {
    if sign == '+' {
        '-'
    } else {
        '+'
    }
}

/// The graph in GFA 1.0. Every reverse-complement pair of unbranching paths is
/// one segment, and paths meeting at a node are linked.
pub fn to_gfa<S: SequenceProvider>(
    graph: &RepeatGraph,
    paths: &[UnbranchingPath],
    seqs: &S,
) -> repeat_graph::Result<String> {
    let mut lines = vec!["H\tVN:Z:1.0".to_string()];
    for path in paths.iter().filter(|p| p.id() <= p.rc_id) {
        let seq = path.spell(graph, seqs)?;
        let kmer_count = (path.mean_coverage * path.length as f64) as usize;
        lines.push(format!(
            "S\t{}\t{}\tKC:i:{}",
            path_name(path),
            String::from_utf8_lossy(&seq),
            kmer_count
        ));
    }
    let mut starting_at: HashMap<_, Vec<&UnbranchingPath>> = HashMap::new();
    for path in paths.iter() {
        if let Some(edge) = graph.edge(path.path.first()) {
            starting_at.entry(edge.source).or_default().push(path);
        }
    }
    let mut links = HashSet::new();
    for from in paths.iter() {
        let sink = match graph.edge(from.path.last()) {
            Some(edge) => edge.sink,
            None => continue,
        };
        for to in starting_at.get(&sink).into_iter().flatten() {
            let link = (path_name(from), orient(from), path_name(to), orient(to));
            let mirror = (link.2.clone(), flip(link.3), link.0.clone(), flip(link.1));
            if links.contains(&mirror) || !links.insert(link.clone()) {
                continue;
            }
            lines.push(format!("L\t{}\t{}\t{}\t{}\t0M", link.0, link.1, link.2, link.3));
        }
    }
    Ok(lines.join("\n") + "\n")
}

pub fn write_gfa<S: SequenceProvider, P: AsRef<Path>>(
    graph: &RepeatGraph,
    paths: &[UnbranchingPath],
    seqs: &S,
    path: P,
) -> repeat_graph::Result<()> {
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    wtr.write_all(to_gfa(graph, paths, seqs)?.as_bytes())?;
    Ok(())
}

/// Sequences of the unbranching paths, both strands.
pub fn write_paths_fasta<S: SequenceProvider, P: AsRef<Path>>(
    graph: &RepeatGraph,
    paths: &[UnbranchingPath],
    seqs: &S,
    path: P,
) -> repeat_graph::Result<()> {
    let mut wtr = fasta::Writer::to_file(path)?;
    for p in paths.iter() {
        let seq = p.spell(graph, seqs)?;
        let id = format!("path_{}", p.id());
        let desc = format!(
            "rc:{} length:{} coverage:{:.1}{}",
            p.rc_id,
            p.length,
            p.mean_coverage,
            if p.circular() { " circular" } else { "" }
        );
        wtr.write(&id, Some(desc.as_str()), &seq)?;
    }
    Ok(())
}

fn read_names<S: SequenceProvider>(aligner: &ReadAligner, edge: EdgeId, reads: &S) -> Vec<String> {
    let mut names: Vec<_> = aligner
        .alignments_on(edge)
        .iter()
        .map(|a| {
            let sign = if a.read.strand() { '+' } else { '-' };
            let name = reads.name(SeqId::forward(a.read.record())).unwrap_or("?");
            format!("{}{}", sign, name)
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Every junction with its in/out edges and the reads going through each of them.
pub fn repeats_dump<S: SequenceProvider>(
    junctions: &[Junction],
    aligner: &ReadAligner,
    reads: &S,
) -> String {
    let mut lines = vec![];
    for junction in junctions {
        lines.push(format!("#Repeat {}", junction));
        if let repeat_graph::repeat_resolver::JunctionKind::Repeat(e) = junction.kind {
            let names = read_names(aligner, e, reads);
            lines.push(format!("#All reads\t{}", names.len()));
            lines.extend(names);
        }
        let sides = junction
            .in_edges
            .iter()
            .map(|&e| ("Input", e))
            .chain(junction.out_edges.iter().map(|&e| ("Output", e)));
        for (side, e) in sides {
            let names = read_names(aligner, e, reads);
            lines.push(format!("#{} {}\t{}", side, e, names.len()));
            lines.extend(names);
        }
        for (i, o, count) in junction.support.iter() {
            lines.push(format!("#Support {} -> {}\t{}", i, o, count));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn write_repeats_dump<S: SequenceProvider, P: AsRef<Path>>(
    junctions: &[Junction],
    aligner: &ReadAligner,
    reads: &S,
    path: P,
) -> std::io::Result<()> {
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    wtr.write_all(repeats_dump(junctions, aligner, reads).as_bytes())
}

pub fn write_contigs<P: AsRef<Path>>(contigs: &[Contig], path: P) -> std::io::Result<()> {
    let mut wtr = fasta::Writer::to_file(path)?;
    for contig in contigs {
        let desc = format!("length:{} coverage:{:.1}", contig.seq.len(), contig.coverage);
        wtr.write(&contig.name, Some(desc.as_str()), &contig.seq)?;
    }
    Ok(())
}

pub fn write_contig_stats<P: AsRef<Path>>(contigs: &[Contig], path: P) -> std::io::Result<()> {
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    wtr.write_all(contig_extender::stats(contigs).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repeat_graph::graph::{EdgeAttributes, SeqSegment};
    use repeat_graph::{ContigExtender, SequenceContainer};
    #[test]
    fn dot_and_gfa() {
        let mut seqs = SequenceContainer::new();
        let id = seqs.add_sequence("ctg", b"ACGTTGCAAGGCTTACCGTA").unwrap();
        let mut graph = RepeatGraph::new();
        let (u, _) = graph.add_node_pair();
        let (v, _) = graph.add_node_pair();
        let (w, _) = graph.add_node_pair();
        let attrs = EdgeAttributes::default();
        let repeat = EdgeAttributes {
            multiplicity: 2,
            ..attrs
        };
        graph
            .add_edge(u, v, vec![SeqSegment::new(id, 20, 0, 6)], attrs)
            .unwrap();
        graph
            .add_edge(v, v, vec![SeqSegment::new(id, 20, 6, 12)], repeat)
            .unwrap();
        graph
            .add_edge(v, w, vec![SeqSegment::new(id, 20, 12, 20)], attrs)
            .unwrap();
        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph {"));
        assert_eq!(dot.matches(" -> ").count(), 6);
        assert_eq!(dot.matches("red").count(), 2);
        let mut extender = ContigExtender::new();
        let paths = extender.generate_unbranching_paths(&graph).to_vec();
        let gfa = to_gfa(&graph, &paths, &seqs).unwrap();
        let segments = gfa.lines().filter(|l| l.starts_with("S\t")).count();
        let links = gfa.lines().filter(|l| l.starts_with("L\t")).count();
        assert_eq!(segments, 3);
        // in -> loop, loop -> loop, loop -> out, in -> out.
        assert_eq!(links, 4);
    }
}
