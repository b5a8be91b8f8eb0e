use crate::graph::{EdgeAttributes, SeqSegment};
use crate::read_aligner::{EdgeAlignment, ReadAlignment};
use crate::repeat_resolver::{JunctionKind, JunctionState};
use crate::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

fn random_seq<R: Rng>(rng: &mut R, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

// A graph whose edges spell consecutive, non-overlapping pieces of one template.
struct Fixture {
    seqs: SequenceContainer,
    template: SeqId,
    template_len: usize,
    used: usize,
    graph: RepeatGraph,
    reads: usize,
}

impl Fixture {
    fn new(seed: u64) -> Self {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
        let mut seqs = SequenceContainer::new();
        let template_len = 400_000;
        let template = seqs
            .add_sequence("template", &random_seq(&mut rng, template_len))
            .unwrap();
        Self {
            seqs,
            template,
            template_len,
            used: 0,
            graph: RepeatGraph::new(),
            reads: 0,
        }
    }
    fn node(&mut self) -> NodeId {
        self.graph.add_node_pair().0
    }
    fn edge(&mut self, source: NodeId, sink: NodeId, len: usize) -> EdgeId {
        self.edge_with(source, sink, len, EdgeAttributes::default())
    }
    fn edge_with(&mut self, source: NodeId, sink: NodeId, len: usize, attrs: EdgeAttributes) -> EdgeId {
        // A gap keeps adjacent pieces from being coalesced.
        let segment = SeqSegment::new(self.template, self.template_len, self.used, self.used + len);
        self.used += len + 1;
        self.graph.add_edge(source, sink, vec![segment], attrs).unwrap()
    }
    // A read spanning every edge of the walk end to end.
    fn walk(&mut self, edges: &[EdgeId]) -> ReadAlignment {
        let mut chain = vec![];
        let mut pos = 0;
        for &e in edges {
            let len = self.graph.edge(e).unwrap().length;
            chain.push(EdgeAlignment {
                edge: e,
                read_start: pos,
                read_end: pos + len,
                edge_start: 0,
                edge_end: len,
            });
            pos += len;
        }
        self.reads += 1;
        ReadAlignment {
            read: SeqId::forward(self.reads),
            read_len: pos,
            chain,
        }
    }
    fn add_reads(&mut self, aligner: &mut ReadAligner, edges: &[EdgeId], count: usize) {
        for _ in 0..count {
            let alignment = self.walk(edges);
            aligner.add_alignment(&mut self.graph, alignment).unwrap();
        }
    }
    fn topology(&self) -> Vec<(EdgeId, NodeId, NodeId)> {
        let mut edges: Vec<_> = self.graph.edges().map(|e| (e.id, e.source, e.sink)).collect();
        edges.sort();
        edges
    }
}

fn config() -> Config {
    Config {
        kmer_size: 15,
        min_overlap: 1_000,
        min_repeat_length: 1_000,
        max_repeat_separation: 100,
        min_spanning_reads: 5,
        min_edge_support: 3,
        ..Config::default()
    }
}

#[test]
fn straight_contig_end_to_end() {
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(100);
    let contig = random_seq(&mut rng, 8_000);
    let mut assembly = SequenceContainer::new();
    let id = assembly.add_sequence("contig_1", &contig).unwrap();
    let mut reads = SequenceContainer::new();
    for i in 0..10 {
        let start = i * 500;
        let read = &contig[start..start + 3_000];
        if i % 2 == 0 {
            reads.add_sequence(&format!("read_{}", i), read).unwrap();
        } else {
            let rc = sequence::revcmp(read);
            reads.add_sequence(&format!("read_{}", i), &rc).unwrap();
        }
    }
    // Shares nothing with the contig.
    let stray = random_seq(&mut rng, 3_000);
    reads.add_sequence("stray", &stray).unwrap();
    let c = config();
    let repeats = construct::detect_repeats(&assembly, &[id], &c).unwrap();
    assert!(repeats.is_empty());
    let mut graph = RepeatGraph::build(&assembly, &[id], &repeats, &c).unwrap();
    let mut processor = GraphProcessor::new(&c);
    processor.simplify(&mut graph).unwrap();
    let index = KmerIndex::from_graph(&graph, &assembly, &c).unwrap();
    let mut aligner = ReadAligner::new(&c);
    let read_ids: Vec<_> = reads.ids().collect();
    aligner.align_reads(&mut graph, &reads, &read_ids, &index).unwrap();
    assert_eq!(aligner.unaligned().len(), 1);
    assert_eq!(reads.name(aligner.unaligned()[0]).unwrap(), "stray");
    assert_eq!(aligner.num_alignments(), 20);
    let mut inferer = MultiplicityInferer::new(&c);
    let baseline = inferer.estimate_coverage(&mut graph, &aligner).unwrap();
    assert!(baseline > 0.);
    assert_eq!(inferer.remove_unsupported_edges(&mut graph, &mut aligner).unwrap(), 0);
    let mut resolver = RepeatResolver::new(&c);
    assert!(resolver.find_repeats(&graph).is_empty());
    let report = resolver.resolve_repeats(&mut graph, &mut aligner).unwrap();
    assert_eq!(report.resolved + report.ambiguous, 0);
    resolver.fix_long_edges(&mut graph, &mut aligner, &mut processor).unwrap();
    let mut extender = ContigExtender::new();
    extender.generate_unbranching_paths(&graph);
    let contigs = extender.generate_contigs(&graph, &assembly).unwrap();
    assert_eq!(contigs.len(), 1);
    let seq = &contigs[0].seq;
    assert!(seq == &contig || seq == &sequence::revcmp(&contig));
    assert_eq!(contigs[0].multiplicity, 1);
}

#[test]
fn unsupported_branch_stays_ambiguous() {
    let mut fx = Fixture::new(1);
    let (a, b, c, d) = (fx.node(), fx.node(), fx.node(), fx.node());
    fx.edge(a, b, 2_000);
    fx.edge(b, c, 2_000);
    fx.edge(b, d, 2_500);
    let before = fx.topology();
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    let mut resolver = RepeatResolver::new(&config);
    let junctions = resolver.find_repeats(&fx.graph);
    assert_eq!(junctions.len(), 1);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.ambiguous, report.splits), (0, 1, 0));
    assert_eq!(resolver.junctions()[0].state, JunctionState::PermanentlyAmbiguous);
    assert_eq!(fx.topology(), before);
    fx.graph.check_invariants().unwrap();
}

#[test]
fn shared_source_without_reads_stays_ambiguous() {
    let mut fx = Fixture::new(8);
    let (a, b, c) = (fx.node(), fx.node(), fx.node());
    fx.edge(a, b, 2_000);
    fx.edge(a, c, 2_000);
    let before = fx.topology();
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    assert_eq!(resolver.junctions().len(), 1);
    let junction = resolver.junction(JunctionKind::Node(a)).unwrap();
    assert!(junction.in_edges.is_empty());
    assert_eq!(junction.out_edges.len(), 2);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.ambiguous, report.splits), (0, 1, 0));
    let junction = resolver.junction(JunctionKind::Node(a)).unwrap();
    assert_eq!(junction.state, JunctionState::PermanentlyAmbiguous);
    assert_eq!(fx.topology(), before);
    fx.graph.check_invariants().unwrap();
}

#[test]
fn node_junction_is_split() {
    let mut fx = Fixture::new(2);
    let (a, b, n, c, d) = (fx.node(), fx.node(), fx.node(), fx.node(), fx.node());
    let in_a = fx.edge(a, n, 1_000);
    let in_b = fx.edge(b, n, 1_100);
    let out_c = fx.edge(n, c, 1_200);
    let out_d = fx.edge(n, d, 1_300);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    fx.add_reads(&mut aligner, &[in_a, out_c], 12);
    fx.add_reads(&mut aligner, &[in_b, out_d], 9);
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    assert_eq!(resolver.junctions().len(), 1);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.splits), (1, 1));
    let junction = &resolver.junctions()[0];
    assert_eq!(junction.state, JunctionState::Resolved);
    let g = &fx.graph;
    g.check_invariants().unwrap();
    assert_eq!(g.sink(in_a).unwrap(), g.source(out_c).unwrap());
    assert_eq!(g.sink(in_b).unwrap(), g.source(out_d).unwrap());
    assert_ne!(g.sink(in_a).unwrap(), g.sink(in_b).unwrap());
    assert_eq!(aligner.num_alignments(), 42);
    assert!(aligner.alignments().all(|a| a.is_consistent(g)));
    // The two unique paths are merged into two contigs.
    let mut processor = GraphProcessor::new(&config);
    let merged = resolver
        .fix_long_edges(&mut fx.graph, &mut aligner, &mut processor)
        .unwrap();
    assert_eq!(merged, 4);
    assert_eq!(fx.graph.num_edges(), 4);
    let mut extender = ContigExtender::new();
    extender.generate_unbranching_paths(&fx.graph);
    let contigs = extender.generate_contigs(&fx.graph, &fx.seqs).unwrap();
    let mut lengths: Vec<_> = contigs.iter().map(|c| c.seq.len()).collect();
    lengths.sort();
    assert_eq!(lengths, vec![2_200, 2_400]);
}

#[test]
fn conflicting_support_keeps_graph() {
    let mut fx = Fixture::new(3);
    let (a, b, n, c, d) = (fx.node(), fx.node(), fx.node(), fx.node(), fx.node());
    let in_a = fx.edge(a, n, 1_000);
    let in_b = fx.edge(b, n, 1_100);
    let out_c = fx.edge(n, c, 1_200);
    let out_d = fx.edge(n, d, 1_300);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    fx.add_reads(&mut aligner, &[in_a, out_c], 12);
    fx.add_reads(&mut aligner, &[in_a, out_d], 6);
    fx.add_reads(&mut aligner, &[in_b, out_d], 9);
    let before = fx.topology();
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.ambiguous), (0, 1));
    assert_eq!(fx.topology(), before);
    let junction = &resolver.junctions()[0];
    assert_eq!(junction.state, JunctionState::PermanentlyAmbiguous);
    assert_eq!(junction.support.len(), 4);
}

#[test]
fn repeat_edge_copy_is_split_off() {
    let mut fx = Fixture::new(4);
    let (a, b, s, t, c, d) = (fx.node(), fx.node(), fx.node(), fx.node(), fx.node(), fx.node());
    let in_a = fx.edge(a, s, 3_000);
    let in_b = fx.edge(b, s, 3_000);
    let attrs = EdgeAttributes {
        copies: 3,
        multiplicity: 3,
        ..EdgeAttributes::default()
    };
    let repeat = fx.edge_with(s, t, 2_000, attrs);
    let out_c = fx.edge(t, c, 3_000);
    let out_d = fx.edge(t, d, 3_000);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    fx.add_reads(&mut aligner, &[in_a, repeat, out_c], 6);
    fx.add_reads(&mut aligner, &[in_b, repeat, out_d], 6);
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    let junction = resolver.junction(JunctionKind::Repeat(repeat)).unwrap();
    assert_eq!(junction.state, JunctionState::Unresolved);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.splits), (1, 1));
    let g = &fx.graph;
    g.check_invariants().unwrap();
    let edge = g.edge(repeat).unwrap();
    assert_eq!(edge.multiplicity, 2);
    assert!(!edge.resolved);
    // in_a -> copy -> out_c no longer touches the repeat.
    let copy = g.out_edges(g.sink(in_a).unwrap()).unwrap().to_vec();
    assert_eq!(copy.len(), 1);
    assert_ne!(copy[0], repeat);
    let copy = g.edge(copy[0]).unwrap();
    assert_eq!((copy.multiplicity, copy.resolved), (1, true));
    assert_eq!(copy.length, edge.length);
    assert_eq!(g.out_edges(copy.sink).unwrap(), &[out_c][..]);
    assert_eq!(g.out_edges(g.sink(in_b).unwrap()).unwrap(), &[repeat][..]);
    assert_eq!(g.out_edges(edge.sink).unwrap(), &[out_d][..]);
    assert_eq!(aligner.alignments_on(copy.id).len(), 6);
    assert_eq!(aligner.alignments_on(repeat).len(), 6);
    assert_eq!(aligner.alignments_on(copy.rc).len(), 6);
    assert!(aligner.alignments().all(|a| a.is_consistent(g)));
    assert_eq!(
        g.edge_sequence(copy.id, &fx.seqs).unwrap(),
        g.edge_sequence(repeat, &fx.seqs).unwrap()
    );
}

#[test]
fn multiplicity_from_coverage() {
    let mut fx = Fixture::new(5);
    let (a, s, t, c) = (fx.node(), fx.node(), fx.node(), fx.node());
    let left = fx.edge(a, s, 4_000);
    let repeat = fx.edge(s, t, 2_000);
    let right = fx.edge(t, c, 4_000);
    let back = fx.edge(t, s, 3_000);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    // The repeat is traversed four times as often as the other edges.
    fx.add_reads(&mut aligner, &[left, repeat], 4);
    fx.add_reads(&mut aligner, &[repeat, back, repeat], 4);
    fx.add_reads(&mut aligner, &[repeat, right], 4);
    let mut inferer = MultiplicityInferer::new(&config);
    let baseline = inferer.estimate_coverage(&mut fx.graph, &aligner).unwrap();
    assert!((baseline - 4.).abs() < 1e-6);
    assert_eq!(fx.graph.edge(repeat).unwrap().multiplicity, 4);
    assert_eq!(fx.graph.edge(left).unwrap().multiplicity, 1);
    assert_eq!(fx.graph.edge(back).unwrap().multiplicity, 1);
    assert_eq!(inferer.estimate(repeat).unwrap().support, 12);
    assert!(inferer.estimate(repeat).unwrap().confident);
    assert!(!inferer.is_stale(&fx.graph));
}

#[test]
fn inferred_repeat_loses_one_copy_per_split() {
    let mut fx = Fixture::new(9);
    let (a, b, s, t, c, d) = (fx.node(), fx.node(), fx.node(), fx.node(), fx.node(), fx.node());
    let in_a = fx.edge(a, s, 3_000);
    let in_b = fx.edge(b, s, 3_000);
    let repeat = fx.edge(s, t, 2_000);
    let out_c = fx.edge(t, c, 3_000);
    let out_d = fx.edge(t, d, 3_000);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    // Two copies are spanned, the third one only shows up as coverage.
    fx.add_reads(&mut aligner, &[in_a, repeat, out_c], 6);
    fx.add_reads(&mut aligner, &[in_b, repeat, out_d], 6);
    fx.add_reads(&mut aligner, &[repeat], 6);
    let mut inferer = MultiplicityInferer::new(&config);
    let baseline = inferer.estimate_coverage(&mut fx.graph, &aligner).unwrap();
    assert!((baseline - 6.).abs() < 1e-6);
    assert_eq!(fx.graph.edge(repeat).unwrap().multiplicity, 3);
    assert_eq!(fx.graph.edge(in_a).unwrap().multiplicity, 1);
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    let junction = resolver.junction(JunctionKind::Repeat(repeat)).unwrap();
    assert_eq!(junction.state, JunctionState::Unresolved);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!((report.resolved, report.splits), (1, 1));
    fx.graph.check_invariants().unwrap();
    let edge = fx.graph.edge(repeat).unwrap();
    assert_eq!(edge.multiplicity, 2);
    assert!(edge.is_repetitive());
}

#[test]
fn haplotypes_survive_simplification() {
    let mut fx = Fixture::new(10);
    let (a, s, t) = (fx.node(), fx.node(), fx.node());
    let left = fx.edge(a, s, 60_000);
    let h1 = fx.edge(s, t, 5_000);
    let h2 = fx.edge(s, t, 5_100);
    let right = fx.edge(t, a, 60_000);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    fx.add_reads(&mut aligner, &[left], 8);
    fx.add_reads(&mut aligner, &[h1], 8);
    fx.add_reads(&mut aligner, &[h2], 8);
    fx.add_reads(&mut aligner, &[right], 8);
    let mut inferer = MultiplicityInferer::new(&config);
    inferer.estimate_coverage(&mut fx.graph, &aligner).unwrap();
    assert_eq!(inferer.separate_haplotypes(&mut fx.graph, &aligner).unwrap(), 1);
    assert!(fx.graph.edge(h1).unwrap().haplotype);
    assert!(fx.graph.edge(h2).unwrap().haplotype);
    // Without alignments only the haplotype mark keeps the bubble.
    aligner.clear(&mut fx.graph);
    let mut unmarked = fx.graph.clone();
    unmarked.set_haplotype(h1, false).unwrap();
    unmarked.set_haplotype(h2, false).unwrap();
    let mut processor = GraphProcessor::new(&config);
    let report = processor.simplify(&mut fx.graph).unwrap();
    assert_eq!(report.bubbles, 0);
    assert!(fx.graph.contains_edge(h1) && fx.graph.contains_edge(h2));
    fx.graph.check_invariants().unwrap();
    let report = GraphProcessor::new(&config).simplify(&mut unmarked).unwrap();
    assert_eq!(report.bubbles, 1);
    assert_eq!(unmarked.num_edges(), 2);
}

// A random graph over forward nodes, with loops and parallel edges allowed.
fn random_graph(seed: u64) -> Fixture {
    let mut fx = Fixture::new(seed);
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed * 31 + 7);
    let nodes: Vec<_> = (0..rng.gen_range(4..10)).map(|_| fx.node()).collect();
    for _ in 0..rng.gen_range(4..16) {
        let source = nodes[rng.gen_range(0..nodes.len())];
        let sink = nodes[rng.gen_range(0..nodes.len())];
        let len = rng.gen_range(500..5_000);
        let edge = fx.edge(source, sink, len);
        let coverage = rng.gen_range(0..30) as f64;
        fx.graph.set_coverage(edge, coverage).unwrap();
    }
    fx
}

#[test]
fn simplify_keeps_invariants_and_is_idempotent() {
    let config = config();
    for seed in 0..30 {
        let mut fx = random_graph(seed);
        fx.graph.check_invariants().unwrap();
        let mut processor = GraphProcessor::new(&config);
        processor.simplify(&mut fx.graph).unwrap();
        fx.graph.check_invariants().unwrap();
        assert!(fx.graph.nodes().all(|n| !n.is_isolated()), "seed {}", seed);
        let before = fx.topology();
        let report = processor.simplify(&mut fx.graph).unwrap();
        assert!(report.is_empty(), "seed {}: {}", seed, report);
        assert_eq!(fx.topology(), before);
        for edge in fx.graph.edges() {
            let rc = fx.graph.edge(edge.rc).unwrap();
            assert_eq!(rc.rc, edge.id);
            assert_eq!(
                sequence::revcmp(&fx.graph.edge_sequence(edge.id, &fx.seqs).unwrap()),
                fx.graph.edge_sequence(rc.id, &fx.seqs).unwrap()
            );
        }
    }
}

#[test]
fn unsupported_edge_removal_is_monotone() {
    let config = config();
    let mut fx = Fixture::new(6);
    let nodes: Vec<_> = (0..6).map(|_| fx.node()).collect();
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(60);
    let mut aligner = ReadAligner::new(&config);
    let mut edges = vec![];
    for w in nodes.windows(2) {
        edges.push(fx.edge(w[0], w[1], 2_000));
        edges.push(fx.edge(w[0], w[1], 2_100));
    }
    for &e in edges.iter() {
        let count = rng.gen_range(0..6);
        fx.add_reads(&mut aligner, &[e], count);
    }
    let mut inferer = MultiplicityInferer::new(&config);
    inferer.estimate_coverage(&mut fx.graph, &aligner).unwrap();
    let before = fx.graph.num_edges();
    let removed = inferer.remove_unsupported_edges(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!(fx.graph.num_edges(), before - 2 * removed);
    for edge in fx.graph.canonical_edges() {
        let support = inferer.estimate(edge.id).unwrap().support;
        assert!(support >= config.min_edge_support);
    }
    fx.graph.check_invariants().unwrap();
    assert_eq!(inferer.remove_unsupported_edges(&mut fx.graph, &mut aligner).unwrap(), 0);
}

// Resolution happens exactly when the well supported pairs form a perfect
// matching, and an unresolved junction leaves the graph untouched.
#[test]
fn resolution_only_on_perfect_matching() {
    let config = config();
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(2024);
    let mut resolved = 0;
    for seed in 0..60 {
        let mut fx = Fixture::new(seed);
        let k = rng.gen_range(2..5);
        let n = fx.node();
        let in_edges: Vec<_> = (0..k)
            .map(|_| {
                let a = fx.node();
                fx.edge(a, n, 1_000)
            })
            .collect();
        let out_edges: Vec<_> = (0..k)
            .map(|_| {
                let b = fx.node();
                fx.edge(n, b, 1_000)
            })
            .collect();
        let mut aligner = ReadAligner::new(&config);
        // Mostly a permutation, with random noise on top.
        let mut perm: Vec<usize> = (0..k).collect();
        for i in (1..k).rev() {
            perm.swap(i, rng.gen_range(0..=i));
        }
        let mut supported = vec![];
        for (i, &ie) in in_edges.iter().enumerate() {
            for (o, &oe) in out_edges.iter().enumerate() {
                let count = if perm[i] == o {
                    rng.gen_range(3..15)
                } else if rng.gen_bool(0.15) {
                    rng.gen_range(0..10)
                } else {
                    0
                };
                fx.add_reads(&mut aligner, &[ie, oe], count);
                if count >= config.min_spanning_reads {
                    supported.push((i, o));
                }
            }
        }
        let perfect = (0..k).all(|i| supported.iter().filter(|x| x.0 == i).count() == 1)
            && (0..k).all(|o| supported.iter().filter(|x| x.1 == o).count() == 1);
        let before = fx.topology();
        let mut resolver = RepeatResolver::new(&config);
        resolver.find_repeats(&fx.graph);
        let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
        fx.graph.check_invariants().unwrap();
        if perfect {
            resolved += 1;
            assert_eq!((report.resolved, report.splits), (1, k - 1), "seed {}", seed);
            for &(i, o) in supported.iter() {
                let node = fx.graph.sink(in_edges[i]).unwrap();
                assert_eq!(fx.graph.out_edges(node).unwrap(), &[out_edges[o]][..]);
                assert_eq!(fx.graph.in_edges(node).unwrap(), &[in_edges[i]][..]);
            }
        } else {
            assert_eq!((report.resolved, report.ambiguous), (0, 1), "seed {}", seed);
            assert_eq!(fx.topology(), before, "seed {}", seed);
        }
    }
    assert!(resolved > 0);
}

#[test]
fn forbidden_connection_blocks_resolution() {
    let mut fx = Fixture::new(7);
    let (a, b, n, c, d) = (fx.node(), fx.node(), fx.node(), fx.node(), fx.node());
    let in_a = fx.edge(a, n, 1_000);
    let in_b = fx.edge(b, n, 1_000);
    let out_c = fx.edge(n, c, 1_000);
    let out_d = fx.edge(n, d, 1_000);
    let config = config();
    let mut aligner = ReadAligner::new(&config);
    fx.add_reads(&mut aligner, &[in_a, out_c], 8);
    fx.add_reads(&mut aligner, &[in_b, out_d], 8);
    let mut inferer = MultiplicityInferer::new(&config);
    inferer.estimate_coverage(&mut fx.graph, &aligner).unwrap();
    // A -> D and B -> C are never observed.
    let forbidden = inferer
        .remove_unsupported_connections(&mut fx.graph, &aligner)
        .unwrap();
    assert_eq!(forbidden, 2);
    assert!(!fx.graph.is_connection_allowed(in_a, out_d));
    assert!(fx.graph.is_connection_allowed(in_a, out_c));
    // Forbidding an observed connection makes the junction unresolvable.
    fx.graph.forbid_connection(in_a, out_c).unwrap();
    let mut resolver = RepeatResolver::new(&config);
    resolver.find_repeats(&fx.graph);
    let report = resolver.resolve_repeats(&mut fx.graph, &mut aligner).unwrap();
    assert_eq!(report.resolved, 0);
}
