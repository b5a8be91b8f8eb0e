// Maximum weight bipartite matching between the in-edges and the out-edges of a junction.
// The bipartite graph is turned into a flow network
// source -> left nodes -> right nodes -> sink, where every arc has capacity 1
// and an original arc costs minus its weight.
// Augmenting along the cheapest path while that path has a negative cost
// yields a minimum cost flow, which is a maximum weight matching.
// The flow on each arc is either 0 or 1.

/// `graph[i]` lists the (right node, weight) pairs adjacent to the i-th left node.
/// Returns the matched (left, right) pairs, sorted.
pub fn maximum_weight_matching(
    left: usize,
    right: usize,
    graph: &[Vec<(usize, u64)>],
) -> Vec<(usize, usize)> {
    let (source, sink) = (0, left + right + 1);
    let mut network = vec![vec![]; left + right + 2];
    for (i, arcs) in graph.iter().enumerate() {
        for &(j, weight) in arcs {
            assert!(j < right);
            network[i + 1].push((j + left + 1, -(weight as i64)));
        }
    }
    for i in 1..=left {
        network[source].push((i, 0));
    }
    for j in (left + 1)..=(left + right) {
        network[j].push((sink, 0));
    }
    let mut flow = MinCostFlow::new(network);
    let cost = flow.augment_while_negative(source, sink);
    debug!("maximum weight matching:{}", -cost);
    let mut matching: Vec<_> = flow
        .used_arcs()
        .into_iter()
        .filter(|&(from, to)| from != source && to != sink)
        .map(|(from, to)| (from - 1, to - left - 1))
        .collect();
    matching.sort();
    matching
}

#[derive(Debug, Clone)]
struct Arc {
    to: usize,
    capacity: i64,
    cost: i64,
    // The reverse arc of u -> Arc{to:v, rev:i} is arcs[v][i].
    rev: usize,
    is_original: bool,
}

#[derive(Debug, Clone)]
struct MinCostFlow {
    arcs: Vec<Vec<Arc>>,
}

impl MinCostFlow {
    // (to, cost) lists with unit capacities.
    fn new(network: Vec<Vec<(usize, i64)>>) -> Self {
        let mut arcs: Vec<Vec<Arc>> = vec![vec![]; network.len()];
        for (from, targets) in network.iter().enumerate() {
            for &(to, cost) in targets {
                let (rev_from, rev_to) = (arcs[to].len(), arcs[from].len());
                arcs[from].push(Arc {
                    to,
                    capacity: 1,
                    cost,
                    rev: rev_from,
                    is_original: true,
                });
                arcs[to].push(Arc {
                    to: from,
                    capacity: 0,
                    cost: -cost,
                    rev: rev_to,
                    is_original: false,
                });
            }
        }
        Self { arcs }
    }
    // Bellman-Ford on the residual network. Returns the cost of the cheapest
    // path with the (node, arc index) used to reach each node.
    fn cheapest_path(&self, source: usize, sink: usize) -> Option<(i64, Vec<Option<(usize, usize)>>)> {
        let size = self.arcs.len();
        let mut dist: Vec<Option<i64>> = vec![None; size];
        let mut pred: Vec<Option<(usize, usize)>> = vec![None; size];
        dist[source] = Some(0);
        for _ in 0..size {
            let mut updated = false;
            for (from, arcs) in self.arcs.iter().enumerate() {
                let d = match dist[from] {
                    Some(d) => d,
                    None => continue,
                };
                for (idx, arc) in arcs.iter().enumerate().filter(|(_, a)| a.capacity > 0) {
                    let alternative = d + arc.cost;
                    if dist[arc.to].map(|x| alternative < x).unwrap_or(true) {
                        dist[arc.to] = Some(alternative);
                        pred[arc.to] = Some((from, idx));
                        updated = true;
                    }
                }
            }
            if !updated {
                break;
            }
        }
        dist[sink].map(|d| (d, pred))
    }
    // Pushes one unit along cheapest paths as long as they decrease the total cost.
    fn augment_while_negative(&mut self, source: usize, sink: usize) -> i64 {
        let mut total = 0;
        while let Some((cost, pred)) = self.cheapest_path(source, sink) {
            if cost >= 0 {
                break;
            }
            let mut current = sink;
            while current != source {
                let (from, idx) = match pred[current] {
                    Some(p) => p,
                    None => break,
                };
                let rev = self.arcs[from][idx].rev;
                self.arcs[from][idx].capacity -= 1;
                self.arcs[current][rev].capacity += 1;
                current = from;
            }
            total += cost;
        }
        total
    }
    // Original arcs carrying flow.
    fn used_arcs(&self) -> Vec<(usize, usize)> {
        self.arcs
            .iter()
            .enumerate()
            .flat_map(|(from, arcs)| {
                arcs.iter()
                    .filter(|a| a.is_original && a.capacity == 0)
                    .map(move |a| (from, a.to))
            })
            .collect()
    }
}
