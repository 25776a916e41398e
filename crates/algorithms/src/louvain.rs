//! Louvain community detection (§4.4): a two-phase, multi-level scheme.
//! Each level runs a local-move pass to convergence (every vertex greedily
//! joins the neighboring community that most improves modularity), then
//! collapses the resulting communities into the vertices of a smaller
//! aggregated graph; the process repeats until a level's local-move pass
//! makes no move at all, at which point the aggregated graph stops
//! shrinking and the community chain is unfolded back onto the original
//! vertex set.

use std::time::Instant;

use ahash::AHashMap;
use graph_core::allocator::{Allocator, Tracked};
use graph_core::error::{Error, Result};
use graph_core::graph::{Graph, UndirectedCsrGraph, UndirectedNeighbors, UndirectedNeighborsWithValues};
use graph_core::index::Idx;
use log::info;

use crate::result::TableView;

/// A safety bound on the number of aggregation levels; each level strictly
/// shrinks the graph or the loop stops, so this only guards against a
/// pathological input never being hit in practice.
const MAX_LEVELS: usize = 128;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct LouvainDescriptor {
    pub resolution: f64,
    pub accuracy_threshold: f64,
    /// 0 means "no iteration cap" per level.
    pub max_iteration_count: usize,
}

impl LouvainDescriptor {
    pub const DEFAULT_RESOLUTION: f64 = 1.0;
    pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 1e-6;
    pub const DEFAULT_MAX_ITERATION_COUNT: usize = 0;

    pub fn new(resolution: f64, accuracy_threshold: f64, max_iteration_count: usize) -> Result<Self> {
        if resolution < 0.0 {
            return Err(Error::InvalidInput("resolution must be non-negative".into()));
        }
        if accuracy_threshold < 0.0 {
            return Err(Error::InvalidInput("accuracy_threshold must be non-negative".into()));
        }
        Ok(Self {
            resolution,
            accuracy_threshold,
            max_iteration_count,
        })
    }
}

impl Default for LouvainDescriptor {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_RESOLUTION,
            Self::DEFAULT_ACCURACY_THRESHOLD,
            Self::DEFAULT_MAX_ITERATION_COUNT,
        )
        .expect("defaults are always valid")
    }
}

pub struct LouvainResult {
    pub labels: Vec<i32>,
    pub community_count: usize,
    pub modularity: f64,
}

impl TableView for LouvainResult {
    fn row_count(&self) -> usize {
        self.labels.len()
    }
}

/// A plain weighted adjacency representation used internally for the
/// original graph and every aggregated super-vertex graph; unlike
/// [`graph_core::graph::UndirectedCsrGraph`] it allows self-loops, which
/// encode intra-community weight after aggregation.
struct LevelGraph {
    adjacency: Vec<Vec<(u32, f64)>>,
    degree: Vec<f64>,
    total_weight: f64,
}

impl LevelGraph {
    fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    fn from_graph<Index, NI, NV, EV>(graph: &UndirectedCsrGraph<Index, NI, NV, EV>) -> Self
    where
        Index: Idx,
        NI: Idx,
        EV: Copy + PartialEq + Send + Sync + Into<f64>,
    {
        let n = graph.vertex_count();
        let mut adjacency = Vec::with_capacity(n);
        let mut degree = Vec::with_capacity(n);
        for v in 0..n {
            let node = NI::new(v);
            let neighbors = graph.neighbors(node).expect("v is within vertex_count");
            let values = graph.neighbor_values(node).expect("v is within vertex_count");
            let row: Vec<(u32, f64)> = neighbors
                .iter()
                .zip(values.iter())
                .map(|(&target, &weight)| (target.index() as u32, weight.into()))
                .collect();
            degree.push(row.iter().map(|&(_, w)| w).sum());
            adjacency.push(row);
        }
        let total_weight = degree.iter().sum::<f64>() / 2.0;
        Self {
            adjacency,
            degree,
            total_weight,
        }
    }
}

pub fn louvain<Index, NI, NV, EV>(
    graph: &UndirectedCsrGraph<Index, NI, NV, EV>,
    descriptor: LouvainDescriptor,
    initial_partition: Option<&[i32]>,
    allocator: &dyn Allocator,
) -> Result<LouvainResult>
where
    Index: Idx,
    NI: Idx,
    EV: Copy + PartialEq + Send + Sync + Into<f64>,
{
    let start = Instant::now();
    let n = graph.vertex_count();

    if n == 0 {
        return Ok(LouvainResult {
            labels: Vec::new(),
            community_count: 0,
            modularity: 0.0,
        });
    }

    if let Some(partition) = initial_partition {
        if partition.len() != n {
            return Err(Error::InvalidInput(format!(
                "initial_partition has length {} but the graph has {} vertices",
                partition.len(),
                n
            )));
        }
        for &c in partition {
            if c < 0 || c as usize >= n {
                return Err(Error::InvalidInput(format!(
                    "initial_partition entry {c} is out of range for {n} vertices"
                )));
            }
        }
    }

    let level0 = LevelGraph::from_graph(graph);
    let mut current = LevelGraph::from_graph(graph);
    let mut composed: Vec<u32> = (0..n as u32).collect();
    let mut starting_community: Option<Vec<u32>> = initial_partition.map(|p| p.iter().map(|&c| c as u32).collect());

    for _level in 0..MAX_LEVELS {
        let current_n = current.vertex_count();

        let community_bytes = current_n * (std::mem::size_of::<u32>() + std::mem::size_of::<f64>());
        allocator.allocate(community_bytes)?;

        let mut community: Vec<u32> = starting_community
            .take()
            .unwrap_or_else(|| (0..current_n as u32).collect());
        local_move(&current, descriptor, &mut community);

        let (next, dense_map) = aggregate(&current, &community, allocator)?;
        allocator.deallocate(community_bytes);

        composed = composed.iter().map(|&c| dense_map[c as usize]).collect();

        if next.vertex_count() == current_n {
            break;
        }
        current = next;
    }

    let labels: Vec<i32> = composed.iter().map(|&c| c as i32).collect();
    let community_count = labels.iter().copied().max().map(|m| m as usize + 1).unwrap_or(0);
    let modularity = compute_modularity(&level0, &composed, descriptor.resolution);

    info!(
        "louvain: {} communities over {} vertices (Q = {:.6}) in {:?}",
        community_count,
        n,
        modularity,
        start.elapsed()
    );

    Ok(LouvainResult {
        labels,
        community_count,
        modularity,
    })
}

/// Runs local-move passes to convergence, mutating `community` in place.
fn local_move(level: &LevelGraph, descriptor: LouvainDescriptor, community: &mut [u32]) {
    let m2 = 2.0 * level.total_weight;
    if m2 == 0.0 {
        return;
    }

    let mut community_weight: AHashMap<u32, f64> = AHashMap::default();
    for (v, &c) in community.iter().enumerate() {
        *community_weight.entry(c).or_insert(0.0) += level.degree[v];
    }

    let mut iterations = 0usize;
    loop {
        let mut total_gain = 0.0;

        for v in 0..level.vertex_count() {
            let dv = level.degree[v];
            let cv = community[v];
            *community_weight.get_mut(&cv).unwrap() -= dv;

            let mut neighbor_weight: AHashMap<u32, f64> = AHashMap::default();
            for &(target, w) in &level.adjacency[v] {
                *neighbor_weight.entry(community[target as usize]).or_insert(0.0) += w;
            }

            let gain_of = |k_in_c: f64, sigma_tot: f64| k_in_c - descriptor.resolution * sigma_tot * dv / m2;

            let baseline = gain_of(
                neighbor_weight.get(&cv).copied().unwrap_or(0.0),
                community_weight.get(&cv).copied().unwrap_or(0.0),
            );
            let mut best_c = cv;
            let mut best_gain = baseline;
            for (&c, &k_in_c) in &neighbor_weight {
                if c == cv {
                    continue;
                }
                let sigma_tot = community_weight.get(&c).copied().unwrap_or(0.0);
                let g = gain_of(k_in_c, sigma_tot);
                if g > best_gain {
                    best_gain = g;
                    best_c = c;
                }
            }

            let delta_q = best_gain - baseline;
            let target_c = if delta_q > 0.0 { best_c } else { cv };
            community[v] = target_c;
            *community_weight.entry(target_c).or_insert(0.0) += dv;
            if delta_q > 0.0 {
                total_gain += delta_q;
            }
        }

        iterations += 1;
        if total_gain < descriptor.accuracy_threshold {
            break;
        }
        if descriptor.max_iteration_count > 0 && iterations >= descriptor.max_iteration_count {
            break;
        }
    }
}

/// Collapses `level` under `community` into a new, smaller [`LevelGraph`],
/// returning it alongside the dense `old_vertex -> new_vertex` mapping. The
/// per-community accumulator vector is acquired through the allocator like
/// every other scratch buffer this engine uses.
fn aggregate(level: &LevelGraph, community: &[u32], allocator: &dyn Allocator) -> Result<(LevelGraph, Vec<u32>)> {
    let mut id_of: AHashMap<u32, u32> = AHashMap::default();
    let mut next_id = 0u32;
    let dense: Vec<u32> = community
        .iter()
        .map(|&c| {
            *id_of.entry(c).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            })
        })
        .collect();
    let new_n = next_id as usize;

    let mut acc_tracked = Tracked::<AHashMap<u32, f64>>::with_capacity(allocator, new_n)?;
    *acc_tracked.as_vec_mut() = vec![AHashMap::default(); new_n];
    for (u, row) in level.adjacency.iter().enumerate() {
        let cu = dense[u] as usize;
        for &(target, w) in row {
            let cv = dense[target as usize];
            *acc_tracked.as_vec_mut()[cu].entry(cv).or_insert(0.0) += w;
        }
    }
    let acc = acc_tracked.into_vec();

    let adjacency: Vec<Vec<(u32, f64)>> = acc.into_iter().map(|m| m.into_iter().collect()).collect();
    let degree: Vec<f64> = adjacency.iter().map(|row| row.iter().map(|&(_, w)| w).sum()).collect();
    let total_weight = degree.iter().sum::<f64>() / 2.0;

    Ok((
        LevelGraph {
            adjacency,
            degree,
            total_weight,
        },
        dense,
    ))
}

fn compute_modularity(level0: &LevelGraph, labels: &[u32], resolution: f64) -> f64 {
    let m = level0.total_weight;
    if m <= 0.0 {
        return 0.0;
    }
    let mut community_degree: AHashMap<u32, f64> = AHashMap::default();
    for (v, &c) in labels.iter().enumerate() {
        *community_degree.entry(c).or_insert(0.0) += level0.degree[v];
    }
    let mut internal_weight = 0.0;
    for (u, row) in level0.adjacency.iter().enumerate() {
        for &(target, w) in row {
            if labels[u] == labels[target as usize] {
                internal_weight += w;
            }
        }
    }
    internal_weight /= 2.0;
    let sum_degree_sq: f64 = community_degree.values().map(|&d| d * d).sum();
    internal_weight / m - resolution * sum_degree_sq / (4.0 * m * m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::allocator::CountingAllocator;

    fn clique(offset: i32, size: i32) -> Vec<(i32, i32, f64)> {
        let mut edges = Vec::new();
        for u in 0..size {
            for v in (u + 1)..size {
                edges.push((offset + u, offset + v, 1.0));
            }
        }
        edges
    }

    #[test]
    fn two_k5_cliques_joined_by_a_bridge_form_two_communities() {
        let mut edges = clique(0, 5);
        edges.extend(clique(5, 5));
        edges.push((4, 5, 1.0));
        let graph: UndirectedCsrGraph<i64, i32, (), f64> = UndirectedCsrGraph::from_edges(&edges, 10, None).unwrap();

        let alloc = CountingAllocator::new();
        let result = louvain(&graph, LouvainDescriptor::default(), None, &alloc).unwrap();

        assert_eq!(result.community_count, 2);
        let first_half: Vec<i32> = result.labels[0..5].to_vec();
        let second_half: Vec<i32> = result.labels[5..10].to_vec();
        assert!(first_half.windows(2).all(|w| w[0] == w[1]));
        assert!(second_half.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(first_half[0], second_half[0]);
        assert!(result.modularity > 0.0);
        assert_eq!(alloc.bytes_in_use(), 0);
    }

    #[test]
    fn empty_graph_yields_no_communities() {
        let edges: Vec<(i32, i32, f64)> = vec![];
        let graph: UndirectedCsrGraph<i64, i32, (), f64> = UndirectedCsrGraph::from_edges(&edges, 0, None).unwrap();
        let alloc = CountingAllocator::new();
        let result = louvain(&graph, LouvainDescriptor::default(), None, &alloc).unwrap();
        assert_eq!(result.community_count, 0);
        assert!(result.labels.is_empty());
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn rejects_negative_resolution() {
        assert!(LouvainDescriptor::new(-1.0, 1e-6, 0).is_err());
    }

    #[test]
    fn rejects_malformed_initial_partition() {
        let edges = vec![(0i32, 1i32, 1.0)];
        let graph: UndirectedCsrGraph<i64, i32, (), f64> = UndirectedCsrGraph::from_edges(&edges, 2, None).unwrap();
        let alloc = CountingAllocator::new();
        let bad_partition = [0i32, 5i32];
        let result = louvain(&graph, LouvainDescriptor::default(), Some(&bad_partition), &alloc);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn large_resolution_drives_every_vertex_into_its_own_community() {
        let edges = clique(0, 5);
        let graph: UndirectedCsrGraph<i64, i32, (), f64> = UndirectedCsrGraph::from_edges(&edges, 5, None).unwrap();
        let alloc = CountingAllocator::new();
        let descriptor = LouvainDescriptor::new(1_000_000.0, 1e-6, 0).unwrap();
        let result = louvain(&graph, descriptor, None, &alloc).unwrap();
        assert_eq!(result.community_count, 5);
    }
}
