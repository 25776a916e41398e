//! Afforest-style connected components (§4.6): a cheap sampling phase finds
//! the giant component of a power-law graph, an exhaustive phase then
//! completes correctness for everything outside it, and a final dense
//! reindexing pass turns arbitrary root ids into the contiguous label range
//! `[0, component_count)` the public contract promises.

use std::time::Instant;

use ahash::AHashMap;
use graph_core::allocator::Allocator;
use graph_core::error::Result;
use graph_core::graph::{Graph, UndirectedCsrGraph, UndirectedNeighbors};
use graph_core::index::Idx;
use log::info;
use nanorand::{Rng, WyRand};
use rayon::prelude::*;

use crate::afforest::Afforest;
use crate::result::TableView;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ConnectedComponentsConfig {
    pub sampling_size: usize,
    pub neighbor_rounds: usize,
}

impl ConnectedComponentsConfig {
    pub const DEFAULT_SAMPLING_SIZE: usize = 1024;
    pub const DEFAULT_NEIGHBOR_ROUNDS: usize = 2;

    pub fn new(sampling_size: usize, neighbor_rounds: usize) -> Self {
        Self {
            sampling_size,
            neighbor_rounds,
        }
    }
}

impl Default for ConnectedComponentsConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SAMPLING_SIZE, Self::DEFAULT_NEIGHBOR_ROUNDS)
    }
}

pub struct ConnectedComponentsResult {
    pub labels: Vec<i32>,
    pub component_count: usize,
}

impl TableView for ConnectedComponentsResult {
    fn row_count(&self) -> usize {
        self.labels.len()
    }
}

pub fn connected_components<Index, NI, NV, EV>(
    graph: &UndirectedCsrGraph<Index, NI, NV, EV>,
    config: ConnectedComponentsConfig,
    allocator: &dyn Allocator,
) -> Result<ConnectedComponentsResult>
where
    Index: Idx,
    NI: Idx + std::hash::Hash,
    NV: Sync,
    EV: Copy + Send + Sync,
{
    let start = Instant::now();
    let n = graph.vertex_count();
    if n == 0 {
        return Ok(ConnectedComponentsResult {
            labels: Vec::new(),
            component_count: 0,
        });
    }

    let af = Afforest::<NI>::with_allocator(allocator, n)?;

    sample_subgraph(graph, &af, config.neighbor_rounds);
    af.compress();

    let giant_root = find_largest_component(&af, n, config.sampling_size);
    link_remaining(graph, &af, giant_root, config.neighbor_rounds);
    af.compress();

    let (labels, component_count) = dense_reindex(&af, n);

    info!(
        "connected_components: {} components over {} vertices in {:?}",
        component_count,
        n,
        start.elapsed()
    );

    Ok(ConnectedComponentsResult { labels, component_count })
}

fn sample_subgraph<Index, NI, NV, EV>(graph: &UndirectedCsrGraph<Index, NI, NV, EV>, af: &Afforest<NI>, neighbor_rounds: usize)
where
    Index: Idx,
    NI: Idx,
    NV: Sync,
    EV: Copy + Send + Sync,
{
    (0..graph.vertex_count()).into_par_iter().for_each(|v| {
        let node = NI::new(v);
        let neighbors = graph.neighbors(node).expect("v is within vertex_count");
        for &neighbor in neighbors.iter().take(neighbor_rounds) {
            af.union(node, neighbor);
        }
    });
}

/// Randomly samples `sampling_size` vertices, finds their (pre-compressed)
/// roots and returns the most frequent one — the mode of roots, i.e. the
/// presumed giant component.
fn find_largest_component<NI: Idx + std::hash::Hash>(af: &Afforest<NI>, n: usize, sampling_size: usize) -> NI {
    let mut rng = WyRand::new();
    let mut counts: AHashMap<NI, usize> = AHashMap::default();
    for _ in 0..sampling_size.min(n) {
        let idx = rng.generate_range(0..n);
        let root = af.find(NI::new(idx));
        *counts.entry(root).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map(|(root, _)| root)
        .unwrap_or_else(NI::zero)
}

fn link_remaining<Index, NI, NV, EV>(
    graph: &UndirectedCsrGraph<Index, NI, NV, EV>,
    af: &Afforest<NI>,
    giant_root: NI,
    neighbor_rounds: usize,
) where
    Index: Idx,
    NI: Idx,
    NV: Sync,
    EV: Copy + Send + Sync,
{
    (0..graph.vertex_count()).into_par_iter().for_each(|v| {
        let node = NI::new(v);
        if af.find(node) == giant_root {
            return;
        }
        let neighbors = graph.neighbors(node).expect("v is within vertex_count");
        for &neighbor in neighbors.iter().skip(neighbor_rounds) {
            af.union(node, neighbor);
        }
    });
}

/// Assigns dense labels in order of first appearance scanning `v = 0..n`,
/// the canonical deterministic rule given a fixed (compressed) parent array.
fn dense_reindex<NI: Idx + std::hash::Hash>(af: &Afforest<NI>, n: usize) -> (Vec<i32>, usize) {
    let mut root_to_label: AHashMap<NI, i32> = AHashMap::default();
    let mut labels = vec![0i32; n];
    let mut next_label = 0i32;
    for (v, label) in labels.iter_mut().enumerate() {
        let root = af.find(NI::new(v));
        *label = *root_to_label.entry(root).or_insert_with(|| {
            let assigned = next_label;
            next_label += 1;
            assigned
        });
    }
    (labels, next_label as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::allocator::CountingAllocator;

    fn clique(offset: i32, size: i32) -> Vec<(i32, i32, ())> {
        let mut edges = Vec::new();
        for u in 0..size {
            for v in (u + 1)..size {
                edges.push((offset + u, offset + v, ()));
            }
        }
        edges
    }

    #[test]
    fn three_disjoint_cliques_yield_three_components() {
        let mut edges = clique(0, 8);
        edges.extend(clique(8, 6));
        edges.extend(clique(14, 5));
        let graph: UndirectedCsrGraph<i64, i32> = UndirectedCsrGraph::from_edges(&edges, 19, None).unwrap();

        let alloc = CountingAllocator::new();
        let result = connected_components(&graph, ConnectedComponentsConfig::default(), &alloc).unwrap();

        assert_eq!(result.component_count, 3);
        let mut counts = [0usize; 3];
        for &label in &result.labels {
            counts[label as usize] += 1;
        }
        counts.sort_unstable();
        assert_eq!(counts, [5, 6, 8]);
        assert_eq!(alloc.bytes_in_use(), 0);
    }

    #[test]
    fn labels_are_dense_and_vertices_agree_with_their_root() {
        let edges = vec![(0i32, 1i32, ()), (2, 3, ())];
        let graph: UndirectedCsrGraph<i64, i32> = UndirectedCsrGraph::from_edges(&edges, 4, None).unwrap();
        let alloc = CountingAllocator::new();
        let result = connected_components(&graph, ConnectedComponentsConfig::default(), &alloc).unwrap();
        assert_eq!(result.component_count, 2);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[2], result.labels[3]);
        assert_ne!(result.labels[0], result.labels[2]);
    }

    #[test]
    fn empty_graph_yields_no_components() {
        let edges: Vec<(i32, i32, ())> = vec![];
        let graph: UndirectedCsrGraph<i64, i32> = UndirectedCsrGraph::from_edges(&edges, 0, None).unwrap();
        let alloc = CountingAllocator::new();
        let result = connected_components(&graph, ConnectedComponentsConfig::default(), &alloc).unwrap();
        assert_eq!(result.component_count, 0);
        assert!(result.labels.is_empty());
    }
}
