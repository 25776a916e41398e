//! Delta-Stepping single-source shortest paths (§4.5): every outgoing edge
//! is classified once as light (`w <= delta`) or heavy (`w > delta`); a
//! bucket `i` is drained by relaxing light edges out of its frontier until
//! the bucket is stable, then relaxing heavy edges once for every vertex
//! that ever appeared in the bucket during the drain, before advancing to
//! the next non-empty bucket. Buckets are consumed in strictly increasing
//! index order; relaxations within one bucket are unordered and use
//! atomic-min updates so no update is ever lost.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Instant;

use atomic_float::AtomicF64;
use graph_core::allocator::{Allocator, Tracked};
use graph_core::error::{Error, Result};
use graph_core::graph::{DirectedCsrGraph, DirectedNeighbors, DirectedNeighborsWithValues, Graph};
use graph_core::index::Idx;
use log::info;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::result::TableView;

/// Sentinel distance for an unreachable vertex.
pub const UNREACHABLE: f64 = f64::MAX;

/// Weights at or above this fraction of the representable range are
/// rejected at ingestion rather than risking overflow inside the relax hot
/// loop (`dist[u] + w`); see the open question on top-of-range weights.
const WEIGHT_CEILING: f64 = f64::MAX / 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsspOutputs(u8);

impl SsspOutputs {
    pub const DISTANCES: SsspOutputs = SsspOutputs(0b01);
    pub const PREDECESSORS: SsspOutputs = SsspOutputs(0b10);

    pub const fn empty() -> Self {
        SsspOutputs(0)
    }

    pub fn contains(self, other: SsspOutputs) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for SsspOutputs {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        SsspOutputs(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ShortestPathsDescriptor {
    pub source: usize,
    pub delta: f64,
    pub outputs: SsspOutputs,
}

impl ShortestPathsDescriptor {
    pub fn new(source: usize, delta: f64, outputs: SsspOutputs) -> Self {
        Self { source, delta, outputs }
    }
}

pub struct ShortestPathsResult {
    distances: Option<Vec<f64>>,
    predecessors: Option<Vec<i32>>,
}

impl ShortestPathsResult {
    pub fn distances(&self) -> Result<&[f64]> {
        self.distances
            .as_deref()
            .ok_or(Error::UninitializedOptionalResult("distances"))
    }

    pub fn predecessors(&self) -> Result<&[i32]> {
        self.predecessors
            .as_deref()
            .ok_or(Error::UninitializedOptionalResult("predecessors"))
    }
}

impl TableView for ShortestPathsResult {
    fn row_count(&self) -> usize {
        self.distances
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.predecessors.as_ref().map(Vec::len))
            .unwrap_or(0)
    }
}

fn bucket_of(dist: f64, delta: f64) -> usize {
    (dist / delta).floor() as usize
}

pub fn delta_stepping<Index, NI, NV, EV>(
    graph: &DirectedCsrGraph<Index, NI, NV, EV>,
    descriptor: ShortestPathsDescriptor,
    allocator: &dyn Allocator,
) -> Result<ShortestPathsResult>
where
    Index: Idx,
    NI: Idx,
    EV: Copy + Into<f64> + Send + Sync,
{
    let start = Instant::now();
    let n = graph.vertex_count();

    if n == 0 {
        return Err(Error::InvalidInput("delta_stepping requires a non-empty graph".into()));
    }
    if descriptor.source >= n {
        return Err(Error::InvalidInput(format!(
            "source {} is out of range for a graph with {} vertices",
            descriptor.source, n
        )));
    }
    if !(descriptor.delta > 0.0) {
        return Err(Error::InvalidInput("delta must be strictly positive".into()));
    }
    if descriptor.outputs.is_empty() {
        return Err(Error::InvalidInput(
            "at least one of distances or predecessors must be requested".into(),
        ));
    }

    let (light_adj, heavy_adj) = classify_edges(graph, descriptor.delta)?;

    let dist_bytes = n * std::mem::size_of::<AtomicF64>();
    allocator.allocate(dist_bytes)?;
    let dist: Vec<AtomicF64> = (0..n).map(|_| AtomicF64::new(UNREACHABLE)).collect();
    dist[descriptor.source].store(0.0, Ordering::SeqCst);

    let want_predecessors = descriptor.outputs.contains(SsspOutputs::PREDECESSORS);
    let pred_bytes = if want_predecessors {
        n * std::mem::size_of::<AtomicI32>()
    } else {
        0
    };
    if want_predecessors {
        allocator.allocate(pred_bytes)?;
    }
    let pred: Option<Vec<AtomicI32>> = want_predecessors.then(|| (0..n).map(|_| AtomicI32::new(-1)).collect());

    // The initial bucket's backing storage is acquired through the allocator
    // like every other scratch buffer; `into_vec` reports it deallocated
    // immediately, matching the explicit allocate/deallocate pairing used
    // for `dist`/`pred` above rather than holding the tracked handle open
    // across the whole bucket-queue lifetime.
    let mut source_bucket = Tracked::<NI>::with_capacity(allocator, 1)?;
    source_bucket.as_vec_mut().push(NI::new(descriptor.source));
    let buckets: Mutex<Vec<Vec<NI>>> = Mutex::new(vec![source_bucket.into_vec()]);

    let relax = |u: NI, target: NI, weight: f64| {
        let candidate = dist[u.index()].load(Ordering::SeqCst) + weight;
        loop {
            let current = dist[target.index()].load(Ordering::SeqCst);
            if candidate >= current {
                return;
            }
            if dist[target.index()]
                .compare_exchange(current, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if let Some(pred) = &pred {
                    pred[target.index()].store(u.index() as i32, Ordering::SeqCst);
                }
                let idx = bucket_of(candidate, descriptor.delta);
                let mut buckets = buckets.lock();
                if buckets.len() <= idx {
                    buckets.resize_with(idx + 1, Vec::new);
                }
                buckets[idx].push(target);
                return;
            }
        }
    };

    let mut current = 0usize;
    loop {
        let next_nonempty = {
            let buckets = buckets.lock();
            (current..buckets.len()).find(|&i| !buckets[i].is_empty())
        };
        let Some(i) = next_nonempty else { break };
        current = i;

        let mut seen_in_bucket: Vec<NI> = Vec::new();
        loop {
            let frontier = {
                let mut buckets = buckets.lock();
                std::mem::take(&mut buckets[i])
            };
            if frontier.is_empty() {
                break;
            }
            seen_in_bucket.extend(frontier.iter().copied());
            frontier.into_par_iter().for_each(|u| {
                if bucket_of(dist[u.index()].load(Ordering::SeqCst), descriptor.delta) != i {
                    return;
                }
                for &(target, weight) in &light_adj[u.index()] {
                    relax(u, target, weight);
                }
            });
        }

        seen_in_bucket.par_iter().for_each(|&u| {
            for &(target, weight) in &heavy_adj[u.index()] {
                relax(u, target, weight);
            }
        });

        current += 1;
    }

    let distances = descriptor
        .outputs
        .contains(SsspOutputs::DISTANCES)
        .then(|| dist.iter().map(|d| d.load(Ordering::SeqCst)).collect());
    let predecessors = pred
        .as_ref()
        .map(|pred| pred.iter().map(|p| p.load(Ordering::SeqCst)).collect());

    allocator.deallocate(dist_bytes);
    if want_predecessors {
        allocator.deallocate(pred_bytes);
    }

    info!(
        "delta_stepping: source {} over {} vertices in {:?}",
        descriptor.source,
        n,
        start.elapsed()
    );

    Ok(ShortestPathsResult { distances, predecessors })
}

type Adjacency<NI> = Vec<Vec<(NI, f64)>>;

fn classify_edges<Index, NI, NV, EV>(
    graph: &DirectedCsrGraph<Index, NI, NV, EV>,
    delta: f64,
) -> Result<(Adjacency<NI>, Adjacency<NI>)>
where
    Index: Idx,
    NI: Idx,
    EV: Copy + Into<f64>,
{
    let n = graph.vertex_count();
    let mut light = Vec::with_capacity(n);
    let mut heavy = Vec::with_capacity(n);
    for v in 0..n {
        let node = NI::new(v);
        let neighbors = graph.out_neighbors(node)?;
        let values = graph.out_neighbor_values(node)?;
        let mut light_row = Vec::new();
        let mut heavy_row = Vec::new();
        for (&target, &weight) in neighbors.iter().zip(values.iter()) {
            let weight: f64 = weight.into();
            if weight.is_nan() || weight < 0.0 || weight >= WEIGHT_CEILING {
                return Err(Error::InvalidInput(format!(
                    "edge weight {weight} from vertex {v} is negative, NaN, or at the top of the representable range"
                )));
            }
            if weight <= delta {
                light_row.push((target, weight));
            } else {
                heavy_row.push((target, weight));
            }
        }
        light.push(light_row);
        heavy.push(heavy_row);
    }
    Ok((light, heavy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::allocator::CountingAllocator;

    fn directed_graph(edges: &[(i32, i32, f64)], n: usize) -> DirectedCsrGraph<i64, i32, (), f64> {
        DirectedCsrGraph::from_edges(edges, n, None).unwrap()
    }

    #[test]
    fn matches_known_distances_on_a_small_dag() {
        let edges = [
            (0, 1, 10.0),
            (0, 2, 20.0),
            (0, 3, 50.0),
            (1, 3, 20.0),
            (1, 4, 33.0),
            (2, 4, 20.0),
            (3, 4, 2.0),
            (3, 5, 1.0),
            (4, 5, 20.0),
        ];
        let graph = directed_graph(&edges, 6);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 10.0, SsspOutputs::DISTANCES | SsspOutputs::PREDECESSORS);
        let result = delta_stepping(&graph, descriptor, &alloc).unwrap();

        assert_eq!(result.distances().unwrap(), &[0.0, 10.0, 20.0, 30.0, 32.0, 31.0]);

        let distances = result.distances().unwrap();
        let predecessors = result.predecessors().unwrap();
        assert_eq!(predecessors[0], -1);
        for (v, &p) in predecessors.iter().enumerate() {
            if p >= 0 {
                let edge_weight = graph.edge_value(p, v as i32).unwrap();
                assert!((distances[p as usize] + edge_weight - distances[v]).abs() < 1e-9);
            }
        }
        assert_eq!(alloc.bytes_in_use(), 0);
    }

    #[test]
    fn unreachable_vertex_keeps_sentinel_distance_and_predecessor() {
        let edges = [(0, 1, 1.0)];
        let graph = directed_graph(&edges, 3);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 1.0, SsspOutputs::DISTANCES | SsspOutputs::PREDECESSORS);
        let result = delta_stepping(&graph, descriptor, &alloc).unwrap();
        assert_eq!(result.distances().unwrap()[2], UNREACHABLE);
        assert_eq!(result.predecessors().unwrap()[2], -1);
    }

    #[test]
    fn rejects_non_positive_delta() {
        let graph = directed_graph(&[(0, 1, 1.0)], 2);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 0.0, SsspOutputs::DISTANCES);
        assert!(matches!(delta_stepping(&graph, descriptor, &alloc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_negative_edge_weight() {
        let graph = directed_graph(&[(0, 1, -1.0)], 2);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 1.0, SsspOutputs::DISTANCES);
        assert!(matches!(delta_stepping(&graph, descriptor, &alloc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_empty_output_mask() {
        let graph = directed_graph(&[(0, 1, 1.0)], 2);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 1.0, SsspOutputs::empty());
        assert!(matches!(delta_stepping(&graph, descriptor, &alloc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn reading_unrequested_output_fails() {
        let graph = directed_graph(&[(0, 1, 1.0)], 2);
        let alloc = CountingAllocator::new();
        let descriptor = ShortestPathsDescriptor::new(0, 1.0, SsspOutputs::DISTANCES);
        let result = delta_stepping(&graph, descriptor, &alloc).unwrap();
        assert!(matches!(result.predecessors(), Err(Error::UninitializedOptionalResult(_))));
    }
}
