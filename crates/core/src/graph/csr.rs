//! Compressed-sparse-row topology construction.
//!
//! The build algorithm (atomic per-vertex degree counting, atomic exclusive
//! prefix sum, then a parallel scatter-write into a pre-sized buffer using
//! raw-pointer writes justified by non-overlapping per-vertex ranges) is the
//! same technique used throughout this codebase's graph construction paths;
//! only the edge policy (self-loop rejection up front, strict duplicate
//! weight checking) is specific to this engine.

use std::sync::atomic::Ordering::AcqRel;

use atomic::Atomic;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::index::Idx;

/// The target of an edge together with its associated value. Used only
/// during construction; a built [`Topology`] stores targets and values in
/// separate, parallel arrays (see module docs on `graph::mod`).
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Target<NI, EV> {
    pub target: NI,
    pub value: EV,
}

impl<NI, EV> Target<NI, EV> {
    pub fn new(target: NI, value: EV) -> Self {
        Self { target, value }
    }
}

impl<NI: Ord, EV> Ord for Target<NI, EV> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.target.cmp(&other.target)
    }
}

impl<NI: PartialOrd, EV> PartialOrd for Target<NI, EV> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.target.partial_cmp(&other.target)
    }
}

impl<NI: PartialEq, EV> PartialEq for Target<NI, EV> {
    fn eq(&self, other: &Self) -> bool {
        self.target.eq(&other.target)
    }
}

impl<NI: Eq, EV> Eq for Target<NI, EV> {}

/// A raw pointer wrapper that is `Send`/`Sync` when `T` is. Used so that
/// independent worker threads can each write into disjoint slots of the
/// same backing allocation without a lock; callers are responsible for
/// proving the ranges written by distinct threads never overlap.
pub(crate) struct SharedMut<T>(*mut T);

unsafe impl<T: Send> Send for SharedMut<T> {}
unsafe impl<T: Sync> Sync for SharedMut<T> {}

impl<T> SharedMut<T> {
    pub(crate) fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }

    /// # Safety
    /// The caller must ensure the returned pointer is written to by at most
    /// one thread and that `offset` is within the bounds of the original
    /// allocation.
    pub(crate) unsafe fn add(&self, offset: usize) -> *mut T {
        self.0.add(offset)
    }
}

/// Exclusive prefix sum: `out[0] = 0`, `out[i] = out[i-1] + input[i-1]`,
/// `out[input.len()] = sum(input)`.
fn prefix_sum<Index: Idx>(input: &[Index]) -> Box<[Index]> {
    let mut out = Vec::with_capacity(input.len() + 1);
    let mut total = Index::zero();
    out.push(total);
    for &degree in input {
        total += degree;
        out.push(total);
    }
    out.into_boxed_slice()
}

/// Owns `degrees` / `rows` / `cols`; immutable once built. `rows` has length
/// `vertex_count + 1`; `cols` has length `rows[vertex_count]`.
#[derive(Debug)]
pub struct Topology<Index: Idx, NI: Idx> {
    offsets: Box<[Index]>,
    targets: Box<[NI]>,
}

impl<Index: Idx, NI: Idx> Topology<Index, NI> {
    pub fn vertex_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn degree(&self, u: NI) -> Index {
        self.offsets[u.index() + 1] - self.offsets[u.index()]
    }

    pub fn neighbors(&self, u: NI) -> &[NI] {
        let start = self.offsets[u.index()].index();
        let end = self.offsets[u.index() + 1].index();
        &self.targets[start..end]
    }

    pub fn offsets(&self) -> &[Index] {
        &self.offsets
    }

    pub fn targets(&self) -> &[NI] {
        &self.targets
    }
}

/// Builds the topology (and, if `EV` carries a value, the aligned edge-value
/// array) for either directed or undirected graphs from a flat edge list.
///
/// Self-loops are rejected before counting (step 2 of the build algorithm);
/// duplicate edges are collapsed during the per-row sort, and for a weighted
/// build a weight disagreement between duplicates is a hard `InvalidInput`
/// error rather than being silently resolved to "first one wins".
pub fn build_topology<Index, NI, EV>(
    edges: &[(NI, NI, EV)],
    vertex_count: usize,
    undirected: bool,
) -> Result<(Topology<Index, NI>, Box<[EV]>)>
where
    Index: Idx,
    NI: Idx,
    EV: Copy + PartialEq + Send + Sync,
{
    if vertex_count == 0 && !edges.is_empty() {
        return Err(Error::InvalidInput(
            "vertex_count is zero but the edge list is non-empty".into(),
        ));
    }
    for &(u, v, _) in edges {
        if u.index() >= vertex_count || v.index() >= vertex_count {
            return Err(Error::InvalidInput(format!(
                "edge endpoint out of range: ({}, {}) for vertex_count {}",
                u.index(),
                v.index(),
                vertex_count
            )));
        }
    }

    let live: Vec<&(NI, NI, EV)> = edges.iter().filter(|(u, v, _)| u != v).collect();

    let degrees: Vec<Atomic<Index>> = (0..vertex_count).map(|_| Atomic::new(Index::zero())).collect();
    live.par_iter().for_each(|&&(u, v, _)| {
        Index::fetch_add(&degrees[u.index()], Index::one(), AcqRel);
        if undirected {
            Index::fetch_add(&degrees[v.index()], Index::one(), AcqRel);
        }
    });
    let degrees: Vec<Index> = degrees.into_iter().map(|d| d.into_inner()).collect();
    let rows = prefix_sum(&degrees);
    let total = rows[vertex_count].index();

    let mut raw_targets: Vec<Target<NI, EV>> = Vec::with_capacity(total);
    let raw_ptr = SharedMut::new(raw_targets.as_mut_ptr());
    let cursors: Vec<Atomic<Index>> = rows[..vertex_count].iter().map(|&r| Atomic::new(r)).collect();

    live.par_iter().for_each(|&&(u, v, w)| {
        let pos = Index::get_and_increment(&cursors[u.index()], AcqRel);
        unsafe { raw_ptr.add(pos.index()).write(Target::new(v, w)) };
        if undirected {
            let pos = Index::get_and_increment(&cursors[v.index()], AcqRel);
            unsafe { raw_ptr.add(pos.index()).write(Target::new(u, w)) };
        }
    });
    // SAFETY: every slot in `0..total` was written exactly once above: the
    // cursor for vertex `u` starts at `rows[u]` and is incremented once per
    // occurrence of `u` as a source (or, for undirected graphs, as either
    // endpoint), which is exactly `degrees[u]` occurrences by construction.
    unsafe { raw_targets.set_len(total) };

    let row_ranges: Vec<(usize, usize)> = (0..vertex_count)
        .map(|v| (rows[v].index(), rows[v + 1].index()))
        .collect();

    // Sort each row; detect and collapse duplicates, checking weight
    // agreement along the way. Rows are independent so this runs in
    // parallel; each row produces its own deduplicated Vec which is then
    // concatenated sequentially while recomputing offsets.
    let deduped: Vec<Result<Vec<Target<NI, EV>>>> = row_ranges
        .par_iter()
        .map(|&(start, end)| dedup_row(&mut raw_targets[start..end].to_vec()))
        .collect();

    let mut new_offsets = Vec::with_capacity(vertex_count + 1);
    let mut new_targets = Vec::with_capacity(total);
    new_offsets.push(Index::zero());
    for row in deduped {
        let row = row?;
        new_targets.extend_from_slice(&row);
        new_offsets.push(Index::new(new_targets.len()));
    }

    let (cols, values): (Vec<NI>, Vec<EV>) = new_targets.into_iter().map(|t| (t.target, t.value)).unzip();

    Ok((
        Topology {
            offsets: new_offsets.into_boxed_slice(),
            targets: cols.into_boxed_slice(),
        },
        values.into_boxed_slice(),
    ))
}

fn dedup_row<NI, EV>(row: &mut [Target<NI, EV>]) -> Result<Vec<Target<NI, EV>>>
where
    NI: Idx,
    EV: Copy + PartialEq,
{
    row.sort_unstable_by_key(|t| t.target);
    let mut out: Vec<Target<NI, EV>> = Vec::with_capacity(row.len());
    for &t in row.iter() {
        match out.last() {
            Some(prev) if prev.target == t.target => {
                if prev.value != t.value {
                    return Err(Error::InvalidInput(format!(
                        "duplicate edge to vertex {} has disagreeing weights",
                        t.target.index()
                    )));
                }
            }
            _ => out.push(t),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(i32, i32)]) -> Vec<(i32, i32, ())> {
        pairs.iter().map(|&(u, v)| (u, v, ())).collect()
    }

    #[test]
    fn builds_undirected_topology_with_symmetric_neighbors() {
        let e = edges(&[(0, 1), (1, 2), (2, 3), (2, 4), (3, 6), (4, 5), (1, 4), (2, 6)]);
        let (topo, _): (Topology<i64, i32>, _) = build_topology(&e, 7, true).unwrap();
        assert_eq!(topo.vertex_count(), 7);
        assert_eq!(topo.edge_count(), 16);
        assert_eq!(topo.degree(2), 4);
        assert_eq!(topo.neighbors(2), &[1, 3, 4, 6]);
    }

    #[test]
    fn drops_self_loops() {
        let e = edges(&[(0, 0), (0, 1)]);
        let (topo, _): (Topology<i64, i32>, _) = build_topology(&e, 2, true).unwrap();
        assert_eq!(topo.edge_count(), 2);
        assert_eq!(topo.neighbors(0), &[1]);
    }

    #[test]
    fn collapses_duplicate_edges() {
        let e = edges(&[(0, 1), (0, 1), (0, 2)]);
        let (topo, _): (Topology<i64, i32>, _) = build_topology(&e, 3, true).unwrap();
        assert_eq!(topo.neighbors(0), &[1, 2]);
    }

    #[test]
    fn rejects_weight_disagreement_on_duplicate() {
        let e = vec![(0i32, 1i32, 1.0f64), (0, 1, 2.0f64)];
        let result: Result<(Topology<i64, i32>, _)> = build_topology(&e, 2, true);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_out_of_range_endpoint() {
        let e = edges(&[(0, 5)]);
        let result: Result<(Topology<i64, i32>, _)> = build_topology(&e, 2, true);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn directed_topology_stores_only_outgoing_direction() {
        let e = edges(&[(0, 1), (1, 2)]);
        let (topo, _): (Topology<i64, i32>, _) = build_topology(&e, 3, false).unwrap();
        assert_eq!(topo.edge_count(), 2);
        assert_eq!(topo.neighbors(0), &[1]);
        assert_eq!(topo.neighbors(2), &[] as &[i32]);
    }

    #[test]
    fn empty_graph_has_empty_topology() {
        let e: Vec<(i32, i32, ())> = vec![];
        let (topo, _): (Topology<i64, i32>, _) = build_topology(&e, 0, true).unwrap();
        assert_eq!(topo.vertex_count(), 0);
        assert_eq!(topo.edge_count(), 0);
    }
}
