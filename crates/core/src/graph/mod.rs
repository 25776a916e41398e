pub mod csr;

use crate::error::{Error, Result};
use crate::index::Idx;
use csr::{build_topology, Topology};

/// Shared service queries available on every graph, directed or undirected.
pub trait Graph<NI: Idx> {
    fn vertex_count(&self) -> usize;
    fn edge_count(&self) -> usize;
}

/// Per-vertex attribute lookup, present only when the graph was built with
/// vertex values.
pub trait NodeValues<NI: Idx, NV> {
    fn node_value(&self, node: NI) -> Result<NV>;
}

pub trait UndirectedDegrees<NI: Idx> {
    fn degree(&self, node: NI) -> Result<usize>;
}

pub trait UndirectedNeighbors<NI: Idx> {
    fn neighbors(&self, node: NI) -> Result<&[NI]>;
}

pub trait UndirectedNeighborsWithValues<NI: Idx, EV> {
    fn neighbor_values(&self, node: NI) -> Result<&[EV]>;
}

pub trait DirectedDegrees<NI: Idx> {
    fn out_degree(&self, node: NI) -> Result<usize>;
    fn in_degree(&self, node: NI) -> Result<usize>;
}

pub trait DirectedNeighbors<NI: Idx> {
    fn out_neighbors(&self, node: NI) -> Result<&[NI]>;
    fn in_neighbors(&self, node: NI) -> Result<&[NI]>;
}

pub trait DirectedNeighborsWithValues<NI: Idx, EV> {
    fn out_neighbor_values(&self, node: NI) -> Result<&[EV]>;
    fn in_neighbor_values(&self, node: NI) -> Result<&[EV]>;
}

fn check_index<NI: Idx>(node: NI, vertex_count: usize) -> Result<()> {
    if node.index() >= vertex_count {
        Err(Error::OutOfRange(format!(
            "vertex {} is out of range for a graph with {} vertices",
            node.index(),
            vertex_count
        )))
    } else {
        Ok(())
    }
}

/// Binary-searches `neighbors` (sorted ascending, as every `Topology` row
/// is) for `target`, returning the matching value from the parallel
/// `values` array.
fn lookup_edge_value<NI: Idx, EV: Copy>(neighbors: &[NI], values: &[EV], target: NI) -> Option<EV> {
    neighbors.binary_search(&target).ok().map(|idx| values[idx])
}

/// An undirected CSR graph: a single topology stores both directions of
/// every edge (`cols` is symmetric by construction).
#[derive(Debug)]
pub struct UndirectedCsrGraph<Index: Idx, NI: Idx, NV = (), EV = ()> {
    topology: Topology<Index, NI>,
    edge_values: Box<[EV]>,
    node_values: Option<Box<[NV]>>,
}

impl<Index: Idx, NI: Idx, NV, EV: Copy + PartialEq + Send + Sync> UndirectedCsrGraph<Index, NI, NV, EV> {
    pub fn from_edges(edges: &[(NI, NI, EV)], vertex_count: usize, node_values: Option<Box<[NV]>>) -> Result<Self> {
        let (topology, edge_values) = build_topology(edges, vertex_count, true)?;
        if let Some(values) = &node_values {
            if values.len() != vertex_count {
                return Err(Error::InvalidInput(format!(
                    "vertex value array has length {} but vertex_count is {}",
                    values.len(),
                    vertex_count
                )));
            }
        }
        Ok(Self {
            topology,
            edge_values,
            node_values,
        })
    }

    pub fn topology(&self) -> &Topology<Index, NI> {
        &self.topology
    }

    /// Binary-searches `u`'s neighbor range for `v`.
    pub fn edge_value(&self, u: NI, v: NI) -> Result<EV> {
        check_index(u, self.vertex_count())?;
        check_index(v, self.vertex_count())?;
        lookup_edge_value(self.topology.neighbors(u), self.edge_values_for(u), v)
            .ok_or_else(|| Error::OutOfRange(format!("no edge between {} and {}", u.index(), v.index())))
    }

    fn edge_values_for(&self, u: NI) -> &[EV] {
        let start = self.topology.offsets()[u.index()].index();
        let end = self.topology.offsets()[u.index() + 1].index();
        &self.edge_values[start..end]
    }
}

impl<Index: Idx, NI: Idx, NV, EV> Graph<NI> for UndirectedCsrGraph<Index, NI, NV, EV> {
    fn vertex_count(&self) -> usize {
        self.topology.vertex_count()
    }

    fn edge_count(&self) -> usize {
        self.topology.edge_count() / 2
    }
}

impl<Index: Idx, NI: Idx, NV: Copy, EV> NodeValues<NI, NV> for UndirectedCsrGraph<Index, NI, NV, EV> {
    fn node_value(&self, node: NI) -> Result<NV> {
        check_index(node, self.vertex_count())?;
        self.node_values
            .as_ref()
            .map(|values| values[node.index()])
            .ok_or(Error::UninitializedOptionalResult("node_value"))
    }
}

impl<Index: Idx, NI: Idx, NV, EV> UndirectedDegrees<NI> for UndirectedCsrGraph<Index, NI, NV, EV> {
    fn degree(&self, node: NI) -> Result<usize> {
        check_index(node, self.vertex_count())?;
        Ok(self.topology.degree(node).index())
    }
}

impl<Index: Idx, NI: Idx, NV, EV> UndirectedNeighbors<NI> for UndirectedCsrGraph<Index, NI, NV, EV> {
    fn neighbors(&self, node: NI) -> Result<&[NI]> {
        check_index(node, self.vertex_count())?;
        Ok(self.topology.neighbors(node))
    }
}

impl<Index: Idx, NI: Idx, NV, EV: Copy + PartialEq + Send + Sync> UndirectedNeighborsWithValues<NI, EV> for UndirectedCsrGraph<Index, NI, NV, EV> {
    fn neighbor_values(&self, node: NI) -> Result<&[EV]> {
        check_index(node, self.vertex_count())?;
        Ok(self.edge_values_for(node))
    }
}

/// A directed CSR graph: outgoing and incoming adjacency are stored as two
/// independent topologies (and value arrays), built from the same edge list
/// once in each direction.
#[derive(Debug)]
pub struct DirectedCsrGraph<Index: Idx, NI: Idx, NV = (), EV = ()> {
    out: Topology<Index, NI>,
    out_values: Box<[EV]>,
    inc: Topology<Index, NI>,
    inc_values: Box<[EV]>,
    node_values: Option<Box<[NV]>>,
}

impl<Index: Idx, NI: Idx, NV, EV: Copy + PartialEq + Send + Sync> DirectedCsrGraph<Index, NI, NV, EV> {
    pub fn from_edges(edges: &[(NI, NI, EV)], vertex_count: usize, node_values: Option<Box<[NV]>>) -> Result<Self> {
        let (out, out_values) = build_topology(edges, vertex_count, false)?;
        let reversed: Vec<(NI, NI, EV)> = edges.iter().map(|&(u, v, w)| (v, u, w)).collect();
        let (inc, inc_values) = build_topology(&reversed, vertex_count, false)?;
        if let Some(values) = &node_values {
            if values.len() != vertex_count {
                return Err(Error::InvalidInput(format!(
                    "vertex value array has length {} but vertex_count is {}",
                    values.len(),
                    vertex_count
                )));
            }
        }
        Ok(Self {
            out,
            out_values,
            inc,
            inc_values,
            node_values,
        })
    }

    pub fn out_topology(&self) -> &Topology<Index, NI> {
        &self.out
    }

    pub fn in_topology(&self) -> &Topology<Index, NI> {
        &self.inc
    }

    pub fn edge_value(&self, u: NI, v: NI) -> Result<EV> {
        check_index(u, self.vertex_count())?;
        check_index(v, self.vertex_count())?;
        let start = self.out.offsets()[u.index()].index();
        let end = self.out.offsets()[u.index() + 1].index();
        lookup_edge_value(self.out.neighbors(u), &self.out_values[start..end], v)
            .ok_or_else(|| Error::OutOfRange(format!("no edge from {} to {}", u.index(), v.index())))
    }
}

impl<Index: Idx, NI: Idx, NV, EV> Graph<NI> for DirectedCsrGraph<Index, NI, NV, EV> {
    fn vertex_count(&self) -> usize {
        self.out.vertex_count()
    }

    fn edge_count(&self) -> usize {
        self.out.edge_count()
    }
}

impl<Index: Idx, NI: Idx, NV: Copy, EV> NodeValues<NI, NV> for DirectedCsrGraph<Index, NI, NV, EV> {
    fn node_value(&self, node: NI) -> Result<NV> {
        check_index(node, self.vertex_count())?;
        self.node_values
            .as_ref()
            .map(|values| values[node.index()])
            .ok_or(Error::UninitializedOptionalResult("node_value"))
    }
}

impl<Index: Idx, NI: Idx, NV, EV> DirectedDegrees<NI> for DirectedCsrGraph<Index, NI, NV, EV> {
    fn out_degree(&self, node: NI) -> Result<usize> {
        check_index(node, self.vertex_count())?;
        Ok(self.out.degree(node).index())
    }

    fn in_degree(&self, node: NI) -> Result<usize> {
        check_index(node, self.vertex_count())?;
        Ok(self.inc.degree(node).index())
    }
}

impl<Index: Idx, NI: Idx, NV, EV> DirectedNeighbors<NI> for DirectedCsrGraph<Index, NI, NV, EV> {
    fn out_neighbors(&self, node: NI) -> Result<&[NI]> {
        check_index(node, self.vertex_count())?;
        Ok(self.out.neighbors(node))
    }

    fn in_neighbors(&self, node: NI) -> Result<&[NI]> {
        check_index(node, self.vertex_count())?;
        Ok(self.inc.neighbors(node))
    }
}

impl<Index: Idx, NI: Idx, NV, EV> DirectedNeighborsWithValues<NI, EV> for DirectedCsrGraph<Index, NI, NV, EV> {
    fn out_neighbor_values(&self, node: NI) -> Result<&[EV]> {
        check_index(node, self.vertex_count())?;
        let start = self.out.offsets()[node.index()].index();
        let end = self.out.offsets()[node.index() + 1].index();
        Ok(&self.out_values[start..end])
    }

    fn in_neighbor_values(&self, node: NI) -> Result<&[EV]> {
        check_index(node, self.vertex_count())?;
        let start = self.inc.offsets()[node.index()].index();
        let end = self.inc.offsets()[node.index() + 1].index();
        Ok(&self.inc_values[start..end])
    }
}
