//! Typestate graph builder: `GraphBuilder::new()` starts `Uninitialized`,
//! `.edges(..)` moves to `FromEdges`, and `.build_undirected()` /
//! `.build_directed()` consume it into a concrete graph. Kept as a thin
//! façade over [`crate::graph::UndirectedCsrGraph::from_edges`] /
//! [`crate::graph::DirectedCsrGraph::from_edges`] so that callers assembling
//! an edge buffer programmatically (the CSV reader, Louvain's aggregation
//! step) share one construction entry point with a consistent name.

use crate::error::Result;
use crate::graph::{DirectedCsrGraph, UndirectedCsrGraph};
use crate::index::Idx;

pub struct Uninitialized;

pub struct FromEdges<NI, EV> {
    edges: Vec<(NI, NI, EV)>,
}

pub struct GraphBuilder<State = Uninitialized> {
    state: State,
}

impl Default for GraphBuilder<Uninitialized> {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder<Uninitialized> {
    pub fn new() -> Self {
        GraphBuilder { state: Uninitialized }
    }

    pub fn edges<NI, EV>(self, edges: Vec<(NI, NI, EV)>) -> GraphBuilder<FromEdges<NI, EV>> {
        GraphBuilder {
            state: FromEdges { edges },
        }
    }
}

impl<NI, EV> GraphBuilder<FromEdges<NI, EV>>
where
    NI: Idx,
    EV: Copy + PartialEq + Send + Sync,
{
    pub fn build_undirected<Index: Idx, NV>(self, vertex_count: usize) -> Result<UndirectedCsrGraph<Index, NI, NV, EV>> {
        UndirectedCsrGraph::from_edges(&self.state.edges, vertex_count, None)
    }

    pub fn build_directed<Index: Idx, NV>(self, vertex_count: usize) -> Result<DirectedCsrGraph<Index, NI, NV, EV>> {
        DirectedCsrGraph::from_edges(&self.state.edges, vertex_count, None)
    }
}
