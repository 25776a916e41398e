pub use crate::allocator::{Allocator, CountingAllocator, Tracked};
pub use crate::builder::GraphBuilder;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::graph::csr::{Target, Topology};
pub use crate::graph::{
    DirectedCsrGraph, DirectedDegrees, DirectedNeighbors, DirectedNeighborsWithValues, Graph, NodeValues,
    UndirectedCsrGraph, UndirectedDegrees, UndirectedNeighbors, UndirectedNeighborsWithValues,
};
pub use crate::index::Idx;
pub use crate::input::csv::{read_csv, read_edge_list, read_weighted_edge_list, ParsedEdges};
pub use crate::input::CsvMode;
