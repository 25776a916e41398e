//! Graph algorithms over [`graph_core`]'s CSR graphs: Afforest-style
//! connected components, Delta-Stepping single-source shortest paths, and
//! multi-level Louvain community detection.

pub mod afforest;
pub mod connected_components;
pub mod delta_stepping;
pub mod louvain;
pub mod result;

pub mod prelude;
