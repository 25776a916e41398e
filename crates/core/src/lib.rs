//! In-memory CSR graph topology, a CSV ingestion pipeline, and the allocator
//! capability shared by every algorithm built on top of this crate.
//!
//! ```
//! use graph_core::prelude::*;
//!
//! let edges = vec![(0i32, 1i32, ()), (1, 2, ()), (2, 0, ())];
//! let graph: UndirectedCsrGraph<i64, i32> = GraphBuilder::new()
//!     .edges(edges)
//!     .build_undirected(3)
//!     .unwrap();
//!
//! assert_eq!(graph.vertex_count(), 3);
//! assert_eq!(graph.edge_count(), 3);
//! assert_eq!(graph.degree(0).unwrap(), 2);
//! ```

pub mod allocator;
pub mod builder;
pub mod error;
pub mod graph;
pub mod index;
pub mod input;

pub mod prelude;

pub use error::Error;
