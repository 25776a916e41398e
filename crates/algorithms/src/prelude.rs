pub use crate::afforest::Afforest;
pub use crate::connected_components::{connected_components, ConnectedComponentsConfig, ConnectedComponentsResult};
pub use crate::delta_stepping::{delta_stepping, ShortestPathsDescriptor, ShortestPathsResult, SsspOutputs};
pub use crate::louvain::{louvain, LouvainDescriptor, LouvainResult};
pub use crate::result::TableView;
