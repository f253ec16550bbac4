//! Pipeline graph model: canonical types, shape-tolerant reader, topology.

pub mod contract;
pub mod topology;
pub mod types;

pub use contract::{normalize, parse_graph};
pub use topology::GraphTopology;
pub use types::*;
