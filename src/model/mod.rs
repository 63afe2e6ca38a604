pub mod graph;
pub mod node;
pub mod serialization;

pub use graph::{CollectionId, Graph, OutputEdge};
pub use node::{CollectionState, GroupState, Node, NodeId};
pub use serialization::{NodeRecord, ParamLink};
