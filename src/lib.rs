//! Hierarchical node-graph engine: a flat node store organised into
//! collections (the top-level graph and group sub-graphs), with unique
//! script-name resolution, connection management with cycle prevention,
//! group boundary maintenance and serialization-driven reconstruction.
//!
//! The engine owns structure only. Processing, parameter storage and UI are
//! collaborators reached through the traits in [`context`].

pub mod context;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod model;
pub mod plugin;

pub use context::{NodeHost, NoParameters, NullHost, ParameterHost, SessionContext};
pub use error::GraphError;
pub use graph::{make_script_friendly, CreateNodeArgs, CreateNodesOptions};
pub use handlers::graph_handler::GraphHandler;
pub use model::{
    CollectionId, Graph, Node, NodeId, NodeRecord, OutputEdge, ParamLink,
};
pub use plugin::{
    InputDef, PluginDef, PluginKind, PluginRegistry, PluginVersion, GROUP_INPUT_PLUGIN_ID,
    GROUP_OUTPUT_PLUGIN_ID, GROUP_PLUGIN_ID, STUB_PLUGIN_ID,
};
