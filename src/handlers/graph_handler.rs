//! Thread-safe entry points over a shared graph. Handlers are stateless;
//! every call locks, delegates to the engine and releases. The collaborator
//! context and the plug-in registry are passed per call so several graphs
//! can share one registry.

use std::sync::{Arc, RwLock};

use crate::context::SessionContext;
use crate::error::GraphError;
use crate::graph::collection::CreateNodeArgs;
use crate::graph::deserialize::CreateNodesOptions;
use crate::model::graph::{CollectionId, Graph};
use crate::model::node::NodeId;
use crate::model::serialization::NodeRecord;
use crate::plugin::PluginRegistry;

pub struct GraphHandler;

impl GraphHandler {
    /// Create a node in `coll` and return its id.
    pub fn create_node(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        registry: &PluginRegistry,
        coll: CollectionId,
        args: CreateNodeArgs,
    ) -> Result<NodeId, GraphError> {
        let mut g = super::write_graph(graph)?;
        g.create_node(ctx, registry, coll, args)
    }

    pub fn destroy_node(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        node: NodeId,
    ) -> Result<(), GraphError> {
        let mut g = super::write_graph(graph)?;
        g.destroy_node(ctx, node)
    }

    pub fn connect(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        consumer: NodeId,
        slot: usize,
        upstream: NodeId,
    ) -> Result<(), GraphError> {
        let mut g = super::write_graph(graph)?;
        g.connect_input(ctx, consumer, slot, upstream)
    }

    pub fn disconnect(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        consumer: NodeId,
        slot: usize,
    ) -> Result<Option<NodeId>, GraphError> {
        let mut g = super::write_graph(graph)?;
        g.disconnect_input(ctx, consumer, slot)
    }

    /// Wire a freshly created node against the current selection.
    pub fn auto_connect(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        selected: NodeId,
        created: NodeId,
    ) -> Result<(), GraphError> {
        let mut g = super::write_graph(graph)?;
        g.auto_connect(ctx, selected, created)
    }

    /// Resolve a dotted path relative to `coll`.
    pub fn find_node(
        graph: &Arc<RwLock<Graph>>,
        coll: CollectionId,
        path: &str,
    ) -> Result<Option<NodeId>, GraphError> {
        let g = super::read_graph(graph)?;
        Ok(g.find_by_path(coll, path))
    }

    pub fn members(
        graph: &Arc<RwLock<Graph>>,
        coll: CollectionId,
    ) -> Result<Vec<NodeId>, GraphError> {
        let g = super::read_graph(graph)?;
        Ok(g.members(coll))
    }

    /// Rebuild a collection from serialization records. Returns the created
    /// ids and whether the load was clean.
    pub fn load_records(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        registry: &PluginRegistry,
        coll: CollectionId,
        records: &[NodeRecord],
        opts: &CreateNodesOptions,
    ) -> Result<(Vec<NodeId>, bool), GraphError> {
        let mut g = super::write_graph(graph)?;
        Ok(g.create_nodes_from_serialization(ctx, registry, coll, records, opts))
    }

    pub fn serialize(
        graph: &Arc<RwLock<Graph>>,
        coll: CollectionId,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let g = super::read_graph(graph)?;
        Ok(g.serialize_collection(coll))
    }

    /// Tear down every node in the graph, waiting for processing to stop
    /// when `blocking`.
    pub fn shutdown(
        graph: &Arc<RwLock<Graph>>,
        ctx: &SessionContext,
        blocking: bool,
    ) -> Result<(), GraphError> {
        let mut g = super::write_graph(graph)?;
        g.clear_members(ctx, CollectionId::Root, blocking);
        Ok(())
    }
}
