pub mod graph_handler;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::GraphError;
use crate::model::graph::Graph;

/// Acquire a write lock on the graph, converting poison errors to GraphError.
pub fn write_graph(graph: &Arc<RwLock<Graph>>) -> Result<RwLockWriteGuard<'_, Graph>, GraphError> {
    graph
        .write()
        .map_err(|_| GraphError::runtime("Lock Poisoned"))
}

/// Acquire a read lock on the graph, converting poison errors to GraphError.
pub fn read_graph(graph: &Arc<RwLock<Graph>>) -> Result<RwLockReadGuard<'_, Graph>, GraphError> {
    graph
        .read()
        .map_err(|_| GraphError::runtime("Lock Poisoned"))
}
