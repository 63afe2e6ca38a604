//! The flat node store. Nodes live in one arena keyed by id; collections
//! (the root graph and every group sub-graph) hold ordered id lists. Output
//! edges are a relation table maintained alongside the authoritative
//! input-slot table, not back-pointers.

use std::collections::HashMap;

use crate::model::node::{CollectionState, GroupState, Node, NodeId};

/// Handle to one collection: the root graph or the sub-graph of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionId {
    Root,
    Group(NodeId),
}

/// One downstream consumer of a node: which node reads from it, on which of
/// the consumer's input slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEdge {
    pub node: NodeId,
    pub slot: usize,
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    /// Relation table: upstream id → its consumers.
    outputs: HashMap<NodeId, Vec<OutputEdge>>,
    root: CollectionState,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn group(&self, id: NodeId) -> Option<&GroupState> {
        self.nodes.get(&id).and_then(|n| n.group.as_ref())
    }

    pub fn group_mut(&mut self, id: NodeId) -> Option<&mut GroupState> {
        self.nodes.get_mut(&id).and_then(|n| n.group.as_mut())
    }

    pub fn collection(&self, coll: CollectionId) -> Option<&CollectionState> {
        match coll {
            CollectionId::Root => Some(&self.root),
            CollectionId::Group(id) => self.group(id).map(|g| &g.collection),
        }
    }

    pub fn collection_mut(&mut self, coll: CollectionId) -> Option<&mut CollectionState> {
        match coll {
            CollectionId::Root => Some(&mut self.root),
            CollectionId::Group(id) => self.group_mut(id).map(|g| &mut g.collection),
        }
    }

    /// Downstream consumers of `id`. Unordered set semantics; the vec order
    /// carries no meaning.
    pub fn output_edges(&self, id: NodeId) -> &[OutputEdge] {
        self.outputs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn take_node(&mut self, id: NodeId) -> Option<Node> {
        self.outputs.remove(&id);
        self.nodes.remove(&id)
    }

    /// Rewrite one input slot, keeping the relation table consistent. Returns
    /// the previous occupant. Out-of-range slots and unknown consumers are
    /// a no-op returning `None`.
    pub(crate) fn set_input(
        &mut self,
        consumer: NodeId,
        slot: usize,
        upstream: Option<NodeId>,
    ) -> Option<NodeId> {
        let old = match self.nodes.get_mut(&consumer) {
            Some(node) if slot < node.inputs.len() => {
                std::mem::replace(&mut node.inputs[slot], upstream)
            }
            _ => return None,
        };
        if let Some(old_upstream) = old {
            if let Some(edges) = self.outputs.get_mut(&old_upstream) {
                edges.retain(|e| !(e.node == consumer && e.slot == slot));
                if edges.is_empty() {
                    self.outputs.remove(&old_upstream);
                }
            }
        }
        if let Some(new_upstream) = upstream {
            self.outputs
                .entry(new_upstream)
                .or_default()
                .push(OutputEdge { node: consumer, slot });
        }
        old
    }

    /// Verify that the input-slot table and the output-edge relation table
    /// agree in both directions. Test support.
    pub fn debug_check_edges(&self) -> Result<(), String> {
        for (id, node) in &self.nodes {
            for (slot, upstream) in node.inputs.iter().enumerate() {
                let Some(upstream) = upstream else { continue };
                let count = self
                    .output_edges(*upstream)
                    .iter()
                    .filter(|e| e.node == *id && e.slot == slot)
                    .count();
                if count != 1 {
                    return Err(format!(
                        "slot {}[{}] <- {} has {} output-edge records",
                        node.script_name, slot, upstream, count
                    ));
                }
            }
        }
        for (upstream, edges) in &self.outputs {
            for edge in edges {
                let ok = self
                    .nodes
                    .get(&edge.node)
                    .and_then(|n| n.inputs.get(edge.slot))
                    .map(|occ| *occ == Some(*upstream))
                    .unwrap_or(false);
                if !ok {
                    return Err(format!(
                        "stale output edge {} -> ({}, {})",
                        upstream, edge.node, edge.slot
                    ));
                }
            }
        }
        Ok(())
    }
}
