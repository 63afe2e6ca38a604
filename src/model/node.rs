//! Node and collection state. These are plain data; all invariants are
//! maintained by the operations layer in `crate::graph`.

use std::sync::Arc;

use uuid::Uuid;

use crate::model::graph::CollectionId;
use crate::plugin::{PluginDef, PluginKind};

pub type NodeId = Uuid;

/// Membership and edit flags of one collection (the root graph or a group's
/// sub-graph). Member order is insertion order and is the iteration order
/// everywhere.
#[derive(Debug, Clone)]
pub struct CollectionState {
    pub members: Vec<NodeId>,
    /// Whether the UI may restructure this sub-graph at all.
    pub editable: bool,
    /// Whether the user ever diverged it from its auto-generated state.
    pub edited_by_user: bool,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            editable: true,
            edited_by_user: false,
        }
    }
}

/// The collection facet of a group node: its sub-graph plus the derived
/// boundary views. The views are only rewritten by the activation
/// notifications in `crate::graph::group`, never by scanning.
#[derive(Debug, Clone)]
pub struct GroupState {
    pub collection: CollectionState,
    /// Designated input members, ordered. One external slot per entry.
    pub inputs: Vec<NodeId>,
    /// Designated output members. Only the first is meaningful.
    pub outputs: Vec<NodeId>,
    /// Re-entrancy guards suppressing boundary notifications during bulk
    /// (de)activation of the whole group.
    pub activating: bool,
    pub deactivating: bool,
    /// Whether the sub-graph is saved with the project.
    pub persistent: bool,
    /// Whether the content comes from an immutable preset definition.
    pub preset: bool,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            collection: CollectionState::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            activating: false,
            deactivating: false,
            persistent: true,
            preset: false,
        }
    }
}

/// A node in the graph. Owned by the flat store in `Graph`; collections only
/// reference it by id.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Unique, script-safe identifier within the parent collection.
    pub script_name: String,
    /// Display name. May collide with other labels.
    pub label: String,
    pub plugin: Arc<PluginDef>,
    pub parent: CollectionId,
    /// Input slot occupancy. Kept consistent with the output-edge relation
    /// table through `Graph::set_input`.
    pub inputs: Vec<Option<NodeId>>,
    /// Per-slot labels. Fixed by the plug-in definition for regular nodes,
    /// derived from the designated-input members for groups.
    pub input_labels: Vec<String>,
    pub active: bool,
    pub group: Option<GroupState>,
}

impl Node {
    pub fn new(plugin: Arc<PluginDef>, script_name: impl Into<String>, parent: CollectionId) -> Self {
        let script_name = script_name.into();
        let inputs = vec![None; plugin.inputs.len()];
        let input_labels = plugin.inputs.iter().map(|d| d.label.clone()).collect();
        let group = (plugin.kind == PluginKind::Group).then(GroupState::default);
        Self {
            id: Uuid::new_v4(),
            label: script_name.clone(),
            script_name,
            plugin,
            parent,
            inputs,
            input_labels,
            active: false,
            group,
        }
    }

    pub fn max_input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_index_from_label(&self, label: &str) -> Option<usize> {
        self.input_labels.iter().position(|l| l == label)
    }

    pub fn is_mask_slot(&self, slot: usize) -> bool {
        self.plugin.inputs.get(slot).map(|d| d.mask).unwrap_or(false)
    }

    pub fn is_optional_slot(&self, slot: usize) -> bool {
        self.plugin
            .inputs
            .get(slot)
            .map(|d| d.optional)
            .unwrap_or(false)
    }

    pub fn is_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn is_group_input(&self) -> bool {
        self.plugin.kind == PluginKind::GroupInput
    }

    pub fn is_group_output(&self) -> bool {
        self.plugin.kind == PluginKind::GroupOutput
    }

    pub fn is_reader(&self) -> bool {
        self.plugin.kind == PluginKind::Reader
    }

    pub fn is_writer(&self) -> bool {
        self.plugin.kind == PluginKind::Writer
    }

    /// Terminal ("sink") nodes cannot feed anything downstream.
    pub fn is_output_node(&self) -> bool {
        self.plugin.kind.is_terminal()
    }
}
