//! Collection membership, lookup, traversal and lifecycle teardown.

use log::debug;

use crate::context::SessionContext;
use crate::error::GraphError;
use crate::model::graph::{CollectionId, Graph};
use crate::model::node::{Node, NodeId};
use crate::plugin::{PluginKind, PluginRegistry};

/// Arguments for [`Graph::create_node`].
pub struct CreateNodeArgs {
    pub plugin_id: String,
    /// Requested script-name; renamed with a digit suffix on collision.
    /// When absent the name is generated from the plug-in label.
    pub script_name: Option<String>,
    /// Currently selected node to auto-connect the new node to.
    pub auto_connect: Option<NodeId>,
    pub(crate) scaffold_subgraph: bool,
}

impl CreateNodeArgs {
    pub fn new(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            script_name: None,
            auto_connect: None,
            scaffold_subgraph: true,
        }
    }

    pub fn with_script_name(mut self, name: &str) -> Self {
        self.script_name = Some(name.to_string());
        self
    }

    pub fn with_auto_connect(mut self, selected: NodeId) -> Self {
        self.auto_connect = Some(selected);
        self
    }

    pub(crate) fn without_scaffold(mut self) -> Self {
        self.scaffold_subgraph = false;
        self
    }
}

/// Split a dotted path on its first `.`. Script-names containing literal
/// dots are not escapable; the first dot always wins.
pub fn split_path_head(path: &str) -> (&str, Option<&str>) {
    match path.find('.') {
        Some(i) => {
            let rest = &path[i + 1..];
            (&path[..i], (!rest.is_empty()).then_some(rest))
        }
        None => (path, None),
    }
}

/// Split a dotted path on its last `.`: the containing path and the leaf
/// name.
pub fn split_path_tail(path: &str) -> (Option<&str>, &str) {
    match path.rfind('.') {
        Some(i) => {
            let head = &path[..i];
            ((!head.is_empty()).then_some(head), &path[i + 1..])
        }
        None => (None, path),
    }
}

impl Graph {
    /// Append an already-named node to a collection. The caller must have
    /// reserved a unique script-name through `check_node_name` first.
    pub fn add_member(&mut self, coll: CollectionId, mut node: Node) -> Result<NodeId, GraphError> {
        if self.collection(coll).is_none() {
            return Err(GraphError::runtime(format!("{:?} is not a collection", coll)));
        }
        node.parent = coll;
        let id = self.insert_node(node);
        if let Some(state) = self.collection_mut(coll) {
            state.members.push(id);
        }
        Ok(id)
    }

    /// Remove a node from a collection's membership list by identity. Absent
    /// nodes are a no-op, but the removal hook still runs so group boundary
    /// views stay consistent with caller mistakes.
    pub fn remove_member(&mut self, coll: CollectionId, id: NodeId) {
        if let Some(state) = self.collection_mut(coll) {
            state.members.retain(|m| *m != id);
        }
        if let CollectionId::Group(group_id) = coll {
            self.prune_group_views(group_id, id);
        }
    }

    pub fn members(&self, coll: CollectionId) -> Vec<NodeId> {
        self.collection(coll).map(|c| c.members.clone()).unwrap_or_default()
    }

    pub fn has_members(&self, coll: CollectionId) -> bool {
        self.collection(coll).map(|c| !c.members.is_empty()).unwrap_or(false)
    }

    /// Most recently added member created from the given plug-in.
    pub fn last_member_with_plugin(&self, coll: CollectionId, plugin_id: &str) -> Option<NodeId> {
        self.members(coll)
            .into_iter()
            .rev()
            .find(|id| self.node(*id).map(|n| n.plugin.id == plugin_id).unwrap_or(false))
    }

    /// All members, descending into every group, depth-first pre-order.
    pub fn members_recursive(&self, coll: CollectionId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_members_recursive(coll, &mut out);
        out
    }

    fn collect_members_recursive(&self, coll: CollectionId, out: &mut Vec<NodeId>) {
        for id in self.members(coll) {
            out.push(id);
            if self.node(id).map(|n| n.is_group()).unwrap_or(false) {
                self.collect_members_recursive(CollectionId::Group(id), out);
            }
        }
    }

    /// Per-role recursive collector (all writers, all readers, ...).
    pub fn members_with_kind_recursive(&self, coll: CollectionId, kind: PluginKind) -> Vec<NodeId> {
        self.members_recursive(coll)
            .into_iter()
            .filter(|id| self.node(*id).map(|n| n.plugin.kind == kind).unwrap_or(false))
            .collect()
    }

    pub fn find_by_name(&self, coll: CollectionId, name: &str) -> Option<NodeId> {
        self.members(coll)
            .into_iter()
            .find(|id| self.node(*id).map(|n| n.script_name == name).unwrap_or(false))
    }

    /// Resolve a dotted path: the head names a member of this collection,
    /// the remainder recurses into that member's sub-graph when it is a
    /// group. "Not found" is `None`, never an error.
    pub fn find_by_path(&self, coll: CollectionId, path: &str) -> Option<NodeId> {
        let (head, rest) = split_path_head(path);
        let id = self.find_by_name(coll, head)?;
        match rest {
            None => Some(id),
            Some(rest) if self.node(id)?.is_group() => {
                self.find_by_path(CollectionId::Group(id), rest)
            }
            Some(_) => None,
        }
    }

    pub fn check_name_exists(&self, coll: CollectionId, name: &str, exclude: Option<NodeId>) -> bool {
        self.members(coll).into_iter().any(|id| {
            Some(id) != exclude
                && self.node(id).map(|n| n.script_name == name).unwrap_or(false)
        })
    }

    pub fn check_label_exists(&self, coll: CollectionId, label: &str, exclude: Option<NodeId>) -> bool {
        self.members(coll).into_iter().any(|id| {
            Some(id) != exclude && self.node(id).map(|n| n.label == label).unwrap_or(false)
        })
    }

    pub fn is_editable(&self, coll: CollectionId) -> bool {
        self.collection(coll).map(|c| c.editable).unwrap_or(false)
    }

    pub fn set_editable(&mut self, coll: CollectionId, editable: bool) {
        if let Some(state) = self.collection_mut(coll) {
            state.editable = editable;
        }
    }

    pub fn is_edited_by_user(&self, coll: CollectionId) -> bool {
        self.collection(coll).map(|c| c.edited_by_user).unwrap_or(false)
    }

    /// Flip the edited flag. On a group this also updates the read-only
    /// state of user-added parameters on the owning node: a pristine
    /// (non-edited) sub-graph exposes its parameters as plug-in-declared.
    pub fn set_edited_by_user(&mut self, ctx: &SessionContext, coll: CollectionId, edited: bool) {
        if self.collection(coll).is_none() {
            return;
        }
        if let Some(state) = self.collection_mut(coll) {
            state.edited_by_user = edited;
        }
        if let CollectionId::Group(group_id) = coll {
            ctx.params.set_user_parameters_read_only(group_id, !edited);
        }
    }

    /// Create a node from a registered plug-in, resolve its unique name,
    /// add it to `coll`, activate it, scaffold its sub-graph when it is a
    /// group, and optionally auto-connect it to a selected node.
    pub fn create_node(
        &mut self,
        ctx: &SessionContext,
        registry: &PluginRegistry,
        coll: CollectionId,
        args: CreateNodeArgs,
    ) -> Result<NodeId, GraphError> {
        if self.collection(coll).is_none() {
            return Err(GraphError::runtime(format!("{:?} is not a collection", coll)));
        }
        let def = registry
            .get(&args.plugin_id)
            .ok_or_else(|| GraphError::PluginNotFound(args.plugin_id.clone()))?;
        let name = match &args.script_name {
            Some(requested) => self.resolve_recorded_name(ctx, coll, requested)?,
            None => self.initial_node_name(ctx, coll, &def)?,
        };
        let id = self.add_member(coll, Node::new(def, name, coll))?;
        self.activate_node(ctx, id);
        let is_group = self.node(id).map(|n| n.is_group()).unwrap_or(false);
        if is_group && args.scaffold_subgraph {
            self.setup_initial_subgraph(ctx, registry, id)?;
        }
        if let Some(selected) = args.auto_connect {
            if let Err(e) = self.auto_connect(ctx, selected, id) {
                debug!("auto-connect of new node skipped: {}", e);
            }
        }
        Ok(id)
    }

    /// Mark a node active and deliver the membership notification to its
    /// owning group, if any. Activation is distinct from membership: a node
    /// can be deactivated without leaving its collection.
    pub fn activate_node(&mut self, ctx: &SessionContext, id: NodeId) {
        let parent = match self.node_mut(id) {
            Some(node) if !node.active => {
                node.active = true;
                node.parent
            }
            _ => return,
        };
        if let CollectionId::Group(group_id) = parent {
            self.notify_member_activated(ctx, group_id, id);
        }
    }

    pub fn deactivate_node(&mut self, ctx: &SessionContext, id: NodeId) {
        let parent = match self.node_mut(id) {
            Some(node) if node.active => {
                node.active = false;
                node.parent
            }
            _ => return,
        };
        if let CollectionId::Group(group_id) = parent {
            self.notify_member_deactivated(ctx, group_id, id);
        }
    }

    /// Ask the host to stop processing on every member, groups recursively.
    /// The blocking form waits for each node, the non-blocking form only
    /// requests cessation.
    pub fn quit_processing_recursive(&self, ctx: &SessionContext, coll: CollectionId, blocking: bool) {
        for id in self.members(coll) {
            ctx.host.quit_processing(id, blocking);
            if self.node(id).map(|n| n.is_group()).unwrap_or(false) {
                self.quit_processing_recursive(ctx, CollectionId::Group(id), blocking);
            }
        }
    }

    /// Tear down every member of a collection: halt processing (waiting when
    /// `blocking`), then destroy members, group sub-graphs first.
    pub fn clear_members(&mut self, ctx: &SessionContext, coll: CollectionId, blocking: bool) {
        self.quit_processing_recursive(ctx, coll, blocking);
        self.clear_members_internal(ctx, coll);
    }

    fn clear_members_internal(&mut self, ctx: &SessionContext, coll: CollectionId) {
        let members = self.members(coll);
        for id in &members {
            if self.node(*id).map(|n| n.is_group()).unwrap_or(false) {
                // Suppress boundary notifications while the whole group dies.
                if let Some(group) = self.group_mut(*id) {
                    group.deactivating = true;
                }
                self.clear_members_internal(ctx, CollectionId::Group(*id));
            }
        }
        for id in &members {
            self.detach_node_links(*id);
            ctx.host.node_destroyed(*id);
            self.take_node(*id);
        }
        if let Some(state) = self.collection_mut(coll) {
            state.members.clear();
        }
        // The boundary views of a cleared group mirror an empty sub-graph.
        if let CollectionId::Group(id) = coll {
            let slot_count = self.node(id).map(|n| n.inputs.len()).unwrap_or(0);
            for slot in 0..slot_count {
                self.set_input(id, slot, None);
            }
            if let Some(node) = self.node_mut(id) {
                node.inputs.clear();
                node.input_labels.clear();
            }
            if let Some(group) = self.group_mut(id) {
                group.inputs.clear();
                group.outputs.clear();
            }
        }
    }

    /// Clear every link touching `id`, both upstream and downstream, keeping
    /// the two link tables consistent.
    pub(crate) fn detach_node_links(&mut self, id: NodeId) {
        let slot_count = self.node(id).map(|n| n.inputs.len()).unwrap_or(0);
        for slot in 0..slot_count {
            self.set_input(id, slot, None);
        }
        for edge in self.output_edges(id).to_vec() {
            self.set_input(edge.node, edge.slot, None);
        }
    }

    /// Destroy one node: halt-free removal used by interactive deletion.
    /// When the node had exactly one connected upstream, that upstream is
    /// spliced into all former consumers (the auto-connect preference for
    /// deletions).
    pub fn destroy_node(&mut self, ctx: &SessionContext, id: NodeId) -> Result<(), GraphError> {
        let Some(node) = self.node(id) else {
            return Err(GraphError::NodeNotFound(id.to_string()));
        };
        let parent = node.parent;
        let connected: Vec<NodeId> = node.inputs.iter().flatten().copied().collect();
        let splice = (connected.len() == 1).then(|| connected[0]);
        let consumers = self.output_edges(id).to_vec();

        self.deactivate_node(ctx, id);
        if self.node(id).map(|n| n.is_group()).unwrap_or(false) {
            if let Some(group) = self.group_mut(id) {
                group.deactivating = true;
            }
            self.clear_members(ctx, CollectionId::Group(id), false);
        }
        self.detach_node_links(id);

        for edge in &consumers {
            if let Some(upstream) = splice {
                self.set_input(edge.node, edge.slot, Some(upstream));
            }
            ctx.host.input_changed(edge.node, edge.slot);
        }

        self.remove_member(parent, id);
        self.take_node(id);
        ctx.host.node_destroyed(id);
        Ok(())
    }
}
