//! Two-phase reconstruction of a collection from serialization records:
//! create every node first, then restore connections and parameter links
//! once all potential targets exist. Failures are reported as warnings and
//! never abort the load; the graph that results is the best one available.

use std::collections::BTreeMap;

use crate::context::SessionContext;
use crate::graph::collection::CreateNodeArgs;
use crate::model::graph::{CollectionId, Graph};
use crate::model::node::NodeId;
use crate::model::serialization::NodeRecord;
use crate::plugin::PluginRegistry;

/// Options for [`Graph::create_nodes_from_serialization`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateNodesOptions {
    /// Allow connection targets to resolve against pre-existing members of
    /// the destination collection (pasting into a populated graph). Nested
    /// sub-graphs are always self-contained and load with this off.
    pub allow_external_links: bool,
}

/// Record index to created node, in creation order. Connections resolve
/// against the RECORDED names through this map, so nodes renamed on
/// collision still receive their links.
type CreatedNodes = Vec<(usize, NodeId)>;

fn created_by_recorded_name(
    records: &[NodeRecord],
    created: &CreatedNodes,
    name: &str,
) -> Option<NodeId> {
    created
        .iter()
        .find(|(index, _)| records[*index].script_name == name)
        .map(|(_, id)| *id)
}

impl Graph {
    /// Recreate `records` inside `coll`. Returns the created node ids and
    /// whether the load was clean; stub substitutions and failed records
    /// make it unclean while still loading everything else. Progress and
    /// problems are reported through `ctx`.
    pub fn create_nodes_from_serialization(
        &mut self,
        ctx: &SessionContext,
        registry: &PluginRegistry,
        coll: CollectionId,
        records: &[NodeRecord],
        opts: &CreateNodesOptions,
    ) -> (Vec<NodeId>, bool) {
        let where_label = match coll {
            CollectionId::Root => "top-level graph".to_string(),
            CollectionId::Group(id) => self
                .node(id)
                .map(|n| n.label.clone())
                .unwrap_or_else(|| "group".to_string()),
        };
        ctx.update_load_status(format!(
            "creating {} node(s) in {}",
            records.len(),
            where_label
        ));

        let mut created: CreatedNodes = Vec::with_capacity(records.len());
        let mut clean = true;

        for (index, record) in records.iter().enumerate() {
            match self.create_recorded_node(ctx, registry, coll, record, &mut clean) {
                Some(id) => created.push((index, id)),
                None => clean = false,
            }
        }

        for (index, id) in &created {
            let record = &records[*index];
            self.restore_recorded_inputs(ctx, coll, *id, &record.inputs, records, &created, opts, false);
            self.restore_recorded_inputs(ctx, coll, *id, &record.masks, records, &created, opts, true);
        }

        self.restore_links_recursive(ctx, coll, records, Some(&created));

        (created.into_iter().map(|(_, id)| id).collect(), clean)
    }

    /// Phase one for a single record: resolve the plug-in (falling back to
    /// the stub), resolve the name, create without scaffolding, recurse
    /// into children. `None` when the record cannot be loaded at all.
    fn create_recorded_node(
        &mut self,
        ctx: &SessionContext,
        registry: &PluginRegistry,
        coll: CollectionId,
        record: &NodeRecord,
        clean: &mut bool,
    ) -> Option<NodeId> {
        let plugin = match registry.get(&record.plugin_id) {
            Some(def) => {
                if let Some(recorded) = record.plugin_version {
                    if recorded != def.version {
                        ctx.report_warning(format!(
                            "{}: recorded with {} {}, loading with version {}",
                            record.script_name, record.plugin_id, recorded, def.version
                        ));
                    }
                }
                def
            }
            None => {
                ctx.report_warning(format!(
                    "{}: plug-in {} is not available, inserting a placeholder",
                    record.script_name, record.plugin_id
                ));
                *clean = false;
                registry.stub()
            }
        };

        let args = CreateNodeArgs::new(&plugin.id)
            .with_script_name(&record.script_name)
            .without_scaffold();
        let id = match self.create_node(ctx, registry, coll, args) {
            Ok(id) => id,
            Err(e) => {
                ctx.report_warning(format!(
                    "could not recreate node {}: {}",
                    record.script_name, e
                ));
                return None;
            }
        };
        if !record.label.is_empty() {
            if let Some(node) = self.node_mut(id) {
                node.label = record.label.clone();
            }
        }

        if self.node(id).map(|n| n.is_group()).unwrap_or(false) && !record.children.is_empty() {
            let child_coll = CollectionId::Group(id);
            let child_opts = CreateNodesOptions { allow_external_links: false };
            let (_, child_clean) = self.create_nodes_from_serialization(
                ctx,
                registry,
                child_coll,
                &record.children,
                &child_opts,
            );
            if !child_clean {
                *clean = false;
            }
            self.set_edited_by_user(ctx, child_coll, true);
        }
        Some(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn restore_recorded_inputs(
        &mut self,
        ctx: &SessionContext,
        coll: CollectionId,
        id: NodeId,
        entries: &BTreeMap<String, String>,
        records: &[NodeRecord],
        created: &CreatedNodes,
        opts: &CreateNodesOptions,
        masks: bool,
    ) {
        for (slot_key, upstream_name) in entries {
            if upstream_name.is_empty() {
                continue;
            }
            self.restore_recorded_input(
                ctx, coll, id, slot_key, upstream_name, records, created, opts, masks,
            );
        }
    }

    /// Resolve one recorded connection. The slot key is a label first and a
    /// textual index second; a numeric mask key counts mask slots only.
    /// The upstream name resolves against the recorded names of this batch
    /// first, then optionally against live members of the collection.
    #[allow(clippy::too_many_arguments)]
    fn restore_recorded_input(
        &mut self,
        ctx: &SessionContext,
        coll: CollectionId,
        id: NodeId,
        slot_key: &str,
        upstream_name: &str,
        records: &[NodeRecord],
        created: &CreatedNodes,
        opts: &CreateNodesOptions,
        masks: bool,
    ) {
        let Some(node) = self.node(id) else { return };
        let node_name = node.script_name.clone();

        let mut slot = node.input_index_from_label(slot_key);
        if slot.is_none() {
            if let Ok(index) = slot_key.parse::<usize>() {
                slot = if masks {
                    // The recorded number indexes the node's mask slots.
                    (0..node.max_input_count())
                        .filter(|s| node.is_mask_slot(*s))
                        .nth(index)
                } else {
                    Some(index)
                };
            }
        }
        let Some(slot) = slot.filter(|s| *s < node.max_input_count()) else {
            ctx.report_warning(format!(
                "{}: no input named {}, connection to {} dropped",
                node_name, slot_key, upstream_name
            ));
            return;
        };

        let upstream = created_by_recorded_name(records, created, upstream_name).or_else(|| {
            opts.allow_external_links
                .then(|| self.find_by_name(coll, upstream_name))
                .flatten()
        });
        let Some(upstream) = upstream else {
            ctx.report_warning(format!(
                "{}: could not find {} to reconnect, the input stays disconnected",
                node_name, upstream_name
            ));
            return;
        };

        if let Err(e) = self.swap_input(ctx, id, slot, Some(upstream)) {
            ctx.report_warning(format!("{}: {}", node_name, e));
        }
    }

    /// Phase three: parameter links, depth-first. The recorded-name map only
    /// applies at the batch's own level; nested levels resolve by live name.
    fn restore_links_recursive(
        &mut self,
        ctx: &SessionContext,
        coll: CollectionId,
        records: &[NodeRecord],
        created: Option<&CreatedNodes>,
    ) {
        for record in records {
            let id = created
                .and_then(|c| created_by_recorded_name(records, c, &record.script_name))
                .or_else(|| self.find_by_name(coll, &record.script_name));
            let Some(id) = id else { continue };

            for link in &record.param_links {
                let target = created
                    .and_then(|c| created_by_recorded_name(records, c, &link.target_node))
                    .or_else(|| self.find_by_path(coll, &link.target_node));
                if !ctx.params.restore_link(id, link, target) {
                    ctx.report_warning(format!(
                        "{}: could not link {} to {}.{}",
                        record.script_name, link.param, link.target_node, link.target_param
                    ));
                }
            }

            if self.node(id).map(|n| n.is_group()).unwrap_or(false)
                && !record.children.is_empty()
            {
                self.restore_links_recursive(ctx, CollectionId::Group(id), &record.children, None);
            }
        }
    }

    /// Inverse of the loader: descriptor records for every member of a
    /// collection, groups recursively.
    pub fn serialize_collection(&self, coll: CollectionId) -> Vec<NodeRecord> {
        self.members(coll)
            .into_iter()
            .filter_map(|id| self.node(id).map(|n| (id, n)))
            .map(|(id, node)| {
                let mut record = NodeRecord {
                    script_name: node.script_name.clone(),
                    label: node.label.clone(),
                    plugin_id: node.plugin.id.clone(),
                    plugin_version: Some(node.plugin.version),
                    ..Default::default()
                };
                for (slot, occupant) in node.inputs.iter().enumerate() {
                    let Some(upstream) = occupant else { continue };
                    let Some(upstream_name) =
                        self.node(*upstream).map(|n| n.script_name.clone())
                    else {
                        continue;
                    };
                    let key = node
                        .input_labels
                        .get(slot)
                        .filter(|l| !l.is_empty())
                        .cloned()
                        .unwrap_or_else(|| slot.to_string());
                    if node.is_mask_slot(slot) {
                        record.masks.insert(key, upstream_name);
                    } else {
                        record.inputs.insert(key, upstream_name);
                    }
                }
                if node.is_group() {
                    record.children = self.serialize_collection(CollectionId::Group(id));
                }
                record
            })
            .collect()
    }
}
