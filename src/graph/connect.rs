//! Connection validation and the auto-connect heuristic.

use std::collections::{HashSet, VecDeque};

use crate::context::SessionContext;
use crate::error::GraphError;
use crate::model::graph::Graph;
use crate::model::node::NodeId;

impl Graph {
    /// Preferred slot for a new connection: the first free mandatory
    /// non-mask slot, then any free non-mask slot, then any free slot.
    /// `None` when every slot is taken.
    pub fn preferred_input(&self, id: NodeId) -> Option<usize> {
        let node = self.node(id)?;
        let free = |(slot, occupant): (usize, &Option<NodeId>)| occupant.is_none().then_some(slot);
        node.inputs
            .iter()
            .enumerate()
            .filter(|(slot, _)| !node.is_mask_slot(*slot) && !node.is_optional_slot(*slot))
            .find_map(free)
            .or_else(|| {
                node.inputs
                    .iter()
                    .enumerate()
                    .filter(|(slot, _)| !node.is_mask_slot(*slot))
                    .find_map(free)
            })
            .or_else(|| node.inputs.iter().enumerate().find_map(free))
    }

    /// Whether making `upstream` feed `consumer` would close a cycle, i.e.
    /// whether `upstream` is reachable downstream of `consumer`.
    fn would_create_cycle(&self, consumer: NodeId, upstream: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([consumer]);
        while let Some(current) = queue.pop_front() {
            if current == upstream {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for edge in self.output_edges(current) {
                queue.push_back(edge.node);
            }
        }
        false
    }

    /// Validate a prospective connection without making it.
    pub fn can_connect(
        &self,
        consumer: NodeId,
        slot: usize,
        upstream: NodeId,
    ) -> Result<(), GraphError> {
        let node = self
            .node(consumer)
            .ok_or_else(|| GraphError::NodeNotFound(consumer.to_string()))?;
        let source = self
            .node(upstream)
            .ok_or_else(|| GraphError::NodeNotFound(upstream.to_string()))?;
        if slot >= node.max_input_count() {
            return Err(GraphError::rejected(format!(
                "{} has no input slot {}",
                node.script_name, slot
            )));
        }
        if consumer == upstream {
            return Err(GraphError::rejected("a node cannot be connected to itself"));
        }
        if source.is_output_node() {
            return Err(GraphError::rejected(format!(
                "{} is a terminal node and cannot feed another node",
                source.script_name
            )));
        }
        if self.would_create_cycle(consumer, upstream) {
            return Err(GraphError::rejected("the connection would create a cycle"));
        }
        Ok(())
    }

    /// Connect `upstream` into a free slot. Occupied slots are an error;
    /// use [`Graph::swap_input`] to replace.
    pub fn connect_input(
        &mut self,
        ctx: &SessionContext,
        consumer: NodeId,
        slot: usize,
        upstream: NodeId,
    ) -> Result<(), GraphError> {
        self.can_connect(consumer, slot, upstream)?;
        let occupied = self
            .node(consumer)
            .and_then(|n| n.inputs.get(slot).copied())
            .flatten()
            .is_some();
        if occupied {
            return Err(GraphError::rejected(format!(
                "input slot {} is already connected",
                slot
            )));
        }
        self.set_input(consumer, slot, Some(upstream));
        ctx.host.input_changed(consumer, slot);
        Ok(())
    }

    /// Rewrite one slot regardless of occupancy, returning the previous
    /// occupant. `None` disconnects.
    pub fn swap_input(
        &mut self,
        ctx: &SessionContext,
        consumer: NodeId,
        slot: usize,
        upstream: Option<NodeId>,
    ) -> Result<Option<NodeId>, GraphError> {
        match upstream {
            Some(upstream) => self.can_connect(consumer, slot, upstream)?,
            None => {
                let in_range = self
                    .node(consumer)
                    .map(|n| slot < n.max_input_count())
                    .unwrap_or(false);
                if !in_range {
                    return Err(GraphError::rejected(format!(
                        "no input slot {} to disconnect",
                        slot
                    )));
                }
            }
        }
        let old = self.set_input(consumer, slot, upstream);
        ctx.host.input_changed(consumer, slot);
        Ok(old)
    }

    pub fn disconnect_input(
        &mut self,
        ctx: &SessionContext,
        consumer: NodeId,
        slot: usize,
    ) -> Result<Option<NodeId>, GraphError> {
        self.swap_input(ctx, consumer, slot, None)
    }

    /// Disconnect every slot of `consumer` currently fed by `upstream`.
    /// Returns the slots that were cleared.
    pub fn disconnect_upstream(
        &mut self,
        ctx: &SessionContext,
        consumer: NodeId,
        upstream: NodeId,
    ) -> Vec<usize> {
        let slots: Vec<usize> = self
            .node(consumer)
            .map(|n| {
                n.inputs
                    .iter()
                    .enumerate()
                    .filter_map(|(slot, occ)| (*occ == Some(upstream)).then_some(slot))
                    .collect()
            })
            .unwrap_or_default();
        for slot in &slots {
            self.set_input(consumer, *slot, None);
            ctx.host.input_changed(consumer, *slot);
        }
        slots
    }

    /// Wire a freshly created node against the node the user had selected.
    ///
    /// Two source nodes or two terminal nodes cannot be wired. When the
    /// selected node is terminal, or the created node is a source, the
    /// created node becomes an input of the selected one. Otherwise the
    /// created node is appended downstream; a created filter is interposed,
    /// inheriting every consumer the selected node had. Rewired consumers
    /// are not restored if a later step fails.
    pub fn auto_connect(
        &mut self,
        ctx: &SessionContext,
        selected: NodeId,
        created: NodeId,
    ) -> Result<(), GraphError> {
        let sel = self
            .node(selected)
            .ok_or_else(|| GraphError::NodeNotFound(selected.to_string()))?;
        let cr = self
            .node(created)
            .ok_or_else(|| GraphError::NodeNotFound(created.to_string()))?;
        if sel.max_input_count() == 0 && cr.max_input_count() == 0 {
            return Err(GraphError::rejected(
                "cannot connect two nodes that take no input",
            ));
        }
        if sel.is_output_node() && cr.is_output_node() {
            return Err(GraphError::rejected("cannot connect two terminal nodes"));
        }
        let sel_name = sel.script_name.clone();
        let cr_name = cr.script_name.clone();
        let created_is_terminal = cr.is_output_node();
        let connect_as_input = if sel.is_output_node() {
            true
        } else if created_is_terminal {
            false
        } else {
            cr.max_input_count() == 0
        };

        if connect_as_input {
            let slot = self.preferred_input(selected).ok_or_else(|| {
                GraphError::rejected(format!("no free input slot on {}", sel_name))
            })?;
            self.swap_input(ctx, selected, slot, Some(created))?;
        } else {
            if !created_is_terminal {
                for edge in self.output_edges(selected).to_vec() {
                    self.swap_input(ctx, edge.node, edge.slot, Some(created))?;
                }
            }
            let slot = self.preferred_input(created).ok_or_else(|| {
                GraphError::rejected(format!("no free input slot on {}", cr_name))
            })?;
            self.swap_input(ctx, created, slot, Some(selected))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::collection::CreateNodeArgs;
    use crate::model::graph::CollectionId;
    use crate::plugin::{InputDef, PluginDef, PluginKind, PluginRegistry};

    fn registry() -> PluginRegistry {
        let registry = PluginRegistry::new();
        registry.register(PluginDef::new("io.read", "Read", PluginKind::Reader));
        registry.register(
            PluginDef::new("io.write", "Write", PluginKind::Writer)
                .with_inputs(vec![InputDef::new("Source")]),
        );
        registry.register(
            PluginDef::new("effect.blur", "Blur", PluginKind::Filter)
                .with_inputs(vec![InputDef::new("Source"), InputDef::mask("Mask")]),
        );
        registry.register(
            PluginDef::new("effect.merge", "Merge", PluginKind::Filter).with_inputs(vec![
                InputDef::new("A"),
                InputDef::new("B"),
            ]),
        );
        registry.register(PluginDef::new("gen.noise", "Noise", PluginKind::Generator));
        registry.register(
            PluginDef::new("effect.retime", "Retime", PluginKind::Filter).with_inputs(vec![
                InputDef::new("Ref").optional(),
                InputDef::new("Source"),
            ]),
        );
        registry
    }

    fn make(graph: &mut Graph, ctx: &SessionContext, registry: &PluginRegistry, id: &str) -> NodeId {
        graph
            .create_node(ctx, registry, CollectionId::Root, CreateNodeArgs::new(id))
            .unwrap()
    }

    #[test]
    fn preferred_input_skips_masks() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        let read = make(&mut graph, &ctx, &registry, "io.read");

        assert_eq!(graph.preferred_input(blur), Some(0));
        graph.connect_input(&ctx, blur, 0, read).unwrap();
        // Only the mask slot is left.
        assert_eq!(graph.preferred_input(blur), Some(1));
        assert_eq!(graph.preferred_input(read), None);
    }

    #[test]
    fn preferred_input_defers_optional_slots() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let retime = make(&mut graph, &ctx, &registry, "effect.retime");
        let noise = make(&mut graph, &ctx, &registry, "gen.noise");

        // The mandatory Source slot beats the optional Ref slot before it.
        assert_eq!(graph.preferred_input(retime), Some(1));
        graph.connect_input(&ctx, retime, 1, noise).unwrap();
        assert_eq!(graph.preferred_input(retime), Some(0));
    }

    #[test]
    fn occupied_slot_rejects_connect_but_swaps() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        let read_a = make(&mut graph, &ctx, &registry, "io.read");
        let read_b = make(&mut graph, &ctx, &registry, "io.read");

        graph.connect_input(&ctx, blur, 0, read_a).unwrap();
        let err = graph.connect_input(&ctx, blur, 0, read_b).unwrap_err();
        assert!(matches!(err, GraphError::ConnectionRejected(_)));
        let old = graph.swap_input(&ctx, blur, 0, Some(read_b)).unwrap();
        assert_eq!(old, Some(read_a));
        assert!(graph.output_edges(read_a).is_empty());
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn cycles_and_self_loops_are_rejected() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        let merge = make(&mut graph, &ctx, &registry, "effect.merge");

        graph.connect_input(&ctx, merge, 0, blur).unwrap();
        let err = graph.can_connect(blur, 0, merge).unwrap_err();
        assert!(matches!(err, GraphError::ConnectionRejected(_)));
        let err = graph.can_connect(blur, 0, blur).unwrap_err();
        assert!(matches!(err, GraphError::ConnectionRejected(_)));
        // Feeding a second slot of the same consumer is not a cycle.
        assert!(graph.can_connect(merge, 1, blur).is_ok());
    }

    #[test]
    fn terminal_nodes_cannot_feed() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let write = make(&mut graph, &ctx, &registry, "io.write");
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        let err = graph.connect_input(&ctx, blur, 0, write).unwrap_err();
        assert!(matches!(err, GraphError::ConnectionRejected(_)));
    }

    #[test]
    fn disconnect_upstream_clears_every_slot() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let merge = make(&mut graph, &ctx, &registry, "effect.merge");
        let read = make(&mut graph, &ctx, &registry, "io.read");
        graph.connect_input(&ctx, merge, 0, read).unwrap();
        graph.connect_input(&ctx, merge, 1, read).unwrap();

        let slots = graph.disconnect_upstream(&ctx, merge, read);
        assert_eq!(slots, vec![0, 1]);
        assert!(graph.output_edges(read).is_empty());
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn auto_connect_rejects_impossible_pairs() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let read_a = make(&mut graph, &ctx, &registry, "io.read");
        let read_b = make(&mut graph, &ctx, &registry, "io.read");
        let write_a = make(&mut graph, &ctx, &registry, "io.write");
        let write_b = make(&mut graph, &ctx, &registry, "io.write");

        assert!(graph.auto_connect(&ctx, read_a, read_b).is_err());
        assert!(graph.auto_connect(&ctx, write_a, write_b).is_err());
    }

    #[test]
    fn auto_connect_truth_table() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();

        // Terminal selected: created becomes its input.
        let write = make(&mut graph, &ctx, &registry, "io.write");
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        graph.auto_connect(&ctx, write, blur).unwrap();
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(blur));

        // Created source: becomes an input of the selected filter.
        let read = make(&mut graph, &ctx, &registry, "io.read");
        graph.auto_connect(&ctx, blur, read).unwrap();
        assert_eq!(graph.node(blur).unwrap().inputs[0], Some(read));

        // Created terminal: appended downstream without interposition.
        let write2 = make(&mut graph, &ctx, &registry, "io.write");
        graph.auto_connect(&ctx, blur, write2).unwrap();
        assert_eq!(graph.node(write2).unwrap().inputs[0], Some(blur));
        // blur kept its previous consumer.
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(blur));
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn created_filter_interposes_before_all_consumers() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let read = make(&mut graph, &ctx, &registry, "io.read");
        let merge = make(&mut graph, &ctx, &registry, "effect.merge");
        let write = make(&mut graph, &ctx, &registry, "io.write");
        graph.connect_input(&ctx, merge, 0, read).unwrap();
        graph.connect_input(&ctx, merge, 1, read).unwrap();
        graph.connect_input(&ctx, write, 0, read).unwrap();

        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        graph.auto_connect(&ctx, read, blur).unwrap();

        assert_eq!(graph.node(blur).unwrap().inputs[0], Some(read));
        assert_eq!(graph.node(merge).unwrap().inputs[0], Some(blur));
        assert_eq!(graph.node(merge).unwrap().inputs[1], Some(blur));
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(blur));
        assert_eq!(graph.output_edges(read).len(), 1);
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn terminal_selected_takes_created_source_as_input() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let write = make(&mut graph, &ctx, &registry, "io.write");
        let noise = make(&mut graph, &ctx, &registry, "gen.noise");

        graph.auto_connect(&ctx, write, noise).unwrap();
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(noise));
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn source_selected_feeds_created_terminal() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let noise = make(&mut graph, &ctx, &registry, "gen.noise");
        let write = make(&mut graph, &ctx, &registry, "io.write");

        graph.auto_connect(&ctx, noise, write).unwrap();
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(noise));
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn created_filter_interposes_before_single_consumer() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let read = make(&mut graph, &ctx, &registry, "io.read");
        let write = make(&mut graph, &ctx, &registry, "io.write");
        graph.connect_input(&ctx, write, 0, read).unwrap();

        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        graph.auto_connect(&ctx, read, blur).unwrap();

        assert_eq!(graph.node(blur).unwrap().inputs[0], Some(read));
        assert_eq!(graph.node(write).unwrap().inputs[0], Some(blur));
        assert_eq!(graph.output_edges(read).len(), 1);
        graph.debug_check_edges().unwrap();
    }

    #[test]
    fn interpose_with_no_consumers_is_a_plain_append() {
        let mut graph = Graph::new();
        let ctx = SessionContext::new();
        let registry = registry();
        let read = make(&mut graph, &ctx, &registry, "io.read");
        let blur = make(&mut graph, &ctx, &registry, "effect.blur");
        graph.auto_connect(&ctx, read, blur).unwrap();
        assert_eq!(graph.node(blur).unwrap().inputs[0], Some(read));
    }
}
