//! Script-name generation and validation.
//!
//! Script-names are the stable identifiers nodes are addressed by from
//! expressions and dotted paths, so they must be unique within their
//! collection and must not shadow a parameter of the enclosing group.

use crate::context::SessionContext;
use crate::error::GraphError;
use crate::model::graph::CollectionId;
use crate::model::graph::Graph;
use crate::model::node::NodeId;
use crate::plugin::{PluginDef, PluginKind};

/// Reduce a candidate to a script-safe name: whitespace and dashes become
/// underscores, every other non-alphanumeric character is dropped, and a
/// leading digit gets an underscore prefix. May return an empty string.
pub fn make_script_friendly(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if c.is_whitespace() || c == '-' {
            out.push('_');
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

impl Graph {
    /// Resolve `base` to a unique script-name within `coll`.
    ///
    /// With `append_digit` the candidate always carries an integer suffix,
    /// starting at 1 and incremented past collisions (smallest free suffix,
    /// deterministic). Without it, any collision is an error, as is
    /// `error_if_exists` with a collision. `exclude` is ignored during the
    /// collision scan (renaming a node must not collide with itself).
    pub fn check_node_name(
        &self,
        ctx: &SessionContext,
        coll: CollectionId,
        exclude: Option<NodeId>,
        base: &str,
        append_digit: bool,
        error_if_exists: bool,
    ) -> Result<String, GraphError> {
        let sanitized = make_script_friendly(base);
        if sanitized.is_empty() {
            return Err(GraphError::InvalidName(base.to_string()));
        }

        // A member name equal to a parameter name on the owning group node
        // would make `Group1.name` ambiguous in scripts.
        if let CollectionId::Group(group_id) = coll {
            if ctx
                .params
                .parameter_names(group_id)
                .iter()
                .any(|p| *p == sanitized)
            {
                return Err(GraphError::NameCollision(format!(
                    "a node within a group cannot have the same script-name ({}) as a parameter on the group",
                    sanitized
                )));
            }
        }

        let mut suffix = 1u64;
        let mut candidate = if append_digit {
            format!("{}{}", sanitized, suffix)
        } else {
            sanitized.clone()
        };
        while self.check_name_exists(coll, &candidate, exclude) {
            if error_if_exists || !append_digit {
                return Err(GraphError::NameCollision(format!(
                    "a node with the script-name {} already exists",
                    candidate
                )));
            }
            suffix += 1;
            candidate = format!("{}{}", sanitized, suffix);
        }
        Ok(candidate)
    }

    /// Initial name for a freshly created node, derived from the plug-in
    /// label. Output boundary nodes first try the bare label (a group is
    /// expected to hold a single one), then fall back to the digit policy.
    pub fn initial_node_name(
        &self,
        ctx: &SessionContext,
        coll: CollectionId,
        plugin: &PluginDef,
    ) -> Result<String, GraphError> {
        if plugin.kind == PluginKind::GroupOutput {
            match self.check_node_name(ctx, coll, None, &plugin.label, false, false) {
                Ok(name) => return Ok(name),
                Err(GraphError::NameCollision(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.check_node_name(ctx, coll, None, &plugin.label, true, false)
    }

    /// Name resolution for nodes recreated from serialization: keep the
    /// recorded name when it is free, otherwise rename with a digit suffix.
    pub(crate) fn resolve_recorded_name(
        &self,
        ctx: &SessionContext,
        coll: CollectionId,
        recorded: &str,
    ) -> Result<String, GraphError> {
        match self.check_node_name(ctx, coll, None, recorded, false, false) {
            Ok(name) => Ok(name),
            Err(GraphError::NameCollision(_)) => {
                self.check_node_name(ctx, coll, None, recorded, true, false)
            }
            Err(e) => Err(e),
        }
    }
}
