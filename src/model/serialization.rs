//! Serialization descriptors. The engine does not own an on-disk format;
//! these records are the external schema it consumes and produces. Maps use
//! `BTreeMap` so serialized output is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::plugin::PluginVersion;

/// A parameter-level link recorded on a node: `param` on the owning node
/// follows `target_param` on the node named `target_node` (a name or dotted
/// path relative to the node's collection).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParamLink {
    pub param: String,
    pub target_node: String,
    pub target_param: String,
}

/// Per-node serialization descriptor. Input maps are keyed by slot label
/// (falling back to the textual slot index) and hold the upstream node's
/// recorded script-name; masks are kept separate from regular inputs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct NodeRecord {
    pub script_name: String,
    #[serde(default)]
    pub label: String,
    pub plugin_id: String,
    #[serde(default)]
    pub plugin_version: Option<PluginVersion>,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub masks: BTreeMap<String, String>,
    #[serde(default)]
    pub param_links: Vec<ParamLink>,
    /// Sub-graph content, for group nodes.
    #[serde(default)]
    pub children: Vec<NodeRecord>,
}

pub fn records_to_json(records: &[NodeRecord]) -> Result<String, GraphError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn records_from_json(json: &str) -> Result<Vec<NodeRecord>, GraphError> {
    Ok(serde_json::from_str(json)?)
}
