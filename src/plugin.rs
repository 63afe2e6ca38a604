//! Plug-in registry: definitions of the node types the engine can
//! instantiate. Actual effect code lives outside this crate; a `PluginDef`
//! only describes identity, version, role and input slots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// The container node that nests a sub-graph.
pub const GROUP_PLUGIN_ID: &str = "builtin.group";
/// Boundary node marking one external input of a group.
pub const GROUP_INPUT_PLUGIN_ID: &str = "builtin.group_input";
/// Boundary node marking the (single) external output of a group.
pub const GROUP_OUTPUT_PLUGIN_ID: &str = "builtin.group_output";
/// Pass-through substituted for nodes whose plug-in cannot be found.
pub const STUB_PLUGIN_ID: &str = "builtin.stub";

/// Coarse role of a node type, used by the auto-connect heuristic and the
/// per-role recursive collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// General processing node (N inputs, consumed downstream).
    Filter,
    /// Produces data from nothing (no input slots).
    Generator,
    /// Reads media from disk (no input slots).
    Reader,
    /// Graph-terminal node writing media to disk.
    Writer,
    /// Graph-terminal display node.
    Viewer,
    Group,
    GroupInput,
    GroupOutput,
    Stub,
}

impl PluginKind {
    /// Terminal ("output-type") nodes sit at the downstream end of a graph.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PluginKind::Writer | PluginKind::Viewer | PluginKind::GroupOutput
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One declared input slot of a node type.
#[derive(Debug, Clone)]
pub struct InputDef {
    pub label: String,
    /// Mask inputs are skipped by the preferred-input heuristic and restored
    /// from a separate name map during deserialization.
    pub mask: bool,
    pub optional: bool,
}

impl InputDef {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            mask: false,
            optional: false,
        }
    }

    pub fn mask(label: &str) -> Self {
        Self {
            label: label.to_string(),
            mask: true,
            optional: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Definition of a node type, registered in the `PluginRegistry`.
#[derive(Debug, Clone)]
pub struct PluginDef {
    pub id: String,
    /// Display label, also the base of generated script-names.
    pub label: String,
    pub version: PluginVersion,
    pub kind: PluginKind,
    pub inputs: Vec<InputDef>,
}

impl PluginDef {
    pub fn new(id: &str, label: &str, kind: PluginKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            version: PluginVersion::new(1, 0),
            kind,
            inputs: Vec::new(),
        }
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.version = PluginVersion::new(major, minor);
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<InputDef>) -> Self {
        self.inputs = inputs;
        self
    }
}

/// Thread-safe registry of node type definitions. The built-in group,
/// boundary and stub definitions are always present.
pub struct PluginRegistry {
    inner: RwLock<HashMap<String, Arc<PluginDef>>>,
    stub: Arc<PluginDef>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let stub = Arc::new(
            PluginDef::new(STUB_PLUGIN_ID, "Stub", PluginKind::Stub)
                .with_inputs(vec![InputDef::new("Source")]),
        );
        let registry = Self {
            inner: RwLock::new(HashMap::new()),
            stub: stub.clone(),
        };
        registry.register(PluginDef::new(GROUP_PLUGIN_ID, "Group", PluginKind::Group));
        registry.register(PluginDef::new(
            GROUP_INPUT_PLUGIN_ID,
            "Input",
            PluginKind::GroupInput,
        ));
        registry.register(
            PluginDef::new(GROUP_OUTPUT_PLUGIN_ID, "Output", PluginKind::GroupOutput)
                .with_inputs(vec![InputDef::new("Source")]),
        );
        registry.inner.write().unwrap().insert(STUB_PLUGIN_ID.to_string(), stub);
        registry
    }

    pub fn register(&self, def: PluginDef) {
        let mut inner = self.inner.write().unwrap();
        inner.insert(def.id.clone(), Arc::new(def));
    }

    pub fn get(&self, id: &str) -> Option<Arc<PluginDef>> {
        let inner = self.inner.read().unwrap();
        inner.get(id).cloned()
    }

    /// The pass-through definition substituted for missing plug-ins.
    pub fn stub(&self) -> Arc<PluginDef> {
        self.stub.clone()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
