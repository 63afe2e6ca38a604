//! Session context: the narrow interfaces through which the graph engine
//! talks to its collaborators (processing runtime, parameter storage), plus
//! warning accumulation for load-time diagnostics.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::model::node::NodeId;
use crate::model::serialization::ParamLink;

/// Runtime collaborator: owns the processing side of a node's lifecycle.
///
/// The engine never computes pixels; it only tells the host when processing
/// must stop, when a node's input wiring changed and when a node is gone.
pub trait NodeHost: Send + Sync {
    /// Request that any in-flight processing on `node` stops. When `blocking`
    /// is true the call must not return before processing has observably
    /// stopped.
    fn quit_processing(&self, _node: NodeId, _blocking: bool) {}

    /// One input slot of `node` may now read from a different upstream.
    fn input_changed(&self, _node: NodeId, _slot: usize) {}

    fn node_destroyed(&self, _node: NodeId) {}
}

/// Host that ignores every notification.
pub struct NullHost;

impl NodeHost for NullHost {}

/// Parameter-storage collaborator ("knobs" live outside this crate).
pub trait ParameterHost: Send + Sync {
    /// Script-names of the parameters declared on `node`. Used to refuse
    /// member names that would shadow a group parameter.
    fn parameter_names(&self, _node: NodeId) -> Vec<String> {
        Vec::new()
    }

    /// Re-establish a parameter-level link recorded in a serialization
    /// descriptor. `target` is the resolved live node, when resolution
    /// succeeded. Returns false when the link could not be restored.
    fn restore_link(&self, _node: NodeId, _link: &ParamLink, _target: Option<NodeId>) -> bool {
        false
    }

    /// Toggle the read-only flag on all user-added parameters of `node`.
    fn set_user_parameters_read_only(&self, _node: NodeId, _read_only: bool) {}
}

/// Parameter host for graphs with no parameter storage attached.
pub struct NoParameters;

impl ParameterHost for NoParameters {}

/// Created once per session and passed by reference through every mutating
/// engine call. Non-fatal reconstruction problems are logged and accumulated
/// here instead of aborting the operation.
pub struct SessionContext {
    pub host: Arc<dyn NodeHost>,
    pub params: Arc<dyn ParameterHost>,
    warnings: Mutex<Vec<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            host: Arc::new(NullHost),
            params: Arc::new(NoParameters),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn NodeHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_parameters(mut self, params: Arc<dyn ParameterHost>) -> Self {
        self.params = params;
        self
    }

    /// Record a non-fatal problem. Also emitted on the `log` facade.
    pub fn report_warning(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{}", msg);
        self.warnings.lock().unwrap().push(msg);
    }

    /// Long-running-operation status text (project loading progress).
    pub fn update_load_status(&self, msg: impl Into<String>) {
        info!("{}", msg.into());
    }

    /// Drain the warnings accumulated so far.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().unwrap())
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
