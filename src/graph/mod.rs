//! Operations on the node store, split by concern: script-name resolution,
//! collection membership and lifecycle, group boundary views, connections
//! and the auto-connect heuristic, serialization-driven reconstruction.

pub mod collection;
pub mod connect;
pub mod deserialize;
pub mod group;
pub mod naming;

pub use collection::{split_path_head, split_path_tail, CreateNodeArgs};
pub use deserialize::CreateNodesOptions;
pub use naming::make_script_friendly;
