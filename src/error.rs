use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid script-name {0:?}")]
    InvalidName(String),
    #[error("{0}")]
    NameCollision(String),
    #[error("connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("plug-in {0} is not registered")]
    PluginNotFound(String),
    #[error("node {0} not found")]
    NodeNotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl GraphError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        GraphError::ConnectionRejected(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        GraphError::Runtime(msg.into())
    }
}
