use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The threshold file is required; the agent refuses to start blind.
    #[error("threshold configuration missing at {0}")]
    ConfigMissing(PathBuf),
    #[error("threshold configuration unreadable: {0}")]
    ConfigInvalid(#[source] serde_json::Error),
    #[error("registration with {server} failed: {reason}")]
    Registration { server: SocketAddr, reason: String },
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
}
