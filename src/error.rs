//! Error types for cef-client

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::FrameError;

#[derive(Error, Debug)]
pub enum ClientError {
    /// No response arrived within the call's timeout window.
    #[error("'{command}' timed out after {duration:?}")]
    Timeout { command: String, duration: Duration },

    /// The transport closed while the call was in flight.
    #[error("connection lost before '{command}' completed")]
    ConnectionLost { command: String },

    /// The server answered with a structured error.
    #[error("server error: {message}")]
    Remote {
        message: String,
        data: Option<Value>,
    },

    #[error("session is closed")]
    Closed,

    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid binary frame: {0}")]
    Frame(#[from] FrameError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
