use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session aborted before completion")]
    Aborted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for ProbeError {
    fn from(err: config::ConfigError) -> Self {
        ProbeError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Internal(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Connection closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Message too short: {0:?}")]
    TooShort(String),

    #[error("Unrecognized opcode: {0:?}")]
    UnknownOpcode(char),

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),
}
