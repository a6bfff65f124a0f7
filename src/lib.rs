pub mod config;
pub mod connection;
pub mod error;
pub mod probe;
pub mod wire;

pub use error::ProbeError;
pub type Result<T> = std::result::Result<T, ProbeError>;

pub use config::{ProbeConfig, Settings};
pub use connection::{Connection, ConnectionEvent};
pub use probe::{CloseHandle, LatencyReport, ProbeSession, SessionState};
