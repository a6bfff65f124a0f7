//! One-shot latency probe: a fixed-rate stream of tagged pings over a single
//! connection, correlated by tag, reported after a drain window.

mod report;
mod session;

pub use report::LatencyReport;
pub use session::{CloseHandle, ProbeSession, SessionState};
