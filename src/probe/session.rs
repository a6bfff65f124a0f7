use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::connection::{Connection, ConnectionEvent};
use crate::error::ProbeError;
use crate::probe::report::LatencyReport;
use crate::wire::Frame;

/// Session lifecycle. One-shot: a session never restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pinging,
    Draining,
    Reported,
    Closed,
}

/// Caller-side handle for abandoning a running session.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl CloseHandle {
    /// Abandons the session. The connection closes silently and no report is
    /// produced.
    pub fn close(&self) {
        let _ = self.tx.send(());
    }
}

/// Tag-keyed bookkeeping for one session: send instants for outstanding
/// pings, measured latencies for answered ones. Each entry is written once
/// and read once; correlation is by tag, never by arrival order.
#[derive(Debug, Default)]
struct PingLog {
    sent: u64,
    ping_times: HashMap<u64, Instant>,
    latencies: HashMap<u64, Duration>,
}

impl PingLog {
    /// Records the send instant for the next tag and returns its wire frame.
    fn next_ping(&mut self) -> Frame {
        let tag = self.sent;
        self.ping_times.insert(tag, Instant::now());
        self.sent += 1;
        Frame::ping(tag.to_string())
    }

    /// Routes one inbound frame. Malformed frames, non-numeric tags and tags
    /// with no outstanding ping are logged and dropped; nothing propagates.
    fn record_ack(&mut self, raw: &str) {
        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                return;
            }
        };
        let tag = match frame.tag() {
            Ok(tag) => tag,
            Err(e) => {
                warn!("Dropping acknowledgment: {}", e);
                return;
            }
        };
        match self.ping_times.remove(&tag) {
            Some(sent_at) => {
                self.latencies.insert(tag, sent_at.elapsed());
            }
            None => warn!("Acknowledgment for unknown tag {}", tag),
        }
    }
}

/// One bounded probe run over an open connection: sends `total_pings` tagged
/// pings at a fixed cadence, keeps routing acknowledgments through a drain
/// window, then reports every tag in order.
pub struct ProbeSession {
    id: Uuid,
    config: ProbeConfig,
    connection: Connection,
    close_tx: mpsc::UnboundedSender<()>,
    close_rx: mpsc::UnboundedReceiver<()>,
    log: PingLog,
    state: SessionState,
}

impl ProbeSession {
    pub fn new(connection: Connection, config: ProbeConfig) -> Self {
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            config,
            connection,
            close_tx,
            close_rx,
            log: PingLog::default(),
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: self.close_tx.clone(),
        }
    }

    /// Sends an arbitrary payload as a ping body, verbatim and unvalidated.
    /// A reply whose body is not a decimal tag is dropped by the router.
    pub fn send_custom(&self, payload: &str) {
        self.connection.send(Frame::ping(payload).encode());
    }

    /// Runs the session to completion: schedule pings, route acknowledgments,
    /// drain, report. Returns the report, or [`ProbeError::Aborted`] if a
    /// [`CloseHandle`] abandoned the session first. Unexpected remote closure
    /// flushes a report from whatever was recorded.
    pub async fn run(self) -> crate::Result<LatencyReport> {
        let Self {
            id,
            config,
            mut connection,
            close_tx,
            mut close_rx,
            mut log,
            mut state,
        } = self;
        // Held so the close channel stays open even with no handles minted.
        let _close_tx = close_tx;
        // Outbound handle, so select! handlers never touch the event side.
        let sender = connection.sender();

        let total = config.total_pings();
        let mut ticker = interval(config.ping_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let started = Instant::now();
        transition(id, &mut state, SessionState::Pinging);
        info!(session = %id, total, rate = config.pings_per_second, "Ping session started");

        while state == SessionState::Pinging {
            tokio::select! {
                _ = ticker.tick() => {
                    if log.sent < total {
                        let frame = log.next_ping();
                        sender.send(frame.encode());
                    }
                    if log.sent >= total {
                        info!(session = %id, elapsed = ?started.elapsed(), "All pings sent");
                        transition(id, &mut state, SessionState::Draining);
                    }
                }
                event = connection.next_event() => match event {
                    Some(ConnectionEvent::Message(raw)) => log.record_ack(&raw),
                    Some(ConnectionEvent::Opened) => debug!(session = %id, "Connection ready"),
                    Some(ConnectionEvent::Closed) | None => {
                        warn!(session = %id, "Connection closed mid-session; flushing report");
                        return Ok(finish(id, &mut state, total, log));
                    }
                },
                _ = close_rx.recv() => {
                    sender.close();
                    transition(id, &mut state, SessionState::Closed);
                    info!(session = %id, "Session closed before completion");
                    return Err(ProbeError::Aborted);
                }
            }
        }

        // Drain window: replies still in flight may close out their tags.
        let drain = tokio::time::sleep(config.report_delay());
        tokio::pin!(drain);
        loop {
            tokio::select! {
                _ = &mut drain => break,
                event = connection.next_event() => match event {
                    Some(ConnectionEvent::Message(raw)) => log.record_ack(&raw),
                    Some(ConnectionEvent::Opened) => {}
                    Some(ConnectionEvent::Closed) | None => {
                        warn!(session = %id, "Connection closed while draining");
                        break;
                    }
                },
                _ = close_rx.recv() => {
                    sender.close();
                    transition(id, &mut state, SessionState::Closed);
                    info!(session = %id, "Session closed while draining");
                    return Err(ProbeError::Aborted);
                }
            }
        }

        Ok(finish(id, &mut state, total, log))
    }
}

fn transition(id: Uuid, state: &mut SessionState, to: SessionState) {
    debug!(session = %id, from = ?*state, to = ?to, "Session state");
    *state = to;
}

fn finish(id: Uuid, state: &mut SessionState, total: u64, log: PingLog) -> LatencyReport {
    transition(id, state, SessionState::Reported);
    let report = LatencyReport::new(id, total, log.latencies);
    info!(
        session = %id,
        answered = report.answered(),
        lost = report.lost(),
        "Session reported"
    );
    report
}
