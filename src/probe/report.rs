use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Per-tag round-trip latencies for one completed session.
///
/// Tags with no recorded latency were never acknowledged; that is expected
/// loss, not a failure.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub session: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_pings: u64,
    latencies: HashMap<u64, Duration>,
}

impl LatencyReport {
    pub fn new(session: Uuid, total_pings: u64, latencies: HashMap<u64, Duration>) -> Self {
        Self {
            session,
            generated_at: Utc::now(),
            total_pings,
            latencies,
        }
    }

    pub fn latency(&self, tag: u64) -> Option<Duration> {
        self.latencies.get(&tag).copied()
    }

    pub fn answered(&self) -> u64 {
        self.latencies.len() as u64
    }

    pub fn lost(&self) -> u64 {
        self.total_pings - self.answered()
    }

    /// Every tag of the session in send order, paired with its latency if an
    /// acknowledgment arrived.
    pub fn entries(&self) -> impl Iterator<Item = (u64, Option<Duration>)> + '_ {
        (0..self.total_pings).map(move |tag| (tag, self.latency(tag)))
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (tag, latency) in self.entries() {
            match latency {
                Some(latency) => writeln!(f, "{}: {:?}", tag, latency)?,
                None => writeln!(f, "{}: missing", tag)?,
            }
        }
        write!(
            f,
            "sent {}, answered {}, lost {}",
            self.total_pings,
            self.answered(),
            self.lost()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LatencyReport {
        let mut latencies = HashMap::new();
        latencies.insert(0, Duration::from_millis(3));
        latencies.insert(2, Duration::from_millis(5));
        LatencyReport::new(Uuid::new_v4(), 4, latencies)
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.answered(), 2);
        assert_eq!(report.lost(), 2);
        assert_eq!(report.latency(0), Some(Duration::from_millis(3)));
        assert_eq!(report.latency(1), None);
    }

    #[test]
    fn test_entries_in_send_order() {
        let report = sample();
        let tags: Vec<u64> = report.entries().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_display_marks_missing() {
        let report = sample();
        let rendered = report.to_string();
        assert!(rendered.contains("0: 3ms"));
        assert!(rendered.contains("1: missing"));
        assert!(rendered.contains("3: missing"));
        assert!(rendered.contains("sent 4, answered 2, lost 2"));
    }

    #[test]
    fn test_serializes() {
        let report = sample();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_pings"], 4);
        assert!(json["latencies"].is_object());
    }
}
