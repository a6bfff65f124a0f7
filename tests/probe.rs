use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wsprobe::config::ProbeConfig;
use wsprobe::{Connection, ProbeError, ProbeSession};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns a WebSocket server on an ephemeral port that echoes back every
/// text frame the `filter` accepts, and returns its ws:// endpoint.
async fn spawn_server(filter: fn(&str) -> bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut stream) = ws.split();
                while let Some(Ok(message)) = stream.next().await {
                    if let Message::Text(text) = message {
                        if filter(&text) && sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    format!("ws://{}", addr)
}

fn probe_config(endpoint: &str, pings_per_second: u64, ping_seconds: u64) -> ProbeConfig {
    ProbeConfig {
        endpoint: endpoint.to_string(),
        pings_per_second,
        ping_seconds,
        report_delay_secs: 1,
    }
}

#[test_log::test(tokio::test)]
async fn full_session_against_echo_server() {
    let endpoint = spawn_server(|_| true).await;
    let config = probe_config(&endpoint, 50, 1);

    let connection = Connection::open(&endpoint, CONNECT_TIMEOUT).await.unwrap();
    let session = ProbeSession::new(connection, config);
    let report = session.run().await.unwrap();

    assert_eq!(report.total_pings, 50);
    assert_eq!(report.answered(), 50);
    assert_eq!(report.lost(), 0);
    for (tag, latency) in report.entries() {
        let latency = latency.unwrap_or_else(|| panic!("tag {} missing", tag));
        assert!(latency < Duration::from_secs(1), "implausible latency for tag {}", tag);
    }
}

#[test_log::test(tokio::test)]
async fn even_tags_only_server_leaves_odd_tags_missing() {
    // Acknowledge a ping only when its tag parses as an even number.
    let endpoint = spawn_server(|text| {
        text[1..].parse::<u64>().map(|tag| tag % 2 == 0).unwrap_or(false)
    })
    .await;
    let config = probe_config(&endpoint, 40, 1);

    let connection = Connection::open(&endpoint, CONNECT_TIMEOUT).await.unwrap();
    let session = ProbeSession::new(connection, config);
    let report = session.run().await.unwrap();

    for (tag, latency) in report.entries() {
        if tag % 2 == 0 {
            assert!(latency.is_some(), "even tag {} missing", tag);
        } else {
            assert!(latency.is_none(), "odd tag {} unexpectedly answered", tag);
        }
    }
    assert_eq!(report.answered(), 20);
    assert_eq!(report.lost(), 20);
}

#[test_log::test(tokio::test)]
async fn garbage_replies_never_count_as_acknowledgments() {
    // A server that answers every ping with junk instead of the echo.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut stream) = ws.split();
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Text(_)) {
                // Too short, unknown opcode, and non-numeric tag.
                for junk in ["x", "9001", "0notanumber"] {
                    if sink.send(Message::Text(junk.to_string())).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    let config = probe_config(&endpoint, 20, 1);
    let connection = Connection::open(&endpoint, CONNECT_TIMEOUT).await.unwrap();
    let session = ProbeSession::new(connection, config);
    let report = session.run().await.unwrap();

    assert_eq!(report.answered(), 0);
    assert_eq!(report.lost(), 20);
}

#[test_log::test(tokio::test)]
async fn close_mid_session_produces_no_report() {
    let endpoint = spawn_server(|_| true).await;
    // Long session so the close lands mid-flight.
    let config = probe_config(&endpoint, 10, 30);

    let connection = Connection::open(&endpoint, CONNECT_TIMEOUT).await.unwrap();
    let session = ProbeSession::new(connection, config);
    let handle = session.close_handle();

    let running = tokio::spawn(session.run());
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.close();

    let result = running.await.unwrap();
    assert!(matches!(result, Err(ProbeError::Aborted)));
}

#[test_log::test(tokio::test)]
async fn server_closing_mid_session_still_reports() {
    // Echo a few pings, then close the connection from the server side.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut echoed = 0;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                ws.send(Message::Text(text)).await.unwrap();
                echoed += 1;
                if echoed == 5 {
                    ws.close(None).await.unwrap();
                    break;
                }
            }
        }
    });

    let config = probe_config(&endpoint, 20, 5);
    let connection = Connection::open(&endpoint, CONNECT_TIMEOUT).await.unwrap();
    let session = ProbeSession::new(connection, config);
    let report = session.run().await.unwrap();

    assert_eq!(report.total_pings, 100);
    assert_eq!(report.answered(), 5);
    assert!(report.latency(0).is_some());
    assert!(report.latency(99).is_none());
}

#[test_log::test(tokio::test)]
async fn connect_failure_surfaces_an_error() {
    let result = Connection::open("ws://127.0.0.1:1", CONNECT_TIMEOUT).await;
    assert!(result.is_err());
}
