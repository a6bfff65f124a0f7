use anyhow::Context;
use dotenv::dotenv;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use wsprobe::{Connection, ProbeSession, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");
    info!(
        "Probing {} at {}/s for {}s",
        settings.probe.endpoint, settings.probe.pings_per_second, settings.probe.ping_seconds
    );

    let connection = Connection::open(
        &settings.probe.endpoint,
        settings.connection.connect_timeout(),
    )
    .await
    .context("Failed to open connection")?;

    let session = ProbeSession::new(connection, settings.probe.clone());
    info!("Starting probe session {}", session.id());

    let report = session.run().await.context("Probe session failed")?;

    debug!(
        "Report JSON: {}",
        serde_json::to_string(&report).unwrap_or_default()
    );
    info!("Latency report:\n{}", report);

    Ok(())
}
